//! Read-side consolidation of historical plan entries for display.
//!
//! [`consolidate`] deduplicates and repairs a raw list of plan history
//! entries. It is a pure function: it never touches the store, and feeding
//! its output back in is a no-op. Legacy rows may lack ids, carry
//! conflicting duplicates, or hold more than one active entry per kind;
//! this module makes such a list renderable without masking the upstream
//! inconsistency -- extra active entries are reported so an external
//! integrity check can pick them up.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use coachbook_db::models::{GeneratedPlan, PlanKind};

/// One displayable history entry. Derived only; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: Option<Uuid>,
    pub kind: PlanKind,
    pub budget_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Set by [`consolidate`]: the single entry rendered as current.
    pub is_current: bool,
    pub payload: Value,
}

impl From<GeneratedPlan> for HistoryEntry {
    fn from(plan: GeneratedPlan) -> Self {
        Self {
            id: Some(plan.id),
            kind: plan.kind,
            budget_id: plan.budget_id,
            start_date: Some(plan.start_date),
            end_date: plan.end_date,
            is_active: plan.is_active,
            is_current: false,
            payload: plan.payload,
        }
    }
}

impl HistoryEntry {
    /// Deduplication key.
    ///
    /// The id when present; otherwise a composite of budget and start
    /// date. Steps entries get an extra target segment: two goal changes
    /// on the same date, lacking ids, are otherwise indistinguishable.
    pub fn dedup_key(&self) -> String {
        if let Some(id) = self.id {
            return id.to_string();
        }

        let budget = self
            .budget_id
            .map(|b| b.to_string())
            .unwrap_or_else(|| "no-budget".to_owned());
        let date = self
            .start_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "no-date".to_owned());
        let mut key = format!("{budget}-{date}");

        if self.kind == PlanKind::Steps {
            let target = self
                .steps_target()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "no-target".to_owned());
            key.push('-');
            key.push_str(&target);
        }
        key
    }

    /// The step target, read leniently from the payload: well-formed
    /// entries carry `goal`, older hand-entered rows used `target`.
    fn steps_target(&self) -> Option<i64> {
        self.payload
            .get("goal")
            .or_else(|| self.payload.get("target"))
            .and_then(Value::as_i64)
    }
}

/// Output of [`consolidate`]: the deduplicated entries plus the keys of
/// active entries that were demoted to not-current, for an external
/// integrity check.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedHistory {
    pub entries: Vec<HistoryEntry>,
    pub duplicate_active: Vec<String>,
}

/// Deduplicate and repair a raw history list for display.
///
/// Merge, scanning the input in order: the first occurrence of a key is
/// kept; a repeat replaces the kept entry only when the incoming entry is
/// active and the kept one is not. Active beats inactive; among equals,
/// first seen wins. Output preserves first-insertion order per key.
///
/// Repair: only the first active entry in the result is marked current;
/// later active entries stay data-active but not current and their keys
/// are reported. The repair is defensive rendering only -- the
/// synchronizer remains responsible for the single-active invariant.
pub fn consolidate(entries: Vec<HistoryEntry>) -> ConsolidatedHistory {
    let mut kept: Vec<HistoryEntry> = Vec::with_capacity(entries.len());
    let mut slot_by_key: HashMap<String, usize> = HashMap::new();

    for mut entry in entries {
        // Recomputed below; stale flags from a previous pass must not leak.
        entry.is_current = false;

        let key = entry.dedup_key();
        match slot_by_key.get(&key) {
            None => {
                slot_by_key.insert(key, kept.len());
                kept.push(entry);
            }
            Some(&slot) => {
                if entry.is_active && !kept[slot].is_active {
                    kept[slot] = entry;
                }
            }
        }
    }

    let mut duplicate_active = Vec::new();
    let mut have_current = false;
    for entry in &mut kept {
        if !entry.is_active {
            continue;
        }
        if have_current {
            duplicate_active.push(entry.dedup_key());
        } else {
            entry.is_current = true;
            have_current = true;
        }
    }

    ConsolidatedHistory {
        entries: kept,
        duplicate_active,
    }
}
