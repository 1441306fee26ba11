use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of a generated plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Workout,
    Nutrition,
    Supplement,
    Steps,
}

impl PlanKind {
    /// All kinds, in the order the synchronizer walks them.
    pub const ALL: [PlanKind; 4] = [
        Self::Workout,
        Self::Nutrition,
        Self::Supplement,
        Self::Steps,
    ];
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Workout => "workout",
            Self::Nutrition => "nutrition",
            Self::Supplement => "supplement",
            Self::Steps => "steps",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanKind {
    type Err = PlanKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workout" => Ok(Self::Workout),
            "nutrition" => Ok(Self::Nutrition),
            "supplement" => Ok(Self::Supplement),
            "steps" => Ok(Self::Steps),
            other => Err(PlanKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanKind`] string.
#[derive(Debug, Clone)]
pub struct PlanKindParseError(pub String);

impl fmt::Display for PlanKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan kind: {:?}", self.0)
    }
}

impl std::error::Error for PlanKindParseError {}

// ---------------------------------------------------------------------------
// Payload value types
// ---------------------------------------------------------------------------

/// Daily macro targets prescribed by a budget's nutrition section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionTargets {
    pub calories: Option<i32>,
    pub protein_g: Option<i32>,
    pub carbs_g: Option<i32>,
    pub fat_g: Option<i32>,
}

/// A single supplement prescription within a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplement {
    pub name: String,
    pub dosage: Option<String>,
    pub timing: Option<String>,
    pub notes: Option<String>,
}

/// The kind-specific payload of a generated plan.
///
/// Stored as jsonb with the kind tag embedded, so a plan row's payload is
/// self-describing even when read outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanPayload {
    Workout {
        template_id: Uuid,
    },
    Nutrition {
        template_id: Option<Uuid>,
        targets: Option<NutritionTargets>,
        eating_order: Option<String>,
        eating_rules: Option<String>,
    },
    Supplement {
        supplements: Vec<Supplement>,
    },
    Steps {
        goal: i32,
        instructions: Option<String>,
    },
}

impl PlanPayload {
    /// The kind this payload belongs to. Must agree with the `kind` column
    /// of the row it is stored on.
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Workout { .. } => PlanKind::Workout,
            Self::Nutrition { .. } => PlanKind::Nutrition,
            Self::Supplement { .. } => PlanKind::Supplement,
            Self::Steps { .. } => PlanKind::Steps,
        }
    }

    /// Serialize to the jsonb representation stored in `generated_plans`.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("plan payload serialization cannot fail")
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A budget -- a shared configuration template prescribing workout,
/// nutrition, supplement, and step targets.
///
/// Budgets with `is_public = false` are private forks: they are reachable
/// only through the assignment that owns them and never appear in the
/// shared-template listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Budget {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub workout_template_id: Option<Uuid>,
    pub nutrition_template_id: Option<Uuid>,
    pub nutrition_targets: Option<Json<NutritionTargets>>,
    pub steps_goal: Option<i32>,
    pub steps_instructions: Option<String>,
    pub supplements: Json<Vec<Supplement>>,
    pub eating_order: Option<String>,
    pub eating_rules: Option<String>,
    pub is_public: bool,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// The link between one budget and one subscriber.
///
/// Many assignments may reference the same `budget_id` (sharing); one
/// assignment references exactly one budget at a time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BudgetAssignment {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub subscriber_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub is_active: bool,
}

/// A materialized, kind-specific execution record derived from a budget for
/// one subscriber.
///
/// Plans are append-only: retiring sets `is_active = false` and `end_date`,
/// never rewriting the payload. A `budget_id` of NULL marks a manual
/// override (operator-created or detached from its budget); the synchronizer
/// leaves such plans untouched.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedPlan {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub kind: PlanKind,
    pub budget_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl GeneratedPlan {
    /// Decode the jsonb payload into its typed form.
    pub fn decoded_payload(&self) -> Result<PlanPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Whether this plan was created or edited by an operator rather than
    /// derived from a budget by a sync.
    pub fn is_manual_override(&self) -> bool {
        self.budget_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
