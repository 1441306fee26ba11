//! Core engine for coachbook: propagating budget templates into
//! per-subscriber generated plans, copy-on-write isolation for budget
//! edits, assignment lifecycle, and read-side history consolidation.
//!
//! Everything here executes within one externally-triggered call,
//! suspending only at store I/O. Multi-step writes are composed into
//! single database transactions; the store itself lives in
//! [`coachbook_db`].

pub mod assignment;
pub mod error;
pub mod fork;
pub mod history;
pub mod sync;

pub use error::EngineError;
