//! Domain model for institution-scoped entries, evaluations and statistics.
//!
//! # Responsibility
//! - Define the records persisted by the store and returned to callers.
//! - Own institution-name normalization used at every table boundary.
//!
//! # Invariants
//! - Every record belongs to exactly one normalized institution.
//! - `InstitutionStats` is derivable from the institution's evaluations.

pub mod entry;
pub mod evaluation;
pub mod institution;
