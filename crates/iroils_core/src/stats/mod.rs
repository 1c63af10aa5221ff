//! Aggregate statistics engine.
//!
//! # Responsibility
//! - Keep one running-total row per institution in step with evaluation writes.
//! - Recompute totals from evaluation rows for audit and repair.
//!
//! # Invariants
//! - Engine functions run on the caller's transaction and never commit.
//! - Each incremental update is a single additive statement.

pub mod engine;

pub use engine::{
    apply_delta, load_stats, rebuild_stats, recompute_stats, StatsDelta, StatsUpdate,
};
