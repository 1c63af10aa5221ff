//! Store use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the operations callers consume
//!   (upload handling, evaluation forms, dashboards).
//! - Apply the read/write error policy.
//!
//! # Invariants
//! - Writes propagate repository errors unchanged; the repository has already
//!   rolled the transaction back.
//! - Reads never fail: errors are logged and replaced by an empty/default
//!   value so dashboards stay up through transient read issues.

use crate::repo::RepoResult;
use log::error;

pub mod entry_service;
pub mod evaluation_service;
pub mod institution_service;

/// Unwraps a read result, logging and substituting `fallback` on error.
pub(crate) fn read_or_default<T>(
    operation: &'static str,
    institution: &str,
    result: RepoResult<T>,
    fallback: impl FnOnce() -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!(
                "event={} module=service status=error policy=default_on_read_error institution={} error={}",
                operation, institution, err
            );
            fallback()
        }
    }
}
