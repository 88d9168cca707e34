//! Identifiers for training runs and process instances.
//!
//! The process id is generated once and shared by every model trained in the
//! same process; each training run additionally gets its own ULID so persisted
//! models can be traced back to the run that produced them.

use once_cell::sync::Lazy;
use ulid::Ulid;

static PROCESS_RUN_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// Returns the process-level run ID (stable for the process lifetime).
#[inline]
pub fn process() -> &'static str {
    &PROCESS_RUN_ID
}

/// Generates a fresh, time-ordered ULID for a single training run.
#[inline]
pub fn generate() -> String {
    Ulid::new().to_string()
}
