//! Applications: submission, employer review workflow, withdrawal and
//! per-role statistics.

pub mod handlers;
pub mod stats;
pub mod workflow;
