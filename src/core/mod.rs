//! Core orchestration logic.
//!
//! This module contains:
//! - Orchestrator: sequences one webhook invocation end to end
//! - Provisioner: idempotent build environment lookup-or-create

pub mod orchestrator;
pub mod provisioner;

// Re-export commonly used types
pub use orchestrator::Orchestrator;
pub use provisioner::{EnvironmentTemplate, Provisioner};
