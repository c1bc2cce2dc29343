//! pushbuild - Push-to-build bridge
//!
//! Receives repository push notifications and turns each one into a build:
//! the pushed revision is downloaded as an archive, staged under a fixed
//! object key, a build environment pointing at that key is created if it
//! does not exist yet, and a build is queued.
//!
//! # Modules
//!
//! - `adapters`: Capability traits and their implementations (secrets,
//!   GitLab, object storage, build service)
//! - `core`: Orchestration and idempotent provisioning
//! - `domain`: Data structures (requests, artifacts, environments, outcomes)
//! - `server`: Axum webhook endpoint
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve the webhook endpoint
//! pushbuild serve --address 127.0.0.1:8080
//!
//! # Handle one event
//! pushbuild handle --input event.json
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod server;

// Re-export main types at crate root for convenience
pub use config::BridgeConfig;
pub use core::Orchestrator;
pub use domain::{BuildRequest, Outcome};
pub use error::BridgeError;
