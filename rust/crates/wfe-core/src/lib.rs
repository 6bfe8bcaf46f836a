//! Workflow Engine Core Library
//!
//! Shared primitives used across the workflow engine's crates:
//! - `RunId`, the one generated correlation identifier
//! - the engine's error taxonomy
//! - engine-level configuration (logging, execution defaults, plugin paths)
//! - time helpers (`Timestamp`, `DurationMs`)
//! - `ActionReply`, the plugin-call result shape shared by `wfe-plugin` and
//!   `wfe-exec`

pub mod action;
pub mod config;
pub mod error;
pub mod id;
pub mod time;

pub use action::ActionReply;
pub use config::Config;
pub use error::{Error, Result};
pub use id::*;
pub use time::{DurationMs, Timestamp};
