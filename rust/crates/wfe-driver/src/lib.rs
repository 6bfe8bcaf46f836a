//! Workflow driver.
//!
//! Loads and merges workflow documents, evaluates `vars`, wires
//! `wfe-scheduler`'s dependency admission to `wfe-exec`'s per-job step
//! pipeline over a real `wfe-plugin` transport, and renders the
//! declaration-ordered final report. This is the crate `wfe-cli` calls
//! into; everything here is runnable and testable without a terminal.

mod dispatch;
mod document;
mod model;
mod report;
mod run;
mod vars;

pub use dispatch::PluginActionDispatcher;
pub use document::load_workflow;
pub use model::{JobDoc, StepDoc, WorkflowDoc};
pub use report::{JobBuffer, JobFinalStatus};
pub use run::{run, RunOptions, RunSummary};
