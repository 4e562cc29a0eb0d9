//! Core pipeline orchestration for ControlQA.
//!
//! This crate ties together identifier extraction, control resolution,
//! semantic search, and answer synthesis into the `pipe` workflow, and
//! exposes the host-facing [`host::Pipeline`] lifecycle.

pub mod extract;
pub mod host;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod services;

pub use extract::{Extraction, extract};
pub use host::{ApiKeys, Pipeline};
pub use pipeline::{Orchestrator, PipeProgress, PipeResponse, SilentProgress};
