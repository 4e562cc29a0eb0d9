//! Shared types, error model, and configuration for ControlQA.
//!
//! This crate is the foundation depended on by all other ControlQA crates.
//! It provides:
//! - [`ControlQaError`] — the unified error type
//! - Domain types ([`ControlRecord`], [`SearchHit`], [`AnswerEntry`], [`AuditRecord`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, SearchConfig, StoreConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, parse_endpoint, read_api_key, validate_api_keys,
};
pub use error::{ControlQaError, Result};
pub use types::{
    AnswerEntry, AuditId, AuditRecord, ChatMessage, ControlDocument, ControlIdentifier,
    ControlRecord, SearchHit, split_questions,
};
