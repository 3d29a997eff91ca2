//! Incremental, LLM-driven translation of flat i18n string resources.
//!
//! Each run loads the existing per-language snapshots, asks the provider to
//! translate only the keys a language is missing, repairs malformed replies
//! and writes the merged snapshots back.

pub mod commands;
pub mod config;
pub mod i18n;
pub mod orchestrator;
pub mod provider;
pub mod repair;
pub mod snapshot;
pub mod task;

pub use orchestrator::{LanguageReport, Orchestrator, RunReport};
pub use snapshot::{LanguageSnapshot, ResourceSet, SnapshotStore, TranslationMap};
pub use task::JobOutcome;
