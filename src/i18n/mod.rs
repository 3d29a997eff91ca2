//! Language metadata and translation content checks.
//!
//! - `registry`: the injected table of known target languages and their display names
//! - `validator`: format-token preservation checks for translated values

mod registry;
mod validator;

pub use registry::{LanguageEntry, LanguageTable};
pub use validator::{PlaceholderMismatch, PlaceholderReport, PlaceholderValidator};
