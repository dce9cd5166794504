//! Shared error and value types for the credential pool crates.

pub mod error;
pub mod types;

pub use error::FormatRejection;
pub use types::{AddOutcome, CredentialStatus, OutputFormat, RemoveOutcome, Selection};
