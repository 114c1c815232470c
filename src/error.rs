//! Error types for the Philox generator and its callers.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, PhiloxError>;

/// Errors surfaced by the generator and the surrounding tooling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhiloxError {
    /// Round count outside the supported range.
    #[error("invalid round count {0}: expected 0..=16")]
    InvalidRoundCount(i64),

    /// Round count text that is not an integer at all.
    #[error("invalid round count: {0}")]
    UnparsableRoundCount(String),

    /// Key text could not be parsed into two 32-bit words.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Counter text could not be parsed into four 32-bit words.
    #[error("invalid counter: {0}")]
    InvalidCounter(String),
}
