//! philox4x32 - Philox4x32 counter-based pseudorandom number generator.
//!
//! The generator is a pure function of a 128-bit counter, a 64-bit key and a
//! round count. Callers own the counter and advance it however they like,
//! which makes splitting work across threads a matter of handing each worker
//! its own slice of the counter space.
//!
//! ```
//! use philox4x32::{generate, philox4x32};
//!
//! let block = philox4x32([0, 0, 0, 0], [0, 0]);
//! assert_eq!(block, [0x6627e8d5, 0xe169c58d, 0xbc57ac4c, 0x9b00dbd8]);
//! assert!(generate([0; 4], [0; 2], 17).is_err());
//! ```
//!
//! Not suitable for cryptographic use.

pub mod benchmark;
pub mod check;
pub mod error;
pub mod output;
pub mod philox;
pub mod source;

pub use error::{PhiloxError, Result};
pub use philox::{
    bump_key, generate, mulhilo, philox4x32, philox4x32_r, round, Block, Counter, Key,
    PhiloxConfig, RoundCount, RoundState,
};

/// Default progress bar style for CLI operations.
pub fn default_progress_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        .unwrap()
        .progress_chars("#>-")
}
