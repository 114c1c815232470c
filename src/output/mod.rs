//! Output handlers for generated blocks.

mod console;

pub use console::ConsoleOutput;

use anyhow::Result;
use crate::philox::{Block, Counter};

/// Output trait for handling generated blocks.
pub trait Output: Send + Sync {
    /// Output one block together with the counter it was generated from.
    fn block(&self, counter: &Counter, block: &Block) -> Result<()>;

    /// Flush any buffered output.
    fn flush(&self) -> Result<()>;
}
