//! Console output handler.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use super::Output;
use crate::philox::{Block, Counter};

/// Console output - prints to stdout or a file.
pub struct ConsoleOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    raw: bool,
}

impl ConsoleOutput {
    /// Create console output to stdout.
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
            raw: false,
        }
    }

    /// Create console output writing to a file.
    pub fn to_file(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        Ok(Self {
            writer: Mutex::new(Box::new(BufWriter::new(file))),
            raw: false,
        })
    }

    /// Only print output words, one block per line.
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for ConsoleOutput {
    fn block(&self, counter: &Counter, block: &Block) -> Result<()> {
        let mut w = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;

        if self.raw {
            writeln!(
                w,
                "{:08x} {:08x} {:08x} {:08x}",
                block[0], block[1], block[2], block[3]
            )?;
        } else {
            // Compact format: counter words, then output words
            writeln!(
                w,
                "{:08x} {:08x} {:08x} {:08x} -> {:08x} {:08x} {:08x} {:08x}",
                counter[0], counter[1], counter[2], counter[3],
                block[0], block[1], block[2], block[3]
            )?;
        }

        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut w = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        w.flush()?;
        Ok(())
    }
}
