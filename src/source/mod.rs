//! Counter sources for the harness and the command line.
//!
//! The generator never advances a counter itself; these types hold the
//! caller-side policy for doing so.

mod range;

pub use range::{CounterIter, CounterRange};

use crate::philox::Counter;

/// How a caller advances the counter between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CounterIncrement {
    /// Increment word 0 only. Wraps after 2^32 steps without touching the
    /// upper words, so a single stream repeats from there on.
    #[default]
    LowWord,
    /// Full 128-bit increment with carry, word 0 least significant.
    Carry,
}

impl CounterIncrement {
    /// Number of distinct counters one stream visits before repeating
    /// (saturated to `u128::MAX` for `Carry`).
    pub fn period(&self) -> u128 {
        match self {
            CounterIncrement::LowWord => 1 << 32,
            CounterIncrement::Carry => u128::MAX,
        }
    }

    /// Short name for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterIncrement::LowWord => "low-word",
            CounterIncrement::Carry => "carry",
        }
    }

    /// Counter `steps` increments after `counter`.
    #[inline]
    pub fn advance(&self, counter: Counter, steps: u128) -> Counter {
        match self {
            CounterIncrement::LowWord => {
                let mut next = counter;
                next[0] = next[0].wrapping_add(steps as u32);
                next
            }
            CounterIncrement::Carry => from_u128(to_u128(counter).wrapping_add(steps)),
        }
    }

    /// Counter one increment after `counter`.
    #[inline]
    pub fn step(&self, counter: Counter) -> Counter {
        self.advance(counter, 1)
    }
}

/// Pack four words into a `u128`, word 0 least significant.
#[inline]
pub fn to_u128(words: [u32; 4]) -> u128 {
    words
        .iter()
        .rev()
        .fold(0u128, |acc, &w| (acc << 32) | w as u128)
}

/// Unpack a `u128` into four words, word 0 least significant.
#[inline]
pub fn from_u128(value: u128) -> [u32; 4] {
    [
        value as u32,
        (value >> 32) as u32,
        (value >> 64) as u32,
        (value >> 96) as u32,
    ]
}

/// Statistics from processing a range
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub counters_processed: u64,
    pub words_generated: u64,
}
