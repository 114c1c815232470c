//! Philox4x32 counter-based generator.
//!
//! Philox maps a 128-bit counter and a 64-bit key to a 128-bit output block
//! through a fixed number of multiply-xor rounds. There is no internal state:
//! the caller owns the counter and decides how it advances, so parallel
//! streams are just disjoint slices of the counter space.
//!
//! For a fixed key and round count the mapping is a bijection on 128-bit
//! blocks. Zero rounds is the identity. Ten rounds is the validated default.
//!
//! ## References
//!
//! - Salmon, Moraes, Dror, Shaw (2011). "Parallel random numbers: as easy as 1, 2, 3"

use std::fmt;
use std::str::FromStr;

use crate::error::{PhiloxError, Result};

/// Round multiplier applied to counter word 0.
pub const PHILOX_M4X32_0: u32 = 0xD251_1F53;
/// Round multiplier applied to counter word 2.
pub const PHILOX_M4X32_1: u32 = 0xCD9E_8D57;
/// Weyl increment for key word 0 (golden ratio).
pub const PHILOX_W32_0: u32 = 0x9E37_79B9;
/// Weyl increment for key word 1 (sqrt(3) - 1).
pub const PHILOX_W32_1: u32 = 0xBB67_AE85;

/// 128-bit counter, word 0 least significant.
pub type Counter = [u32; 4];
/// 64-bit key.
pub type Key = [u32; 2];
/// 128-bit output block, same shape as the counter.
pub type Block = [u32; 4];

/// Number of mixing rounds, validated to `0..=16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundCount(u8);

impl RoundCount {
    /// Largest supported round count.
    pub const MAX: RoundCount = RoundCount(16);
    /// Identity transform.
    pub const ZERO: RoundCount = RoundCount(0);
    /// Round count the published statistical results were obtained with.
    pub const DEFAULT: RoundCount = RoundCount(10);

    /// Validate a round count.
    pub fn new(rounds: u32) -> Result<Self> {
        if rounds <= Self::MAX.get() {
            Ok(RoundCount(rounds as u8))
        } else {
            Err(PhiloxError::InvalidRoundCount(rounds as i64))
        }
    }

    /// Number of rounds as an integer.
    pub const fn get(self) -> u32 {
        self.0 as u32
    }
}

impl Default for RoundCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RoundCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for RoundCount {
    type Error = PhiloxError;

    fn try_from(rounds: u32) -> Result<Self> {
        RoundCount::new(rounds)
    }
}

impl TryFrom<i64> for RoundCount {
    type Error = PhiloxError;

    fn try_from(rounds: i64) -> Result<Self> {
        match u32::try_from(rounds) {
            Ok(r) => RoundCount::new(r),
            Err(_) => Err(PhiloxError::InvalidRoundCount(rounds)),
        }
    }
}

impl FromStr for RoundCount {
    type Err = PhiloxError;

    fn from_str(s: &str) -> Result<Self> {
        let rounds: i64 = s
            .trim()
            .parse()
            .map_err(|_| PhiloxError::UnparsableRoundCount(s.to_string()))?;
        RoundCount::try_from(rounds)
    }
}

/// Full 32x32 -> 64-bit product, returned as `(lo, hi)`.
#[inline(always)]
pub fn mulhilo(a: u32, b: u32) -> (u32, u32) {
    let product = (a as u64) * (b as u64);
    (product as u32, (product >> 32) as u32)
}

/// One Philox4x32 round.
#[inline(always)]
pub fn round(ctr: Counter, key: Key) -> Counter {
    let (lo0, hi0) = mulhilo(PHILOX_M4X32_0, ctr[0]);
    let (lo1, hi1) = mulhilo(PHILOX_M4X32_1, ctr[2]);
    [hi1 ^ ctr[1] ^ key[0], lo1, hi0 ^ ctr[3] ^ key[1], lo0]
}

/// Advance the key by one step of the Weyl sequence.
#[inline(always)]
pub fn bump_key(key: Key) -> Key {
    [
        key[0].wrapping_add(PHILOX_W32_0),
        key[1].wrapping_add(PHILOX_W32_1),
    ]
}

/// Intermediate (counter, key) pair after some number of rounds.
///
/// `key` is the key the most recent round consumed; before the first round
/// it is the caller's key. Stepping bumps the key before every round except
/// the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundState {
    counter: Counter,
    key: Key,
    rounds_done: u32,
}

impl RoundState {
    /// State before any round has run.
    pub fn new(counter: Counter, key: Key) -> Self {
        Self {
            counter,
            key,
            rounds_done: 0,
        }
    }

    /// Counter words after the rounds applied so far.
    pub fn counter(&self) -> Counter {
        self.counter
    }

    /// Key consumed by the most recent round.
    pub fn key(&self) -> Key {
        self.key
    }

    /// Rounds applied so far.
    pub fn rounds_done(&self) -> u32 {
        self.rounds_done
    }

    /// Apply exactly one more round.
    #[inline(always)]
    pub fn step(self) -> Self {
        let key = if self.rounds_done == 0 {
            self.key
        } else {
            bump_key(self.key)
        };
        Self {
            counter: round(self.counter, key),
            key,
            rounds_done: self.rounds_done.saturating_add(1),
        }
    }

    /// Apply `rounds` more rounds.
    pub fn advance(self, rounds: RoundCount) -> Self {
        (0..rounds.get()).fold(self, |state, _| state.step())
    }
}

/// Philox4x32 with an explicit, already validated round count.
#[inline]
pub fn philox4x32_r(rounds: RoundCount, counter: Counter, key: Key) -> Block {
    RoundState::new(counter, key).advance(rounds).counter
}

/// Philox4x32-10.
#[inline]
pub fn philox4x32(counter: Counter, key: Key) -> Block {
    philox4x32_r(RoundCount::DEFAULT, counter, key)
}

/// Generate one output block, rejecting round counts above 16.
pub fn generate(counter: Counter, key: Key, rounds: u32) -> Result<Block> {
    let rounds = RoundCount::new(rounds)?;
    Ok(philox4x32_r(rounds, counter, key))
}

/// Parsed generator name, e.g. `philox4x32`, `philox4x32-7` or `philox4x32_10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhiloxConfig {
    pub rounds: RoundCount,
}

impl PhiloxConfig {
    /// Parse a Random123-style generator name.
    ///
    /// Formats:
    /// - "philox" or "philox4x32" - default round count
    /// - "philox4x32-7" or "philox4x32_7" - explicit round count
    /// - "philox:7" - explicit round count
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let rest = s
            .strip_prefix("philox4x32")
            .or_else(|| s.strip_prefix("philox"))
            .ok_or_else(|| {
                PhiloxError::UnparsableRoundCount(format!(
                    "'{}'. Use: philox4x32, philox4x32-R, philox4x32_R, philox:R",
                    s
                ))
            })?;

        match rest {
            "" => Ok(Self::default()),
            _ => {
                let digits = rest
                    .strip_prefix('-')
                    .or_else(|| rest.strip_prefix('_'))
                    .or_else(|| rest.strip_prefix(':'))
                    .ok_or_else(|| PhiloxError::UnparsableRoundCount(s.clone()))?;
                Ok(Self {
                    rounds: digits.parse()?,
                })
            }
        }
    }

    /// Random123 name for this configuration.
    pub fn name(&self) -> String {
        format!("philox4x32-{}", self.rounds)
    }
}

fn parse_word(s: &str) -> Option<u32> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => s.replace('_', "").parse().ok(),
    }
}

fn parse_words<const N: usize>(s: &str) -> Option<[u32; N]> {
    let mut words = [0u32; N];
    let mut parts = s.split(',');
    for word in words.iter_mut() {
        *word = parse_word(parts.next()?)?;
    }
    match parts.next() {
        Some(_) => None,
        None => Some(words),
    }
}

/// Parse a key written as two comma-separated words (`0,0xdeadbeef`).
pub fn parse_key(s: &str) -> Result<Key> {
    parse_words::<2>(s).ok_or_else(|| PhiloxError::InvalidKey(s.to_string()))
}

/// Parse a counter written as four comma-separated words, word 0 first.
pub fn parse_counter(s: &str) -> Result<Counter> {
    parse_words::<4>(s).ok_or_else(|| PhiloxError::InvalidCounter(s.to_string()))
}

/// Render words as `0x`-prefixed, comma-separated hex, the format the parsers accept.
pub fn format_words(words: &[u32]) -> String {
    words
        .iter()
        .map(|w| format!("{:#010x}", w))
        .collect::<Vec<_>>()
        .join(",")
}
