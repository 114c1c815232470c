//! Throughput benchmark for the generator.
//!
//! Mirrors the classic Random123 timing loop: advance the counter, generate a
//! block, fold its four words into a running sum. The sum keeps the compiler
//! from discarding the work and doubles as a cheap fingerprint of the stream.

use anyhow::Result;
use rayon::prelude::*;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::philox::{format_words, philox4x32_r, Counter, Key, RoundCount};
use crate::source::{CounterIncrement, CounterRange};

/// Key used by the reference harness.
pub const DEFAULT_KEY: Key = [0, 0xDEAD_BEAF];

/// Words generated by the reference harness.
pub const DEFAULT_WORDS: u64 = 1_000_000_000;

/// Benchmark parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Target number of 32-bit words; rounded down to whole blocks.
    pub words: u64,
    pub key: Key,
    pub rounds: RoundCount,
    pub start: Counter,
    pub increment: CounterIncrement,
    /// Worker threads; 1 runs the plain sequential loop.
    pub workers: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            words: DEFAULT_WORDS,
            key: DEFAULT_KEY,
            rounds: RoundCount::DEFAULT,
            start: [0; 4],
            increment: CounterIncrement::LowWord,
            workers: 1,
        }
    }
}

impl BenchConfig {
    /// Number of blocks generated.
    pub fn blocks(&self) -> u64 {
        self.words / 4
    }

    /// The counter range the benchmark walks.
    pub fn range(&self) -> CounterRange {
        CounterRange::new(self.start, self.blocks(), self.increment)
    }
}

/// Sum and count of generated words.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub sum: u64,
    pub count: u64,
}

impl Tally {
    fn merge(self, other: Tally) -> Tally {
        Tally {
            sum: self.sum.wrapping_add(other.sum),
            count: self.count + other.count,
        }
    }
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchReport {
    pub elapsed: Duration,
    pub sum: u64,
    pub count: u64,
}

impl BenchReport {
    /// Words per second, truncated to whole millions.
    pub fn words_per_second(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0;
        }
        let millions = (self.count as f64 / secs / 1_000_000.0) as u64;
        millions * 1_000_000
    }

    /// Single-line JSON for benchmark runners.
    pub fn to_json(&self, config: &BenchConfig) -> String {
        format!(
            "{{ \"name\": \"philox4x32-{}\", \"increment\": \"{}\", \"workers\": {}, \"words_per_sec\": {}, \"total_words\": {}, \"sum\": \"{:#x}\", \"duration_secs\": {} }}",
            config.rounds,
            config.increment.as_str(),
            config.workers,
            self.words_per_second(),
            self.count,
            self.sum,
            self.elapsed.as_secs_f64()
        )
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:.10} seconds", self.elapsed.as_secs_f64())?;
        writeln!(f, "sum: {:#x}", self.sum)?;
        writeln!(f, "count: {}", self.count)?;
        writeln!(f, "{} randoms per second", self.words_per_second())
    }
}

/// Generate every block of `range` and tally its words.
pub fn tally(range: &CounterRange, key: Key, rounds: RoundCount) -> Tally {
    let mut sum = 0u64;
    let mut count = 0u64;
    for ctr in range {
        let out = philox4x32_r(rounds, ctr, key);
        for word in out {
            sum = sum.wrapping_add(word as u64);
            count += 1;
        }
    }
    Tally { sum, count }
}

/// Run the benchmark described by `config`.
pub fn run_benchmark(config: &BenchConfig) -> Result<BenchReport> {
    info!(
        blocks = config.blocks(),
        rounds = config.rounds.get(),
        key = %format_words(&config.key),
        increment = config.increment.as_str(),
        workers = config.workers,
        "starting benchmark"
    );

    let range = config.range();

    let (totals, elapsed) = if config.workers <= 1 {
        if range.wraps() {
            warn!("low-word increment wraps after 2^32 blocks; the stream repeats");
        }
        let start = Instant::now();
        let totals = tally(&range, config.key, config.rounds);
        (totals, start.elapsed())
    } else {
        let parts = range.partition(config.workers);
        if parts.iter().any(CounterRange::wraps) {
            warn!("low-word increment wraps after 2^32 blocks per worker; streams repeat");
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()?;

        let start = Instant::now();
        let totals = pool.install(|| {
            parts
                .par_iter()
                .map(|part| {
                    let t = tally(part, config.key, config.rounds);
                    debug!(start = ?part.start, words = t.count, "worker finished");
                    t
                })
                .reduce(Tally::default, Tally::merge)
        });
        (totals, start.elapsed())
    };

    let report = BenchReport {
        elapsed,
        sum: totals.sum,
        count: totals.count,
    };

    info!(
        words = report.count,
        secs = report.elapsed.as_secs_f64(),
        words_per_sec = report.words_per_second(),
        "benchmark finished"
    );

    Ok(report)
}
