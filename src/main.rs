//! philox4x32 - generate, benchmark and check Philox4x32 output blocks.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use philox4x32::benchmark::{run_benchmark, BenchConfig, DEFAULT_WORDS};
use philox4x32::check::{check_collisions, verify_known_answers};
use philox4x32::output::{ConsoleOutput, Output};
use philox4x32::philox::{format_words, parse_counter, parse_key, PhiloxConfig};
use philox4x32::source::{CounterIncrement, CounterRange};
use philox4x32::{Counter, Key, PhiloxError, RoundCount};

/// Accepts a bare number (`7`) or a generator name (`philox4x32-7`).
fn parse_rounds(s: &str) -> Result<RoundCount, PhiloxError> {
    match s.parse::<RoundCount>() {
        Err(PhiloxError::UnparsableRoundCount(_)) => Ok(PhiloxConfig::parse(s)?.rounds),
        other => other,
    }
}

#[derive(Parser)]
#[command(name = "philox4x32")]
#[command(about = "Philox4x32 counter-based random number generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print output blocks for a run of counters
    Generate {
        /// Counter before the first block, four words, word 0 first
        #[arg(long, value_parser = parse_counter, default_value = "0,0,0,0")]
        start: Counter,

        /// Number of blocks
        #[arg(long, default_value_t = 16)]
        count: u64,

        /// Key, two words (e.g. 0,0xdeadbeef)
        #[arg(long, value_parser = parse_key, default_value = "0,0")]
        key: Key,

        /// Round count (0-16) or generator name (philox4x32-7)
        #[arg(long, value_parser = parse_rounds, default_value = "10", allow_hyphen_values = true)]
        rounds: RoundCount,

        /// Counter increment between blocks
        #[arg(long, value_enum, default_value_t = CounterIncrement::Carry)]
        increment: CounterIncrement,

        /// Print only the output words
        #[arg(long)]
        raw: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the throughput benchmark
    Bench {
        /// Number of 32-bit words to generate
        #[arg(long, alias = "iterations", default_value_t = DEFAULT_WORDS)]
        words: u64,

        /// Key, two words
        #[arg(long, value_parser = parse_key, default_value = "0,0xdeadbeaf")]
        key: Key,

        /// Round count (0-16) or generator name (philox4x32-7)
        #[arg(long, value_parser = parse_rounds, default_value = "10", allow_hyphen_values = true)]
        rounds: RoundCount,

        /// Counter increment between blocks
        #[arg(long, value_enum, default_value_t = CounterIncrement::LowWord)]
        increment: CounterIncrement,

        /// Worker threads, each with its own slice of the counter space
        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// Output JSON for benchmark runner
        #[arg(long)]
        json: bool,
    },

    /// Look for repeated outputs over consecutive counters
    Check {
        /// Number of counters to sample
        #[arg(long, default_value_t = 1_000_000)]
        count: u64,

        /// Counter before the first sample
        #[arg(long, value_parser = parse_counter, default_value = "0,0,0,0")]
        start: Counter,

        /// Key, two words
        #[arg(long, value_parser = parse_key, default_value = "0,0xdeadbeef")]
        key: Key,

        /// Round count (0-16) or generator name (philox4x32-7)
        #[arg(long, value_parser = parse_rounds, default_value = "10", allow_hyphen_values = true)]
        rounds: RoundCount,
    },

    /// Run the known-answer vectors
    Verify,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Generate {
            start,
            count,
            key,
            rounds,
            increment,
            raw,
            output,
        } => {
            let out = match output {
                Some(path) => ConsoleOutput::to_file(&path)?,
                None => ConsoleOutput::new(),
            };
            let out: Box<dyn Output> = if raw { Box::new(out.raw()) } else { Box::new(out) };

            let range = CounterRange::new(start, count, increment);
            run_generate(range, key, rounds, out.as_ref(), cli.quiet)
        }

        Command::Bench {
            words,
            key,
            rounds,
            increment,
            workers,
            json,
        } => {
            let config = BenchConfig {
                words,
                key,
                rounds,
                increment,
                workers,
                ..BenchConfig::default()
            };
            let report = run_benchmark(&config)?;
            if json {
                println!("{}", report.to_json(&config));
            } else {
                print!("{}", report);
            }
            Ok(())
        }

        Command::Check {
            count,
            start,
            key,
            rounds,
        } => run_check(count, start, key, rounds, cli.quiet),

        Command::Verify => run_verify(),
    }
}

fn run_generate(
    range: CounterRange,
    key: Key,
    rounds: RoundCount,
    output: &dyn Output,
    quiet: bool,
) -> Result<()> {
    info!(
        count = range.len,
        key = %format_words(&key),
        rounds = rounds.get(),
        increment = range.increment.as_str(),
        "generating blocks"
    );

    let pb = if quiet {
        None
    } else {
        let pb = ProgressBar::new(range.len);
        pb.set_style(philox4x32::default_progress_style());
        Some(pb)
    };

    let stats = range.process(key, rounds, output, pb.as_ref())?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!(
        counters = stats.counters_processed,
        words = stats.words_generated,
        "done"
    );

    Ok(())
}

fn run_check(count: u64, start: Counter, key: Key, rounds: RoundCount, quiet: bool) -> Result<()> {
    let pb = if quiet {
        None
    } else {
        let pb = ProgressBar::new(count);
        pb.set_style(philox4x32::default_progress_style());
        Some(pb)
    };

    let report = check_collisions(key, rounds, start, count, pb.as_ref());

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    println!("samples: {}", report.samples);
    println!("collisions: {}", report.collisions);

    if !report.is_clean() {
        bail!(
            "{} duplicate blocks in {} samples for key {}",
            report.collisions,
            report.samples,
            format_words(&key)
        );
    }

    Ok(())
}

fn run_verify() -> Result<()> {
    let results = verify_known_answers();
    let mut failed = 0;

    for r in &results {
        println!(
            "{} counter={} key={} expected={} actual={}",
            if r.passed() { "ok  " } else { "FAIL" },
            format_words(&r.counter),
            format_words(&r.key),
            format_words(&r.expected),
            format_words(&r.actual)
        );
        if !r.passed() {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} known-answer vectors failed", failed, results.len());
    }

    println!("all {} known-answer vectors passed", results.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bench_words_flag() {
        for flag in ["--words", "--iterations"] {
            let cli = Cli::try_parse_from(["philox4x32", "bench", flag, "16"]).unwrap();
            match cli.command {
                Command::Bench { words, .. } => assert_eq!(words, 16),
                _ => panic!("expected bench"),
            }
        }

        let cli = Cli::try_parse_from(["philox4x32", "bench"]).unwrap();
        match cli.command {
            Command::Bench { words, .. } => assert_eq!(words, DEFAULT_WORDS),
            _ => panic!("expected bench"),
        }
    }

    #[test]
    fn test_generate_quiet_is_global() {
        let cli = Cli::try_parse_from(["philox4x32", "generate", "--count", "4", "--quiet"]).unwrap();
        assert!(cli.quiet);
        match cli.command {
            Command::Generate { count, rounds, .. } => {
                assert_eq!(count, 4);
                assert_eq!(rounds, RoundCount::DEFAULT);
            }
            _ => panic!("expected generate"),
        }
    }
}
