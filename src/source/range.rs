//! Range source - generate blocks for a run of successive counters.

use anyhow::Result;
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::debug;

use super::{CounterIncrement, ProcessStats};
use crate::output::Output;
use crate::philox::{philox4x32_r, Block, Counter, Key, RoundCount};

const CHUNK_SIZE: u64 = 4096;

/// `len` successive counters following `start`.
///
/// Like the reference harness, the counter is incremented before each
/// block, so the first counter yielded is `start` advanced once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRange {
    pub start: Counter,
    pub len: u64,
    pub increment: CounterIncrement,
}

impl CounterRange {
    pub fn new(start: Counter, len: u64, increment: CounterIncrement) -> Self {
        Self {
            start,
            len,
            increment,
        }
    }

    /// Iterate over the counters in this range.
    pub fn iter(&self) -> CounterIter {
        CounterIter {
            counter: self.start,
            remaining: self.len,
            increment: self.increment,
        }
    }

    /// Last counter of the range, or `start` when empty.
    pub fn end(&self) -> Counter {
        self.increment.advance(self.start, self.len as u128)
    }

    /// Whether one stream would revisit a counter within this range.
    pub fn wraps(&self) -> bool {
        self.len as u128 > self.increment.period()
    }

    /// Split into at most `workers` disjoint ranges.
    ///
    /// With `Carry` the pieces are contiguous, so running them one after
    /// another visits exactly the counters of the whole range. With
    /// `LowWord` each piece becomes its own stream in word 3 (offset by the
    /// worker index), which keeps pieces disjoint even if word 0 wraps.
    pub fn partition(&self, workers: usize) -> Vec<CounterRange> {
        let workers = (workers.max(1) as u64).min(self.len.max(1));
        let share = self.len / workers;
        let extra = self.len % workers;

        let mut parts = Vec::with_capacity(workers as usize);
        let mut offset = 0u64;
        for i in 0..workers {
            let len = share + u64::from(i < extra);
            let start = match self.increment {
                CounterIncrement::Carry => self.increment.advance(self.start, offset as u128),
                CounterIncrement::LowWord => {
                    let mut start = self.start;
                    start[3] = start[3].wrapping_add(i as u32);
                    start
                }
            };
            debug!(worker = i, len, start = ?start, "partitioned counter range");
            parts.push(CounterRange::new(start, len, self.increment));
            offset += len;
        }
        parts
    }

    /// Generate every block of the range in parallel chunks and write them
    /// to `output` in counter order.
    ///
    /// At most one chunk per rayon thread is held in memory at a time.
    pub fn process(
        &self,
        key: Key,
        rounds: RoundCount,
        output: &dyn Output,
        progress: Option<&ProgressBar>,
    ) -> Result<ProcessStats> {
        let batch = rayon::current_num_threads().max(1);
        self.process_batched(key, rounds, output, progress, CHUNK_SIZE, batch)
    }

    fn process_batched(
        &self,
        key: Key,
        rounds: RoundCount,
        output: &dyn Output,
        progress: Option<&ProgressBar>,
        chunk_size: u64,
        batch: usize,
    ) -> Result<ProcessStats> {
        let mut chunks = self.chunks(chunk_size).peekable();
        let mut batches = 0u64;

        while chunks.peek().is_some() {
            let pending: Vec<CounterRange> = chunks.by_ref().take(batch).collect();

            let blocks: Vec<Vec<(Counter, Block)>> = pending
                .par_iter()
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|ctr| (ctr, philox4x32_r(rounds, ctr, key)))
                        .collect()
                })
                .collect();

            for (ctr, block) in blocks.iter().flatten() {
                output.block(ctr, block)?;
            }

            if let Some(pb) = progress {
                pb.inc(pending.iter().map(|c| c.len).sum());
            }
            batches += 1;
        }
        output.flush()?;

        debug!(batches, chunk_size, "range processed");

        Ok(ProcessStats {
            counters_processed: self.len,
            words_generated: self.len * 4,
        })
    }

    /// Consecutive sub-ranges of at most `size` counters, in order.
    pub fn chunks(&self, size: u64) -> impl Iterator<Item = CounterRange> + '_ {
        let size = size.max(1);
        let count = self.len.div_ceil(size);
        (0..count).map(move |i| {
            let offset = i * size;
            CounterRange::new(
                self.increment.advance(self.start, offset as u128),
                size.min(self.len - offset),
                self.increment,
            )
        })
    }
}

impl IntoIterator for &CounterRange {
    type Item = Counter;
    type IntoIter = CounterIter;

    fn into_iter(self) -> CounterIter {
        self.iter()
    }
}

/// Iterator over the counters of a [`CounterRange`].
#[derive(Debug, Clone)]
pub struct CounterIter {
    counter: Counter,
    remaining: u64,
    increment: CounterIncrement,
}

impl Iterator for CounterIter {
    type Item = Counter;

    #[inline]
    fn next(&mut self) -> Option<Counter> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.counter = self.increment.step(self.counter);
        Some(self.counter)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, usize::try_from(self.remaining).ok())
    }
}

impl ExactSizeIterator for CounterIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    const KEY: Key = [0, 0xDEADBEEF];

    struct CollectOutput(Mutex<Vec<(Counter, Block)>>);

    impl Output for CollectOutput {
        fn block(&self, counter: &Counter, block: &Block) -> Result<()> {
            self.0.lock().unwrap().push((*counter, *block));
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    fn run(range: &CounterRange) -> Vec<Block> {
        range
            .iter()
            .map(|c| philox4x32_r(RoundCount::DEFAULT, c, KEY))
            .collect()
    }

    #[test]
    fn test_iter_increments_before_first_block() {
        let range = CounterRange::new([0; 4], 3, CounterIncrement::LowWord);
        let counters: Vec<Counter> = range.iter().collect();
        assert_eq!(counters, vec![[1, 0, 0, 0], [2, 0, 0, 0], [3, 0, 0, 0]]);
        assert_eq!(range.end(), [3, 0, 0, 0]);
        assert_eq!(range.iter().len(), 3);
    }

    #[test]
    fn test_low_word_range_wraps() {
        let range = CounterRange::new([u32::MAX - 1, 7, 0, 0], 3, CounterIncrement::LowWord);
        let counters: Vec<Counter> = range.iter().collect();
        assert_eq!(counters, vec![[u32::MAX, 7, 0, 0], [0, 7, 0, 0], [1, 7, 0, 0]]);
        assert!(!range.wraps());
    }

    #[test]
    fn test_carry_partition_concatenates_to_whole() {
        let range = CounterRange::new([u32::MAX - 10, 0, 0, 0], 103, CounterIncrement::Carry);
        let parts = range.partition(4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts.iter().map(|p| p.len).sum::<u64>(), 103);

        let whole: Vec<Counter> = range.iter().collect();
        let joined: Vec<Counter> = parts.iter().flat_map(|p| p.iter()).collect();
        assert_eq!(whole, joined);
    }

    #[test]
    fn test_low_word_partition_uses_distinct_streams() {
        let range = CounterRange::new([0; 4], 10, CounterIncrement::LowWord);
        let parts = range.partition(3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(|p| p.start[3]).collect::<Vec<_>>(), vec![0, 1, 2]);

        let mut all: Vec<Counter> = parts.iter().flat_map(|p| p.iter()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_partition_more_workers_than_counters() {
        let range = CounterRange::new([0; 4], 2, CounterIncrement::Carry);
        assert_eq!(range.partition(8).len(), 2);

        let empty = CounterRange::new([0; 4], 0, CounterIncrement::Carry);
        let parts = empty.partition(8);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len, 0);
    }

    #[test]
    fn test_chunks_cover_range_in_order() {
        let range = CounterRange::new([5, 0, 0, 0], 10, CounterIncrement::Carry);
        let chunks: Vec<CounterRange> = range.chunks(4).collect();
        assert_eq!(chunks.iter().map(|c| c.len).collect::<Vec<_>>(), vec![4, 4, 2]);

        let joined: Vec<Counter> = chunks.iter().flat_map(|c| c.iter()).collect();
        assert_eq!(joined, range.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_partitions_match_sequential() {
        let a = CounterRange::new([0, 0, 0, 0], 20_000, CounterIncrement::Carry);
        let b = CounterRange::new([0, 0, 0, 1], 20_000, CounterIncrement::Carry);

        let seq_ab = (run(&a), run(&b));
        let seq_b = run(&b);
        let seq_a = run(&a);

        let (par_a, par_b) = thread::scope(|s| {
            let ha = s.spawn(|| run(&a));
            let hb = s.spawn(|| run(&b));
            (ha.join().unwrap(), hb.join().unwrap())
        });

        assert_eq!(par_a, seq_ab.0);
        assert_eq!(par_b, seq_ab.1);
        assert_eq!(par_a, seq_a);
        assert_eq!(par_b, seq_b);
    }

    fn expected(range: &CounterRange) -> Vec<(Counter, Block)> {
        range
            .iter()
            .map(|c| (c, philox4x32_r(RoundCount::DEFAULT, c, KEY)))
            .collect()
    }

    #[test]
    fn test_process_writes_in_counter_order() {
        let range = CounterRange::new([0; 4], CHUNK_SIZE * 2 + 17, CounterIncrement::Carry);
        let out = CollectOutput(Mutex::new(Vec::new()));

        let stats = range.process(KEY, RoundCount::DEFAULT, &out, None).unwrap();
        assert_eq!(stats.counters_processed, CHUNK_SIZE * 2 + 17);
        assert_eq!(stats.words_generated, (CHUNK_SIZE * 2 + 17) * 4);

        assert_eq!(out.0.into_inner().unwrap(), expected(&range));
    }

    #[test]
    fn test_process_spanning_many_batches_keeps_order() {
        // 7 chunks of 5 per batch, 1003 counters: 29 batches, the last one partial
        let range = CounterRange::new([u32::MAX - 300, 0, 0, 0], 1003, CounterIncrement::Carry);
        let out = CollectOutput(Mutex::new(Vec::new()));

        let stats = range
            .process_batched(KEY, RoundCount::DEFAULT, &out, None, 5, 7)
            .unwrap();
        assert_eq!(stats.counters_processed, 1003);

        assert_eq!(out.0.into_inner().unwrap(), expected(&range));
    }

    #[test]
    fn test_process_writes_each_batch_before_the_next() {
        struct CountingOutput {
            written: Mutex<u64>,
            progress: ProgressBar,
        }

        impl Output for CountingOutput {
            fn block(&self, _counter: &Counter, _block: &Block) -> Result<()> {
                let mut written = self.written.lock().unwrap();
                // the bar only moves after a whole batch has been written
                assert!(self.progress.position() <= *written);
                assert!(*written - self.progress.position() < 4 * 3);
                *written += 1;
                Ok(())
            }

            fn flush(&self) -> Result<()> {
                Ok(())
            }
        }

        let range = CounterRange::new([0; 4], 100, CounterIncrement::LowWord);
        let out = CountingOutput {
            written: Mutex::new(0),
            progress: ProgressBar::hidden(),
        };

        range
            .process_batched(KEY, RoundCount::DEFAULT, &out, Some(&out.progress), 4, 3)
            .unwrap();
        assert_eq!(*out.written.lock().unwrap(), 100);
        assert_eq!(out.progress.position(), 100);
    }

    #[test]
    fn test_process_empty_range() {
        let range = CounterRange::new([0; 4], 0, CounterIncrement::Carry);
        let out = CollectOutput(Mutex::new(Vec::new()));
        let pb = ProgressBar::hidden();

        let stats = range.process(KEY, RoundCount::DEFAULT, &out, Some(&pb)).unwrap();
        assert_eq!(stats.counters_processed, 0);
        assert!(out.0.into_inner().unwrap().is_empty());
        assert_eq!(pb.position(), 0);
    }

    #[test]
    fn test_process_advances_progress() {
        let range = CounterRange::new([0; 4], CHUNK_SIZE + 3, CounterIncrement::Carry);
        let out = CollectOutput(Mutex::new(Vec::new()));
        let pb = ProgressBar::hidden();

        range.process(KEY, RoundCount::DEFAULT, &out, Some(&pb)).unwrap();
        assert_eq!(pb.position(), CHUNK_SIZE + 3);
    }
}
