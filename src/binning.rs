use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

use chrono::{Duration, NaiveDateTime};

use crate::history::Event;

/// Dense `(bucket, command) -> count` table.
///
/// Buckets run from the earliest to the latest observed bucket in steps of
/// the interval, with no gaps. Commands keep the order in which they first
/// appear in the log, and every command has a count for every bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinnedSeries {
    interval: NonZeroU32,
    buckets: Vec<NaiveDateTime>,
    commands: Vec<String>,
    // counts[command][bucket] //
    counts: Vec<Vec<u64>>,
}

impl BinnedSeries {
    pub fn from_events(events: &[Event], interval: NonZeroU32) -> Self {
        let step = i64::from(interval.get());

        let mut commands: Vec<String> = Vec::new();
        let mut command_index: HashMap<&str, usize> = HashMap::new();
        let mut per_second: BTreeMap<(i64, usize), u64> = BTreeMap::new();

        for event in events {
            let index = *command_index.entry(event.command.as_str()).or_insert_with(|| {
                commands.push(event.command.clone());
                commands.len() - 1
            });
            let second = event.timestamp.and_utc().timestamp();
            *per_second.entry((second, index)).or_insert(0) += 1;
        }

        let (first, last) = match (per_second.keys().next(), per_second.keys().next_back()) {
            (Some(&(first, _)), Some(&(last, _))) => {
                (first.div_euclid(step) * step, last.div_euclid(step) * step)
            }
            _ => {
                return BinnedSeries {
                    interval,
                    buckets: Vec::new(),
                    commands,
                    counts: Vec::new(),
                }
            }
        };

        let bucket_count = ((last - first) / step) as usize + 1;
        let mut counts = vec![vec![0u64; bucket_count]; commands.len()];
        for (&(second, index), &n) in &per_second {
            let bucket = (second.div_euclid(step) * step - first) / step;
            counts[index][bucket as usize] += n;
        }

        // Unix epoch //
        let epoch = NaiveDateTime::default();
        let buckets = (0..bucket_count as i64)
            .map(|k| epoch + Duration::seconds(first + k * step))
            .collect();

        BinnedSeries {
            interval,
            buckets,
            commands,
            counts,
        }
    }

    pub fn interval(&self) -> NonZeroU32 {
        self.interval
    }

    pub fn buckets(&self) -> &[NaiveDateTime] {
        &self.buckets
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Per-bucket counts of the command at `index` in first-appearance order.
    pub fn counts_at(&self, index: usize) -> &[u64] {
        &self.counts[index]
    }

    #[cfg(test)]
    pub fn counts(&self, command: &str) -> Option<&[u64]> {
        let index = self.commands.iter().position(|c| c == command)?;
        Some(&self.counts[index])
    }

    pub fn totals_by_command(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// Sum over every command, bucket by bucket.
    pub fn totals_by_bucket(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.buckets.len()];
        for row in &self.counts {
            for (total, n) in totals.iter_mut().zip(row) {
                *total += n;
            }
        }
        totals
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}
