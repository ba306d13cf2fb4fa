use chrono::NaiveDateTime;

use crate::binning::BinnedSeries;

/// One stacked layer: a top command, its per-bucket counts, and the height
/// at which each of its segments starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub command: String,
    pub total: u64,
    pub counts: Vec<u64>,
    pub offsets: Vec<u64>,
}

/// Everything the renderer needs, and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDescriptor {
    pub title: String,
    pub interval_seconds: u32,
    pub buckets: Vec<NaiveDateTime>,
    /// Commands per bucket across all commands, not only the stacked ones.
    pub total: Vec<u64>,
    pub series: Vec<Series>,
}

/// Indices (into `binned.commands()`) of the `n` busiest commands with
/// their totals, busiest first. Ties keep first-appearance order.
pub fn top_commands(binned: &BinnedSeries, n: usize) -> Vec<(usize, u64)> {
    let mut ranked: Vec<(usize, u64)> = binned.totals_by_command().into_iter().enumerate().collect();
    // sort_by is stable //
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

/// Running per-bucket sum of the layers below each layer.
pub fn stack_offsets(layers: &[&[u64]]) -> Vec<Vec<u64>> {
    let width = layers.first().map_or(0, |layer| layer.len());
    let mut bottom = vec![0u64; width];
    let mut offsets = Vec::with_capacity(layers.len());
    for layer in layers {
        offsets.push(bottom.clone());
        for (base, n) in bottom.iter_mut().zip(layer.iter()) {
            *base += n;
        }
    }
    offsets
}

pub fn title_for(interval_seconds: u32) -> String {
    match interval_seconds {
        60 => "Commands Run Per Minute".to_string(),
        3600 => "Commands Run Per Hour".to_string(),
        86400 => "Commands Run Per Day".to_string(),
        s if s % 3600 == 0 => format!("Commands Run Per {} Hours", s / 3600),
        s if s % 60 == 0 => format!("Commands Run Per {} Minutes", s / 60),
        s => format!("Commands Run Per {} Seconds", s),
    }
}

impl ChartDescriptor {
    pub fn build(binned: &BinnedSeries, top_n: usize) -> Self {
        let top = top_commands(binned, top_n);
        let layers: Vec<&[u64]> = top.iter().map(|&(index, _)| binned.counts_at(index)).collect();
        let offsets = stack_offsets(&layers);

        let series = top
            .iter()
            .zip(offsets)
            .map(|(&(index, total), offsets)| Series {
                command: binned.commands()[index].clone(),
                total,
                counts: binned.counts_at(index).to_vec(),
                offsets,
            })
            .collect();

        let interval_seconds = binned.interval().get();
        ChartDescriptor {
            title: title_for(interval_seconds),
            interval_seconds,
            buckets: binned.buckets().to_vec(),
            total: binned.totals_by_bucket(),
            series,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Tallest point on the chart; the overlay line is never below a bar.
    pub fn max_value(&self) -> u64 {
        self.total.iter().copied().max().unwrap_or(0)
    }
}
