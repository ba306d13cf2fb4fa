use std::path::Path;

use serde_json::{json, Value};

use crate::binning::BinnedSeries;
use crate::chart::ChartDescriptor;
use crate::error::{Error, Result};

const BUCKET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Writes the full dense table: one row per bucket, one column per command
/// in first-appearance order, and a trailing `total` column.
pub fn write_csv(binned: &BinnedSeries, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["bucket".to_string()];
    header.extend(binned.commands().iter().cloned());
    header.push("total".to_string());
    writer.write_record(&header)?;

    let totals = binned.totals_by_bucket();
    for (bucket_index, bucket) in binned.buckets().iter().enumerate() {
        let mut row = vec![bucket.format(BUCKET_FORMAT).to_string()];
        for command_index in 0..binned.commands().len() {
            row.push(binned.counts_at(command_index)[bucket_index].to_string());
        }
        row.push(totals[bucket_index].to_string());
        writer.write_record(&row)?;
    }

    writer.flush().map_err(|e| Error::io(path, e))?;
    tracing::info!(path = %path.display(), rows = binned.buckets().len(), "wrote csv");
    Ok(())
}

pub fn summary_json(chart: &ChartDescriptor, binned: &BinnedSeries, skipped_timestamps: usize) -> Value {
    let buckets: Vec<String> = chart
        .buckets
        .iter()
        .map(|bucket| bucket.format(BUCKET_FORMAT).to_string())
        .collect();
    let top: Vec<Value> = chart
        .series
        .iter()
        .map(|series| {
            json!({
                "command": series.command,
                "total": series.total,
                "counts": series.counts,
            })
        })
        .collect();

    json!({
        "events": binned.total(),
        "unique_commands": binned.commands().len(),
        "skipped_timestamps": skipped_timestamps,
        "interval_seconds": chart.interval_seconds,
        "buckets": buckets,
        "total": chart.total,
        "top": top,
    })
}
