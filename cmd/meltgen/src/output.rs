//! On-disk layout of a generated dataset.
//!
//! ```text
//! <root>/metrics/YYYY-MM/metrics_YYYY-MM-DD.json
//! <root>/events/YYYY-MM/events_YYYY-MM-DD.json
//! <root>/logs/YYYY-MM/logs_YYYY-MM-DD.json
//! <root>/traces/YYYY-MM/traces_YYYY-MM-DD.json
//! <root>/metadata/incident_catalog.json
//! <root>/metadata/root_cause.txt
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use melt_sim::{Catalog, DayOutput};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The four per-day streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Metrics,
    Events,
    Logs,
    Traces,
}

impl Stream {
    pub const ALL: [Self; 4] = [Self::Metrics, Self::Events, Self::Logs, Self::Traces];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Events => "events",
            Self::Logs => "logs",
            Self::Traces => "traces",
        }
    }
}

/// Root of a generated dataset.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of one stream file.
    pub fn day_file(&self, stream: Stream, date: NaiveDate) -> PathBuf {
        let kind = stream.as_str();
        self.root
            .join(kind)
            .join(date.format("%Y-%m").to_string())
            .join(format!("{kind}_{}.json", date.format("%Y-%m-%d")))
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.root.join("metadata").join("incident_catalog.json")
    }

    pub fn report_file(&self) -> PathBuf {
        self.root.join("metadata").join("root_cause.txt")
    }

    /// Writes the four streams of one day.
    pub fn write_day(&self, day: &DayOutput) -> Result<()> {
        write_json(&self.day_file(Stream::Metrics, day.date), &day.metrics)?;
        write_json(&self.day_file(Stream::Events, day.date), &day.events)?;
        write_json(&self.day_file(Stream::Logs, day.date), &day.logs)?;
        write_json(&self.day_file(Stream::Traces, day.date), &day.traces)?;
        debug!(date = %day.date, records = day.record_count(), "day written");
        Ok(())
    }

    pub fn write_catalog(&self, catalog: &Catalog) -> Result<()> {
        write_json(&self.catalog_file(), catalog)?;
        let report = self.report_file();
        fs::write(&report, catalog.root_cause_report())
            .with_context(|| format!("Failed to write report: {}", report.display()))
    }

    pub fn read_catalog(&self) -> Result<Catalog> {
        let path = self.catalog_file();
        read_json(&path).with_context(|| {
            format!(
                "No catalog at {}. Run 'meltgen generate' first",
                path.display()
            )
        })
    }

    /// Reads one stream file. A missing file reads as empty.
    pub fn read_day<T: DeserializeOwned>(&self, stream: Stream, date: NaiveDate) -> Result<Vec<T>> {
        let path = self.day_file(stream, date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .with_context(|| format!("Failed to serialize: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse file: {}", path.display()))
}
