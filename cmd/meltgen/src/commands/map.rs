//! Map command implementation.

use crate::output::{OutputDir, Stream};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use melt_model::{EventRecord, Incident, LogRecord, MetricRecord, TraceRecord};
use melt_sim::{correlate, Correlation, StreamSlice};
use std::fmt::Write;
use std::fs;
use tracing::info;

/// Streams of one stored day.
#[derive(Debug, Default)]
struct StoredDay {
    events: Vec<EventRecord>,
    metrics: Vec<MetricRecord>,
    logs: Vec<LogRecord>,
    traces: Vec<TraceRecord>,
}

impl StoredDay {
    fn load(out: &OutputDir, date: NaiveDate) -> Result<Self> {
        Ok(Self {
            events: out.read_day(Stream::Events, date)?,
            metrics: out.read_day(Stream::Metrics, date)?,
            logs: out.read_day(Stream::Logs, date)?,
            traces: out.read_day(Stream::Traces, date)?,
        })
    }

    fn slice(&self) -> StreamSlice<'_> {
        StreamSlice {
            events: &self.events,
            metrics: &self.metrics,
            logs: &self.logs,
            traces: &self.traces,
        }
    }
}

/// Runs the map command.
pub fn run(incident_id: &str, output_path: &str, save: Option<&str>) -> Result<()> {
    let out = OutputDir::new(output_path);
    let catalog = out.read_catalog()?;
    let incident = catalog
        .find(incident_id)
        .with_context(|| format!("No incident matches '{incident_id}'"))?;

    let days = covered_dates(incident)
        .into_iter()
        .map(|date| StoredDay::load(&out, date))
        .collect::<Result<Vec<_>>>()?;
    let slices: Vec<StreamSlice<'_>> = days.iter().map(StoredDay::slice).collect();
    let correlation = correlate(incident, &slices);
    info!(
        "Scanned {} day file set(s) for {}",
        Stream::ALL.len() * days.len(),
        incident.id
    );

    print!("{}", render(incident, &correlation));

    if let Some(path) = save {
        let json = serde_json::to_string_pretty(&correlation)
            .context("Failed to serialize correlation")?;
        fs::write(path, json).with_context(|| format!("Failed to write correlation: {path}"))?;
        info!("Correlation written to: {}", path);
    }
    Ok(())
}

/// Calendar dates touched by the incident window.
fn covered_dates(incident: &Incident) -> Vec<NaiveDate> {
    let last = incident.end_time.date_naive();
    incident
        .start_time
        .date_naive()
        .iter_days()
        .take_while(|d| *d <= last)
        .collect()
}

fn render(incident: &Incident, correlation: &Correlation) -> String {
    let summary = &correlation.summary;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} on {} ({})",
        incident.id, incident.incident_type, incident.target_service, incident.target_host
    );
    let _ = writeln!(
        out,
        "window: {} - {}",
        incident.start_time.format("%Y-%m-%d %H:%M"),
        incident.end_time.format("%Y-%m-%d %H:%M")
    );
    if let Some(parent) = &incident.cascaded_from {
        let _ = writeln!(out, "caused by: {parent} (hop {})", incident.hop);
    }
    let _ = writeln!(
        out,
        "affected: {} service(s), {} host(s)",
        incident.affected_services.len(),
        incident.affected_hosts.len()
    );
    let _ = writeln!(out, "events: {}", correlation.events.len());
    for (kind, count) in &summary.events_by_kind {
        let _ = writeln!(out, "  {:<20} {count}", kind.as_str());
    }
    let _ = writeln!(out, "metric points: {}", summary.metric_points);
    let _ = writeln!(
        out,
        "logs: {} ({} error, {} warning)",
        correlation.logs.len(),
        summary.error_logs,
        summary.warning_logs
    );
    let _ = write!(
        out,
        "traces: {} ({} failed",
        correlation.traces.len(),
        summary.failed_traces
    );
    if let Some(avg) = summary.avg_trace_duration_ms {
        let _ = write!(out, ", avg {avg:.1} ms");
    }
    let _ = writeln!(out, ")");
    out
}
