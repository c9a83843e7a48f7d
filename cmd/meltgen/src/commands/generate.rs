//! Generate command implementation.

use crate::output::OutputDir;
use anyhow::{Context, Result};
use melt_cloud::CloudCatalog;
use melt_model::{CloudNaming, GenerationConfig, PlainNaming};
use melt_sim::{Generator, GroundTruthRecorder};
use std::time::Instant;
use tracing::info;

/// Runs the generate command.
pub fn run(
    config_path: Option<&str>,
    output_path: &str,
    days: Option<u32>,
    seed: Option<u64>,
    plain: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration: {}", path);
            GenerationConfig::from_path(path)
                .with_context(|| format!("Failed to load configuration: {path}"))?
        }
        None => GenerationConfig::default(),
    };
    if let Some(days) = days {
        config = config.with_days(days);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    let naming: Box<dyn CloudNaming> = if plain {
        Box::new(PlainNaming)
    } else {
        Box::new(CloudCatalog::new())
    };
    let generator = Generator::new(config, naming).context("Invalid configuration")?;
    let out = OutputDir::new(output_path);
    let mut recorder = GroundTruthRecorder::new();

    let days_total = generator.config().generation.days_to_generate;
    info!(
        "Generating {} day(s) from {} into {}",
        days_total,
        generator.config().generation.start_date,
        output_path
    );
    let started = Instant::now();
    let mut records = 0usize;
    generator
        .run(&mut recorder, |day| {
            records += day.record_count();
            out.write_day(&day)?;
            info!("[{}/{}] {} written", day.day + 1, days_total, day.date);
            Ok::<(), anyhow::Error>(())
        })
        .context("Generation failed")?;

    let catalog = recorder.finalize(generator.config(), generator.topology());
    out.write_catalog(&catalog)?;

    let summary = &catalog.summary;
    info!(
        "Generated {} records in {:.1}s",
        records,
        started.elapsed().as_secs_f64()
    );
    info!(
        "Incidents: {} ({} primary, {} cascading), {} skipped injection(s)",
        summary.total_incidents,
        summary.primary_incidents,
        summary.cascading_incidents,
        summary.skipped_injections
    );
    info!("Catalog written to: {}", out.catalog_file().display());
    info!("Root cause report written to: {}", out.report_file().display());

    Ok(())
}
