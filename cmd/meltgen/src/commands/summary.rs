//! Summary command implementation.

use crate::output::OutputDir;
use anyhow::Result;
use melt_sim::Catalog;
use std::fmt::Write;

/// Runs the summary command.
pub fn run(output_path: &str, report: bool) -> Result<()> {
    let catalog = OutputDir::new(output_path).read_catalog()?;
    print!("{}", render(&catalog));
    if report {
        println!();
        print!("{}", catalog.root_cause_report());
    }
    Ok(())
}

/// Run settings followed by counts per type and per provider.
pub fn render(catalog: &Catalog) -> String {
    let settings = &catalog.generation_config;
    let summary = &catalog.summary;
    let mut out = String::new();
    let _ = writeln!(out, "seed:        {}", settings.seed);
    let _ = writeln!(
        out,
        "window:      {} + {} day(s) at {} min",
        settings.start_date, settings.days_generated, settings.granularity_minutes
    );
    let _ = writeln!(
        out,
        "fleet:       {} host(s), {} service(s), {} region(s)",
        settings.total_hosts,
        settings.services.len(),
        settings.regions.len()
    );
    let _ = writeln!(
        out,
        "incidents:   {} ({} primary, {} cascading)",
        summary.total_incidents, summary.primary_incidents, summary.cascading_incidents
    );
    let _ = writeln!(out, "skipped:     {}", summary.skipped_injections);

    if !summary.incident_types.is_empty() {
        let _ = writeln!(out, "\nby type:");
        for (incident_type, count) in &summary.incident_types {
            let _ = writeln!(out, "  {:<24} {count:>4}", incident_type.as_str());
        }
    }
    if !summary.clouds.is_empty() {
        let _ = writeln!(out, "\nby cloud:");
        for (cloud, count) in &summary.clouds {
            let _ = writeln!(out, "  {:<24} {count:>4}", cloud.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use melt_model::{CloudProvider, IncidentType};
    use melt_sim::{CatalogSettings, CatalogSummary};
    use std::collections::BTreeMap;

    #[test]
    fn summary_lists_counts() {
        let catalog = Catalog {
            generation_config: CatalogSettings {
                start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                days_generated: 30,
                granularity_minutes: 15,
                total_hosts: 25,
                services: vec!["web".into(); 5],
                regions: vec!["on-prem-dc1".into()],
                seed: 7,
            },
            incidents: Vec::new(),
            summary: CatalogSummary {
                total_incidents: 12,
                primary_incidents: 8,
                cascading_incidents: 4,
                incident_types: BTreeMap::from([
                    (IncidentType::MemoryLeak, 3),
                    (IncidentType::DependencyDegradation, 9),
                ]),
                clouds: BTreeMap::from([(CloudProvider::Onpremise, 12)]),
                skipped_injections: 1,
            },
            skipped_injections: Vec::new(),
        };
        insta::assert_snapshot!(render(&catalog), @r"
        seed:        7
        window:      2024-06-01 + 30 day(s) at 15 min
        fleet:       25 host(s), 5 service(s), 1 region(s)
        incidents:   12 (8 primary, 4 cascading)
        skipped:     1

        by type:
          MEMORY_LEAK                 3
          DEPENDENCY_DEGRADATION      9

        by cloud:
          onpremise                  12
        ");
    }
}
