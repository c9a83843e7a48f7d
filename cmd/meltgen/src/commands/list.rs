//! List command implementation.

use crate::output::OutputDir;
use anyhow::Result;
use melt_model::Incident;
use melt_sim::Catalog;
use std::fmt::Write;
use tracing::info;

/// Runs the list command.
pub fn run(output_path: &str, incident_type: Option<&str>, primary_only: bool) -> Result<()> {
    let catalog = OutputDir::new(output_path).read_catalog()?;
    let rows: Vec<&Incident> = catalog
        .incidents
        .iter()
        .filter(|i| !primary_only || i.is_primary())
        .filter(|i| incident_type.map_or(true, |t| i.incident_type.as_str().eq_ignore_ascii_case(t)))
        .collect();

    info!("{} of {} incident(s)", rows.len(), catalog.incidents.len());
    print!("{}", render(&catalog, &rows));
    Ok(())
}

/// One line per incident, with the parent of cascades.
pub fn render(catalog: &Catalog, rows: &[&Incident]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8}  {:<16}  {:>5}  {:<24}  {:<3}  {:<24}  {}",
        "ID", "START", "MIN", "TYPE", "HOP", "SERVICE", "CAUSE"
    );
    for incident in rows {
        let cause = incident
            .cascaded_from
            .as_ref()
            .and_then(|parent| catalog.find(parent.as_str()))
            .map_or_else(|| "-".to_string(), |p| format!("{} ({})", p.id.short(), p.incident_type));
        let _ = writeln!(
            out,
            "{:<8}  {:<16}  {:>5}  {:<24}  {:<3}  {:<24}  {}",
            incident.id.short(),
            incident.start_time.format("%Y-%m-%d %H:%M").to_string(),
            incident.duration().num_minutes(),
            incident.incident_type.as_str(),
            incident.hop,
            incident.target_service,
            cause
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use melt_model::{CloudProvider, Host, IncidentId, IncidentType};
    use melt_sim::{CatalogSettings, CatalogSummary};
    use std::collections::BTreeMap;

    fn catalog() -> Catalog {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let web = Host::new("web-00", "web", CloudProvider::Onpremise, "on-prem-dc1");
        let db = Host::new("db-00", "db", CloudProvider::Onpremise, "on-prem-dc1");
        let root = Incident::new(
            IncidentId::new("1f2e3d4c-aaaa-bbbb-cccc-000000000001"),
            IncidentType::NetworkPacketLoss,
            &web,
            start,
            start + Duration::minutes(90),
        );
        let child = Incident::new(
            IncidentId::new("9a8b7c6d-aaaa-bbbb-cccc-000000000002"),
            IncidentType::DependencyDegradation,
            &db,
            start + Duration::minutes(30),
            start + Duration::minutes(80),
        )
        .as_cascade_of(&root);
        Catalog {
            generation_config: CatalogSettings {
                start_date: start.date_naive(),
                days_generated: 1,
                granularity_minutes: 15,
                total_hosts: 2,
                services: vec!["web".into(), "db".into()],
                regions: vec!["on-prem-dc1".into()],
                seed: 42,
            },
            incidents: vec![root, child],
            summary: CatalogSummary {
                total_incidents: 2,
                primary_incidents: 1,
                cascading_incidents: 1,
                incident_types: BTreeMap::new(),
                clouds: BTreeMap::new(),
                skipped_injections: 0,
            },
            skipped_injections: Vec::new(),
        }
    }

    #[test]
    fn rows_show_cause_of_cascades() {
        let catalog = catalog();
        let rows: Vec<&Incident> = catalog.incidents.iter().collect();
        insta::assert_snapshot!(render(&catalog, &rows), @r"
        ID        START               MIN  TYPE                      HOP  SERVICE                   CAUSE
        1f2e3d4c  2024-06-01 09:00     90  NETWORK_PACKET_LOSS       0    web                       -
        9a8b7c6d  2024-06-01 09:30     50  DEPENDENCY_DEGRADATION    1    db                        1f2e3d4c (NETWORK_PACKET_LOSS)
        ");
    }
}
