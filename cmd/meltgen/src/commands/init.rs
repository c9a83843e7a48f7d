//! Init command implementation.

use anyhow::{Context, Result};
use melt_model::GenerationConfig;
use std::fs;
use std::path::Path;
use tracing::info;

/// Runs the init command.
pub fn run(path: &str, force: bool) -> Result<()> {
    let config_path = Path::new(path);
    if config_path.exists() && !force {
        info!("Skipped: {} (already exists, use --force)", config_path.display());
        return Ok(());
    }

    let content = render_default(config_path)?;
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(config_path, content)
        .with_context(|| format!("Failed to write configuration: {}", config_path.display()))?;
    info!("Created: {}", config_path.display());

    info!("");
    info!("Next steps:");
    info!("  1. Edit {} (topology, clouds, incident mix)", config_path.display());
    info!("  2. Run 'meltgen generate --config {}'", config_path.display());
    info!("  3. Run 'meltgen summary' to inspect the catalog");

    Ok(())
}

/// Serializes the default configuration in the format implied by `path`.
fn render_default(path: &Path) -> Result<String> {
    let config = GenerationConfig::default();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => {
            serde_yaml::to_string(&config).context("Failed to serialize configuration")
        }
        Some("json") | None => config
            .to_json_pretty()
            .context("Failed to serialize configuration"),
        Some(other) => anyhow::bail!("Unknown configuration format: .{other}. Use .json or .yaml."),
    }
}
