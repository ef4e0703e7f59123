use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    info!(
        "Loaded network group '{}' with {} region(s), topology {}",
        config.name,
        config.regions.len(),
        config.topology
    );

    config.validate()?;
    warn_on_ignored_settings(&config);

    Ok(config)
}

/// Warn about settings that are accepted but have no effect
fn warn_on_ignored_settings(config: &Config) {
    if !config.dns.enabled {
        let flagged: Vec<&str> = config
            .regions
            .iter()
            .filter(|r| r.cross_region_dns.is_some())
            .map(|r| r.id.as_str())
            .collect();
        if !flagged.is_empty() {
            warn!(
                "dns is disabled; cross_region_dns settings on {:?} are ignored",
                flagged
            );
        }
    }

    if config.regions.len() == 1 {
        info!("Single-region group: no peering links will be created");
    }
}
