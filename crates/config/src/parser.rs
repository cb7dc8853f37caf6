use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Read a YAML file, substitute environment variables and parse it.
#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MasterConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());
    parse_config(&content)
}

/// Parse YAML text after environment variable substitution.
pub fn parse_config(content: &str) -> Result<MasterConfig> {
    let substituted = substitution::substitute_env_vars(content)?;

    // An empty file deserializes to YAML null, not an empty mapping
    if substituted.trim().is_empty() {
        return Ok(MasterConfig::default());
    }

    let config: MasterConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Configuration written by `weatherhub init`.
#[instrument]
pub fn generate_default_config() -> MasterConfig {
    MasterConfig {
        station: StationConfig {
            name: default_station_name(),
            description: "Backyard temperature and humidity station".to_string(),
        },
        server: ServerSettings {
            static_dir: Some("public".to_string()),
            ..ServerSettings::default()
        },
        ..MasterConfig::default()
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &MasterConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weatherhub.yaml");

        let config = generate_default_config();
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.server.static_dir.as_deref(), Some("public"));
    }

    #[test]
    fn test_empty_content_is_default() {
        assert_eq!(parse_config("").unwrap(), MasterConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(parse_config("server: [unclosed").is_err());
    }
}
