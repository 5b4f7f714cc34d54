use crate::models::EngineConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the engine configuration inside the config directory.
pub const ENGINE_CONFIG_FILE: &str = "Engine Config.yaml";

/// Loads and saves the YAML engine configuration.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    engine_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager for `config_dir`, creating the directory if missing.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            engine_config_path: config_dir.join(ENGINE_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the engine configuration.
    ///
    /// # Returns
    /// The loaded EngineConfig, or defaults if the file doesn't exist
    pub fn load_engine_config(&self) -> Result<EngineConfig> {
        if !self.engine_config_path.exists() {
            tracing::warn!(
                "Engine config file not found at {}, using defaults",
                self.engine_config_path
            );
            return Ok(EngineConfig::default());
        }

        let file_contents = fs::read_to_string(&self.engine_config_path).with_context(|| {
            format!("Failed to read engine config: {}", self.engine_config_path)
        })?;

        let config: EngineConfig = serde_yaml_ng::from_str(&file_contents).with_context(|| {
            format!("Failed to parse engine config: {}", self.engine_config_path)
        })?;

        tracing::info!("Loaded engine config from {}", self.engine_config_path);
        Ok(config)
    }

    pub fn save_engine_config(&self, config: &EngineConfig) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(config)
            .context("Failed to serialize engine config to YAML")?;

        fs::write(&self.engine_config_path, yaml_string).with_context(|| {
            format!("Failed to write engine config: {}", self.engine_config_path)
        })?;

        tracing::info!("Saved engine config to {}", self.engine_config_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn engine_config_path(&self) -> &Utf8Path {
        &self.engine_config_path
    }
}
