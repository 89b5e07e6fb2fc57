// Configuration module for sigmf-recorder
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    load_with_overrides(Some(path.as_ref()), &ConfigOverrides::default())
}

/// Command-line values that take precedence over the file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_dir: Option<String>,
    pub filename: Option<String>,
    pub inputs: Vec<PathBuf>,
    pub disable_handshake: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut RecorderConfig) {
        if let Some(output_dir) = &self.output_dir {
            config.capture.output_dir = output_dir.clone();
        }
        if let Some(filename) = &self.filename {
            config.capture.filename = filename.clone();
        }
        if !self.inputs.is_empty() {
            config.source.inputs = self.inputs.clone();
        }
        if self.disable_handshake {
            config.handshake.enabled = false;
        }
    }
}

/// Resolve the final configuration: file (or defaults), then environment,
/// then command line, validated once at the end
pub fn load_with_overrides(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<RecorderConfig> {
    let mut config = match path {
        Some(path) => ConfigLoader::read(path).context("Failed to load configuration")?,
        None => RecorderConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    overrides.apply(&mut config);

    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Allow environment variables to override config values
pub fn apply_env_overrides(config: &mut RecorderConfig) -> Result<()> {
    if let Ok(output_dir) = std::env::var("RECORDER_OUTPUT_DIR") {
        config.capture.output_dir = output_dir;
    }

    if let Ok(filename) = std::env::var("RECORDER_FILENAME") {
        config.capture.filename = filename;
    }

    if let Ok(port) = std::env::var("RECORDER_HANDSHAKE_PORT") {
        config.handshake.port = port
            .parse()
            .with_context(|| format!("Invalid RECORDER_HANDSHAKE_PORT: '{}'", port))?;
    }

    Ok(())
}
