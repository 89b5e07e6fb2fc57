// Configuration loader with environment variable substitution

use super::types::*;
use crate::sigmf::SampleEncoding;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
        let config = Self::read(path)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration without validating it, for callers that apply
    /// overrides first
    pub fn read<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::deserialize(&content)
    }

    /// Parse and validate YAML text, substituting environment variables first
    pub fn parse(content: &str) -> Result<RecorderConfig> {
        let config = Self::deserialize(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn deserialize(content: &str) -> Result<RecorderConfig> {
        let content = Self::substitute_env_vars(content)?;

        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${CAPTURE_DIR:-/data/captures} -> /data/captures (if CAPTURE_DIR not set)
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}")
            .context("Invalid substitution pattern")?;

        Ok(re
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default_value = caps.get(2).map(|m| m.as_str());

                match std::env::var(var_name) {
                    Ok(value) => value,
                    Err(_) => match default_value {
                        Some(default) => default.to_string(),
                        // Keep original if no default and var not found
                        None => format!("${{{}}}", var_name),
                    },
                }
            })
            .to_string())
    }

    /// Validate configuration
    pub fn validate(config: &RecorderConfig) -> Result<()> {
        let capture = &config.capture;

        if capture.filename.is_empty() {
            bail!("capture.filename cannot be empty");
        }

        if let Err(e) = SampleEncoding::from_item(capture.item_size, capture.complex) {
            bail!("capture.item_size: {}", e);
        }

        if capture.channels == 0 {
            bail!("capture.channels must be > 0");
        }

        if !(capture.sample_rate > 0.0) {
            bail!("capture.sample_rate must be > 0");
        }

        if capture.symbol_length_samples == 0 {
            bail!("capture.symbol_length_samples must be > 0");
        }

        if config.runtime.event_queue_capacity == 0 {
            bail!("runtime.event_queue_capacity must be > 0");
        }

        if config.source.chunk_samples == 0 {
            bail!("source.chunk_samples must be > 0");
        }

        if config.source.boundary_interval_samples == Some(0) {
            bail!("source.boundary_interval_samples must be > 0 when set");
        }

        if config.source.inputs.len() > capture.channels {
            bail!(
                "source.inputs has {} entries but only {} channel(s) are configured",
                config.source.inputs.len(),
                capture.channels
            );
        }

        match config.logging.format.as_str() {
            "text" | "compact" => {}
            unknown => bail!("Unknown log format: '{}'. Supported: text, compact", unknown),
        }

        Ok(())
    }
}
