// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for sigmf-recorder

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::annotation::DEFAULT_SYMBOL_LENGTH;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecorderConfig {
    pub capture: CaptureConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dataset naming and acquisition parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Filename stem; datasets are `{stem}_device_{id}_input{n}`
    pub filename: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    /// Stream element width in bytes: 8, 4 or 2
    #[serde(default = "default_item_size")]
    pub item_size: usize,

    /// Only consulted for 2-byte items (ci16 vs ri16)
    #[serde(default = "default_true")]
    pub complex: bool,

    pub sample_rate: f64,

    /// Carrier frequency in Hz
    pub frequency: f64,

    #[serde(default)]
    pub hw: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_channels")]
    pub channels: usize,

    #[serde(default = "default_symbol_length")]
    pub symbol_length_samples: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            filename: "capture".to_string(),
            output_dir: default_output_dir(),
            author: String::new(),
            description: String::new(),
            item_size: default_item_size(),
            complex: true,
            sample_rate: 1_000_000.0,
            frequency: 868_100_000.0,
            hw: String::new(),
            version: default_version(),
            channels: default_channels(),
            symbol_length_samples: default_symbol_length(),
        }
    }
}

/// Device handshake socket
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    /// Loopback mode: wait for device announcements over TCP
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl HandshakeConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Bound on queued stream/control events before producers wait
    #[serde(default = "default_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: default_queue_capacity(),
        }
    }
}

/// File replay inputs, one per channel in order
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    #[serde(default = "default_chunk_samples")]
    pub chunk_samples: usize,

    /// Emit a symbol boundary every N samples while replaying
    #[serde(default)]
    pub boundary_interval_samples: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            chunk_samples: default_chunk_samples(),
            boundary_interval_samples: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,  // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String,  // "text", "compact"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_output_dir() -> String { ".".to_string() }
fn default_item_size() -> usize { 8 }
fn default_version() -> String { "1.0.0".to_string() }
fn default_channels() -> usize { 1 }
fn default_symbol_length() -> u64 { DEFAULT_SYMBOL_LENGTH }
fn default_bind_address() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 12345 }
fn default_queue_capacity() -> usize { 1024 }
fn default_chunk_samples() -> usize { 4096 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
