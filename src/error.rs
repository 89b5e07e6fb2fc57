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

// Error types for the capture core

use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::DeviceId;

/// Errors raised by the capture-session core
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The configured item size/type has no SigMF on-disk encoding
    #[error("unsupported sample encoding: item size {item_size}, complex: {complex}")]
    UnsupportedEncoding { item_size: usize, complex: bool },

    #[error("channel index {index} out of range (channel count {count})")]
    ChannelIndex { index: usize, count: usize },

    /// A handshake frame that is neither `close` nor a decimal device id
    #[error("malformed handshake frame: {frame:?}")]
    HandshakeDecode { frame: String },

    #[error("chunk of {len} bytes is not a whole number of {item_size}-byte samples")]
    MisalignedChunk { len: usize, item_size: usize },

    #[error("channel {index} has not been initialized")]
    ChannelUninitialized { index: usize },

    #[error("channel {index} is closed")]
    ChannelClosed { index: usize },

    #[error("capture session is no longer running")]
    SessionStopped,

    /// A rollover could not finalize every dataset; the run was stopped
    #[error("rollover to device {device_id} failed")]
    RolloverFailed { device_id: DeviceId },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode metadata for {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RecorderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecorderError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
