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

// Multi-channel SigMF capture recorder
//
// This recorder:
// - Records one or more fixed-rate sample streams to SigMF datasets
// - Annotates each externally signalled symbol boundary
// - Rolls every channel over to a new dataset when a transmitter
//   announces its device id over the handshake socket
// - Finalizes metadata on rollover, close, or end of stream

pub mod annotation;
pub mod channel;
pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod recorder;
pub mod sigmf;
pub mod source;
pub mod storage;

// Re-export main types
pub use annotation::AnnotationTracker;
pub use channel::{ChannelSession, ChannelState};
pub use config::{load_config, load_config_with_env, RecorderConfig};
pub use control::HandshakeListener;
pub use error::{RecorderError, Result};
pub use protocol::{DeviceId, HandshakeFrame};
pub use recorder::{CaptureDriver, CaptureEvent, CaptureSessionManager, CaptureSettings, RecorderHandle};
pub use sigmf::{AcquisitionParams, Annotation, MetadataDocument, SampleEncoding};
pub use source::{FileReplaySource, SampleSource};
pub use storage::DatasetWriter;
