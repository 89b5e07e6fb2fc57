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

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::annotation::AnnotationTracker;
use crate::error::{RecorderError, Result};
use crate::protocol::DeviceId;
use crate::sigmf::{AcquisitionParams, Annotation, MetadataDocument, DATA_EXTENSION};
use crate::storage::{stem_with_extension, DatasetWriter};

/// Lifecycle of a channel session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    Active,
    Rotating,
    Closed,
}

/// Recording state for one input stream
///
/// Owns the dataset writer and annotation tracker for the channel's current
/// device identity. Every dataset it finalizes has at least one sample.
pub struct ChannelSession {
    index: usize,
    state: ChannelState,
    params: Arc<AcquisitionParams>,
    base_stem: PathBuf,
    device_id: DeviceId,
    tracker: AnnotationTracker,
    annotations: Vec<Annotation>,
    writer: Option<DatasetWriter>,
}

impl ChannelSession {
    pub fn new(index: usize, params: Arc<AcquisitionParams>, symbol_length: u64) -> Self {
        let tracker = AnnotationTracker::new(symbol_length, params.frequency);
        Self {
            index,
            state: ChannelState::Uninitialized,
            params,
            base_stem: PathBuf::new(),
            device_id: DeviceId::UNASSIGNED,
            tracker,
            annotations: Vec::new(),
            writer: None,
        }
    }

    /// Open a fresh dataset for `device_id` under `base_stem`
    pub fn initialize(&mut self, base_stem: &Path, device_id: DeviceId) -> Result<()> {
        self.ensure_open()?;

        let stem = Self::disambiguate(self.stem_for(base_stem, device_id));
        info!(
            "Channel {} recording device {} to {}",
            self.index,
            device_id,
            stem.display()
        );

        self.writer = Some(DatasetWriter::open(
            stem,
            self.params.encoding.item_size(),
        ));
        self.base_stem = base_stem.to_path_buf();
        self.device_id = device_id;
        self.tracker.reset();
        self.annotations.clear();
        self.state = ChannelState::Active;
        Ok(())
    }

    fn stem_for(&self, base_stem: &Path, device_id: DeviceId) -> PathBuf {
        let mut name = OsString::from(base_stem.as_os_str());
        name.push(format!("_device_{}_input{}", device_id, self.index));
        PathBuf::from(name)
    }

    /// Suffix the stem with the wall-clock second (and a counter if needed)
    /// until no data file exists at it
    fn disambiguate(stem: PathBuf) -> PathBuf {
        if !stem_with_extension(&stem, DATA_EXTENSION).exists() {
            return stem;
        }

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut candidate = PathBuf::from(format!("{}_{}", stem.display(), secs));
        let mut n = 1u32;
        while stem_with_extension(&candidate, DATA_EXTENSION).exists() {
            candidate = PathBuf::from(format!("{}_{}_{}", stem.display(), secs, n));
            n += 1;
        }

        debug!(
            "Dataset {} already exists, using {}",
            stem.display(),
            candidate.display()
        );
        candidate
    }

    pub fn signal_symbol_boundary(&mut self) {
        self.tracker.on_symbol_boundary_signal();
    }

    /// Append one chunk of raw samples. Empty chunks are ignored.
    pub fn append(&mut self, samples: &[u8]) -> Result<u64> {
        if samples.is_empty() {
            return Ok(0);
        }

        let index = self.index;
        let writer = match (self.state, self.writer.as_mut()) {
            (ChannelState::Active, Some(writer)) => writer,
            (ChannelState::Closed, _) => return Err(RecorderError::ChannelClosed { index }),
            _ => return Err(RecorderError::ChannelUninitialized { index }),
        };

        // Reject bad chunks before they can start a symbol
        writer.samples_in(samples.len())?;

        // The symbol only counts once its first chunk is on disk
        let checkpoint = self.tracker.clone();
        let annotation = self.tracker.maybe_emit(writer.samples_written());
        let count = match writer.append(samples) {
            Ok(count) => count,
            Err(e) => {
                self.tracker = checkpoint;
                return Err(e);
            }
        };
        if let Some(annotation) = annotation {
            self.annotations.push(annotation);
        }

        debug!("Channel {} appended {} samples", index, count);
        Ok(count)
    }

    /// Finalize the current dataset and start a new one for `new_device_id`
    pub fn rotate(&mut self, new_device_id: DeviceId) -> Result<()> {
        self.begin_rotation()?;
        self.complete_rotation(new_device_id)
    }

    /// First half of a rollover: finalize the current dataset and stop
    /// accepting samples until [`ChannelSession::complete_rotation`]
    pub fn begin_rotation(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.state == ChannelState::Uninitialized {
            return Err(RecorderError::ChannelUninitialized { index: self.index });
        }

        self.state = ChannelState::Rotating;
        self.finalize_current()?;
        Ok(())
    }

    /// Second half of a rollover: open the dataset for `new_device_id`
    pub fn complete_rotation(&mut self, new_device_id: DeviceId) -> Result<()> {
        if self.state != ChannelState::Rotating {
            return Err(RecorderError::ChannelUninitialized { index: self.index });
        }
        let base_stem = self.base_stem.clone();
        self.initialize(&base_stem, new_device_id)
    }

    /// Refuse further writes without touching the current dataset
    pub fn abandon(&mut self) {
        if self.state != ChannelState::Closed {
            warn!(
                "Channel {} abandoned while recording device {}",
                self.index, self.device_id
            );
            self.state = ChannelState::Closed;
        }
    }

    /// Finalize the current dataset and refuse further writes
    pub fn close(&mut self) -> Result<()> {
        if self.state == ChannelState::Closed {
            return Ok(());
        }

        let result = self.finalize_current();
        self.state = ChannelState::Closed;
        info!("Channel {} closed", self.index);
        result.map(|_| ())
    }

    fn finalize_current(&mut self) -> Result<bool> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(false);
        };

        let comment = MetadataDocument::symbol_comment(self.tracker.symbol_count());
        let written = writer.finalize(&self.params, &self.annotations, &comment)?;
        if !written {
            debug!(
                "Channel {} discarding empty dataset {}",
                self.index,
                writer.stem().display()
            );
        }
        Ok(written)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ChannelState::Closed {
            return Err(RecorderError::ChannelClosed { index: self.index });
        }
        Ok(())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn samples_written(&self) -> u64 {
        self.writer.as_ref().map_or(0, |w| w.samples_written())
    }

    pub fn bytes_written(&self) -> u64 {
        self.writer.as_ref().map_or(0, |w| w.bytes_written())
    }

    pub fn symbol_count(&self) -> u64 {
        self.tracker.symbol_count()
    }

    pub fn is_symbol_pending(&self) -> bool {
        self.tracker.is_pending()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn data_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(|w| w.data_path())
    }

    pub fn meta_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(|w| w.meta_path())
    }
}
