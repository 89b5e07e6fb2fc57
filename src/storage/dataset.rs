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

// Append-only SigMF dataset writer

use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{RecorderError, Result};
use crate::sigmf::{
    format_datetime, AcquisitionParams, Annotation, CaptureSegment, MetadataDocument,
    DATA_EXTENSION, META_EXTENSION,
};

/// `{stem}.{extension}` without treating dots inside the stem as an extension
pub fn stem_with_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Writer for one dataset: a growing `.sigmf-data` file plus its `.sigmf-meta` document
///
/// The data file is created on the first non-empty append with create-new
/// semantics, so an existing recording is never truncated. The metadata
/// document is only written by [`DatasetWriter::finalize`].
pub struct DatasetWriter {
    stem: PathBuf,
    data_path: PathBuf,
    meta_path: PathBuf,
    item_size: usize,
    file: Option<File>,
    bytes_written: u64,
    samples_written: u64,
    opened_at: DateTime<Utc>,
}

impl DatasetWriter {
    /// Target a new dataset at `stem` with zeroed counters
    pub fn open(stem: impl Into<PathBuf>, item_size: usize) -> Self {
        let stem = stem.into();
        let data_path = stem_with_extension(&stem, DATA_EXTENSION);
        let meta_path = stem_with_extension(&stem, META_EXTENSION);

        debug!("Dataset target set to {}", data_path.display());

        Self {
            stem,
            data_path,
            meta_path,
            item_size,
            file: None,
            bytes_written: 0,
            samples_written: 0,
            opened_at: Utc::now(),
        }
    }

    /// Number of whole samples in a chunk of `len` bytes
    pub fn samples_in(&self, len: usize) -> Result<u64> {
        if len % self.item_size != 0 {
            return Err(RecorderError::MisalignedChunk {
                len,
                item_size: self.item_size,
            });
        }
        Ok((len / self.item_size) as u64)
    }

    /// Append raw little-endian samples, returning the number of samples written
    pub fn append(&mut self, samples: &[u8]) -> Result<u64> {
        if samples.is_empty() {
            return Ok(0);
        }
        let count = self.samples_in(samples.len())?;

        if self.file.is_none() {
            self.file = Some(Self::create_data_file(&self.data_path)?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(samples)
                .map_err(|e| RecorderError::io(&self.data_path, e))?;
        }

        self.bytes_written += samples.len() as u64;
        self.samples_written += count;
        Ok(count)
    }

    fn create_data_file(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RecorderError::io(parent, e))?;
        }

        info!("Creating data file {}", path.display());
        OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(path)
            .map_err(|e| RecorderError::io(path, e))
    }

    /// Write the metadata document for everything appended so far.
    ///
    /// Returns `false` without touching the disk when nothing was appended.
    /// Calling it again rewrites the document with the latest annotations.
    pub fn finalize(
        &mut self,
        params: &AcquisitionParams,
        annotations: &[Annotation],
        comment: &str,
    ) -> Result<bool> {
        if self.samples_written == 0 {
            debug!(
                "Skipping metadata for empty dataset {}",
                self.data_path.display()
            );
            return Ok(false);
        }

        if let Some(file) = self.file.as_mut() {
            file.flush()
                .map_err(|e| RecorderError::io(&self.data_path, e))?;
        }

        let document = MetadataDocument {
            global: params.global_info(self.dataset_name(), Some(comment.to_string())),
            captures: vec![CaptureSegment {
                sample_start: 0,
                frequency: params.frequency,
                datetime: format_datetime(self.opened_at),
            }],
            annotations: annotations.to_vec(),
        };
        let json = document
            .to_json_pretty()
            .map_err(|e| RecorderError::Metadata {
                path: self.meta_path.clone(),
                source: e,
            })?;
        fs::write(&self.meta_path, json).map_err(|e| RecorderError::io(&self.meta_path, e))?;

        info!(
            "Finalized {} ({} samples, {} annotations)",
            self.meta_path.display(),
            self.samples_written,
            annotations.len()
        );
        Ok(true)
    }

    fn dataset_name(&self) -> String {
        self.data_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> &Path {
        &self.stem
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}
