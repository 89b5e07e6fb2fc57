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

// Sample stream delivery into a running capture

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::recorder::RecorderHandle;

/// Producer of sample chunks for one channel
#[async_trait]
pub trait SampleSource: Send {
    /// Push chunks into the recorder until the source is exhausted or the capture ends
    async fn run(&mut self, recorder: RecorderHandle) -> Result<()>;

    fn channel(&self) -> usize;
}

/// Replays a raw sample file into one channel
pub struct FileReplaySource {
    path: PathBuf,
    channel: usize,
    item_size: usize,
    chunk_samples: usize,
    boundary_interval: Option<u64>,
    samples_sent: u64,
}

impl FileReplaySource {
    pub fn new(path: impl Into<PathBuf>, channel: usize, item_size: usize, chunk_samples: usize) -> Self {
        Self {
            path: path.into(),
            channel,
            item_size,
            chunk_samples,
            boundary_interval: None,
            samples_sent: 0,
        }
    }

    /// Signal a symbol boundary before the chunk that crosses every `interval` samples
    pub fn with_boundary_interval(mut self, interval: Option<u64>) -> Self {
        self.boundary_interval = interval.filter(|n| *n > 0);
        self
    }

    pub fn samples_sent(&self) -> u64 {
        self.samples_sent
    }

    /// Read up to one chunk; short only at end of file
    async fn read_chunk(&self, reader: &mut BufReader<File>) -> Result<Option<Bytes>> {
        let chunk_bytes = self.chunk_samples * self.item_size;
        let mut buf = BytesMut::zeroed(chunk_bytes);
        let mut filled = 0;

        while filled < chunk_bytes {
            let n = reader
                .read(&mut buf[filled..])
                .await
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let whole = filled - filled % self.item_size;
        if whole != filled {
            warn!(
                "Dropping {} trailing bytes from {}",
                filled - whole,
                self.path.display()
            );
        }
        if whole == 0 {
            return Ok(None);
        }

        buf.truncate(whole);
        Ok(Some(buf.freeze()))
    }

    fn starts_symbol(&self, chunk_samples: u64) -> bool {
        match self.boundary_interval {
            Some(interval) => {
                let start = self.samples_sent;
                let end = start + chunk_samples;
                // a boundary falls in [start, end)
                start % interval == 0 || start / interval != (end - 1) / interval
            }
            None => false,
        }
    }
}

#[async_trait]
impl SampleSource for FileReplaySource {
    async fn run(&mut self, recorder: RecorderHandle) -> Result<()> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);

        info!(
            "Replaying {} into channel {}",
            self.path.display(),
            self.channel
        );

        loop {
            let chunk = tokio::select! {
                biased;
                _ = recorder.wait_for_shutdown() => {
                    info!("Capture ended, stopping replay of {}", self.path.display());
                    return Ok(());
                }
                chunk = self.read_chunk(&mut reader) => chunk?,
            };
            let Some(chunk) = chunk else {
                info!(
                    "End of file: {} ({} samples)",
                    self.path.display(),
                    self.samples_sent
                );
                return Ok(());
            };

            let count = (chunk.len() / self.item_size) as u64;
            if self.starts_symbol(count) {
                recorder.signal_symbol_boundary(self.channel).await?;
            }
            recorder.push_samples(self.channel, chunk).await?;
            self.samples_sent += count;
            debug!("Channel {} replayed {} samples", self.channel, count);
        }
    }

    fn channel(&self) -> usize {
        self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_symbol_without_interval() {
        let source = FileReplaySource::new("x", 0, 8, 4);
        assert!(!source.starts_symbol(4));
    }

    #[test]
    fn test_starts_symbol_on_crossing() {
        let mut source = FileReplaySource::new("x", 0, 8, 4).with_boundary_interval(Some(10));
        assert!(source.starts_symbol(4)); // 0..4 starts at a boundary
        source.samples_sent = 4;
        assert!(!source.starts_symbol(4)); // 4..8
        source.samples_sent = 8;
        assert!(source.starts_symbol(4)); // 8..12 crosses 10
        source.samples_sent = 12;
        assert!(!source.starts_symbol(4)); // 12..16
    }

    #[test]
    fn test_zero_interval_disabled() {
        let source = FileReplaySource::new("x", 0, 8, 4).with_boundary_interval(Some(0));
        assert!(!source.starts_symbol(4));
    }
}
