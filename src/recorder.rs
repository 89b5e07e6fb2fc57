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

// Capture session management
//
// `CaptureSessionManager` owns every channel session and is only ever
// touched by the `CaptureDriver`, which applies `CaptureEvent`s one at a
// time. Producers (sample sources, the handshake listener) talk to it
// through a cloneable `RecorderHandle`, so a rollover can never interleave
// with an append.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channel::ChannelSession;
use crate::config::CaptureConfig;
use crate::error::{RecorderError, Result};
use crate::protocol::DeviceId;
use crate::sigmf::{AcquisitionParams, SampleEncoding};

/// Fixed settings of one capture run
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Output directory joined with the filename stem
    pub base_stem: PathBuf,
    pub params: AcquisitionParams,
    pub channels: usize,
    pub symbol_length: u64,
}

impl CaptureSettings {
    /// Resolve settings from configuration, failing on an unsupported encoding
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        let encoding = SampleEncoding::from_item(config.item_size, config.complex)?;

        Ok(Self {
            base_stem: Path::new(&config.output_dir).join(&config.filename),
            params: AcquisitionParams {
                encoding,
                sample_rate: config.sample_rate,
                frequency: config.frequency,
                description: config.description.clone(),
                author: config.author.clone(),
                hw: config.hw.clone(),
                version: config.version.clone(),
            },
            channels: config.channels,
            symbol_length: config.symbol_length_samples,
        })
    }
}

/// Owner of all channel sessions of a capture run
pub struct CaptureSessionManager {
    params: Arc<AcquisitionParams>,
    device_id: DeviceId,
    channels: Vec<ChannelSession>,
    closed: bool,
}

impl CaptureSessionManager {
    /// Create every channel session under the unassigned device identity
    pub fn new(settings: CaptureSettings) -> Result<Self> {
        let params = Arc::new(settings.params);
        let mut channels = Vec::with_capacity(settings.channels);
        for index in 0..settings.channels {
            let mut channel = ChannelSession::new(index, params.clone(), settings.symbol_length);
            channel.initialize(&settings.base_stem, DeviceId::UNASSIGNED)?;
            channels.push(channel);
        }

        info!(
            "Capture session ready: {} channel(s), {} at {} Hz",
            channels.len(),
            params.encoding.datatype(),
            params.sample_rate
        );

        Ok(Self {
            params,
            device_id: DeviceId::UNASSIGNED,
            channels,
            closed: false,
        })
    }

    fn channel_mut(&mut self, index: usize) -> Result<&mut ChannelSession> {
        let count = self.channels.len();
        self.channels
            .get_mut(index)
            .ok_or(RecorderError::ChannelIndex { index, count })
    }

    /// Route a chunk to its channel, returning the number of samples written
    pub fn dispatch(&mut self, channel_index: usize, samples: &[u8]) -> Result<u64> {
        self.channel_mut(channel_index)?.append(samples)
    }

    pub fn signal_symbol_boundary(&mut self, channel_index: usize) -> Result<()> {
        self.channel_mut(channel_index)?.signal_symbol_boundary();
        Ok(())
    }

    /// Roll every channel over to `new_device_id`.
    ///
    /// Returns `false` when the identity is unchanged, in which case nothing
    /// is touched.
    pub fn rotate_all(&mut self, new_device_id: DeviceId) -> Result<bool> {
        if self.closed {
            return Err(RecorderError::SessionStopped);
        }
        if new_device_id == self.device_id {
            debug!("Device {} already active, no rollover", new_device_id);
            return Ok(false);
        }

        info!(
            "Device id changed from {} to {}",
            self.device_id, new_device_id
        );

        // Finalize every channel before any of them moves to the new id
        let mut first_error = None;
        for channel in &mut self.channels {
            if let Err(e) = channel.begin_rotation() {
                error!("Failed to finalize channel {}: {}", channel.index(), e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            self.abandon();
            return Err(e);
        }

        for channel in &mut self.channels {
            channel.complete_rotation(new_device_id)?;
        }
        self.device_id = new_device_id;
        Ok(true)
    }

    /// Stop accepting samples after a failed rollover, leaving every
    /// channel on the old identity
    fn abandon(&mut self) {
        error!(
            "Rollover from device {} failed, capture session stopped",
            self.device_id
        );
        for channel in &mut self.channels {
            channel.abandon();
        }
        self.closed = true;
    }

    /// Finalize and close every channel. Later calls do nothing.
    pub fn close_all(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;
        for channel in &mut self.channels {
            if let Err(e) = channel.close() {
                error!("Failed to close channel {}: {}", channel.index(), e);
                first_error.get_or_insert(e);
            }
        }

        info!("Capture session closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Stream-teardown entry point; a no-op once `close_all` has run
    pub fn stop(&mut self) -> Result<()> {
        if self.closed {
            debug!("Capture session already closed");
            return Ok(());
        }
        info!("Stream delivery stopped, finalizing datasets");
        self.close_all()
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelSession> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[ChannelSession] {
        &self.channels
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn params(&self) -> &AcquisitionParams {
        &self.params
    }
}

/// Work item for the capture driver
#[derive(Debug)]
pub enum CaptureEvent {
    Samples {
        channel: usize,
        data: Bytes,
    },
    SymbolBoundary {
        channel: usize,
    },
    Rotate {
        device_id: DeviceId,
        reply: oneshot::Sender<Result<bool>>,
    },
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop,
}

/// Cloneable entry point into a running capture
#[derive(Clone)]
pub struct RecorderHandle {
    events: mpsc::Sender<CaptureEvent>,
    shutdown: watch::Receiver<bool>,
    channel_count: usize,
    item_size: usize,
}

impl RecorderHandle {
    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= self.channel_count {
            return Err(RecorderError::ChannelIndex {
                index: channel,
                count: self.channel_count,
            });
        }
        Ok(())
    }

    async fn send(&self, event: CaptureEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| RecorderError::SessionStopped)
    }

    /// Queue a chunk of raw little-endian samples for `channel`
    pub async fn push_samples(&self, channel: usize, data: Bytes) -> Result<()> {
        self.check_channel(channel)?;
        if data.is_empty() {
            return Ok(());
        }
        if data.len() % self.item_size != 0 {
            return Err(RecorderError::MisalignedChunk {
                len: data.len(),
                item_size: self.item_size,
            });
        }
        self.send(CaptureEvent::Samples { channel, data }).await
    }

    /// Mark that the next chunk on `channel` starts a new symbol
    pub async fn signal_symbol_boundary(&self, channel: usize) -> Result<()> {
        self.check_channel(channel)?;
        self.send(CaptureEvent::SymbolBoundary { channel }).await
    }

    /// Request a rollover and wait until every channel has rotated
    pub async fn rotate(&self, device_id: DeviceId) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.send(CaptureEvent::Rotate { device_id, reply }).await?;
        response.await.map_err(|_| RecorderError::SessionStopped)?
    }

    /// Close every channel and end the capture run
    pub async fn close(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(CaptureEvent::Close { reply }).await?;
        response.await.map_err(|_| RecorderError::SessionStopped)?
    }

    /// Signal end of stream delivery. Harmless if the run already ended.
    pub async fn stop(&self) {
        if self.send(CaptureEvent::Stop).await.is_err() {
            debug!("Capture driver already stopped");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once the capture run has ended
    pub async fn wait_for_shutdown(&self) {
        let mut shutdown = self.shutdown.clone();
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }
}

/// Single owner of the session manager, applying events in arrival order
pub struct CaptureDriver {
    manager: CaptureSessionManager,
    events: mpsc::Receiver<CaptureEvent>,
    shutdown: watch::Sender<bool>,
}

impl CaptureDriver {
    /// Start the driver on a blocking thread (dataset I/O is synchronous)
    pub fn spawn(
        manager: CaptureSessionManager,
        queue_capacity: usize,
    ) -> (RecorderHandle, JoinHandle<Result<()>>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = RecorderHandle {
            events: tx,
            shutdown: shutdown_rx,
            channel_count: manager.channel_count(),
            item_size: manager.params().encoding.item_size(),
        };
        let driver = CaptureDriver {
            manager,
            events: rx,
            shutdown: shutdown_tx,
        };

        let task = tokio::task::spawn_blocking(move || driver.run());
        (handle, task)
    }

    fn run(mut self) -> Result<()> {
        let result = self.process_events();

        let stopped = self.manager.stop();
        self.shutdown.send_replace(true);
        info!("Capture driver finished");

        result.and(stopped)
    }

    fn process_events(&mut self) -> Result<()> {
        while let Some(event) = self.events.blocking_recv() {
            match event {
                CaptureEvent::Samples { channel, data } => {
                    if let Err(e) = self.manager.dispatch(channel, &data) {
                        Self::on_stream_error(e)?;
                    }
                }
                CaptureEvent::SymbolBoundary { channel } => {
                    if let Err(e) = self.manager.signal_symbol_boundary(channel) {
                        Self::on_stream_error(e)?;
                    }
                }
                CaptureEvent::Rotate { device_id, reply } => {
                    match self.manager.rotate_all(device_id) {
                        Ok(rotated) => {
                            let _ = reply.send(Ok(rotated));
                        }
                        Err(e) => {
                            error!("Rollover to device {} failed: {}", device_id, e);
                            let _ = reply.send(Err(RecorderError::RolloverFailed { device_id }));
                            return Err(e);
                        }
                    }
                }
                CaptureEvent::Close { reply } => {
                    let _ = reply.send(self.manager.close_all());
                    return Ok(());
                }
                CaptureEvent::Stop => {
                    info!("Stop requested");
                    return Ok(());
                }
            }
        }

        debug!("All recorder handles dropped");
        Ok(())
    }

    /// Rejected chunks are the producer's problem; I/O failures end the run
    fn on_stream_error(e: RecorderError) -> Result<()> {
        match e {
            RecorderError::ChannelIndex { .. }
            | RecorderError::ChannelClosed { .. }
            | RecorderError::MisalignedChunk { .. } => {
                warn!("Dropping stream event: {}", e);
                Ok(())
            }
            other => {
                error!("Fatal stream error: {}", other);
                Err(other)
            }
        }
    }
}
