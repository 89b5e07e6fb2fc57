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

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{error, info, warn};

use crate::protocol::{HandshakeFrame, ACK, MAX_FRAME_LEN};
use crate::recorder::RecorderHandle;

/// Device handshake listener
///
/// Accepts a single control connection and turns each frame into a
/// rollover or close request on the recorder. There is no reconnection:
/// the loop ends on `close`, a malformed frame, disconnect, or when the
/// capture run ends on its own.
pub struct HandshakeListener {
    listener: TcpListener,
}

impl HandshakeListener {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("Failed to bind handshake socket")?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the listener (blocks until the handshake session ends)
    pub async fn run(self, recorder: RecorderHandle) -> Result<()> {
        info!(
            "Waiting for device handshake on {}",
            self.listener.local_addr()?
        );

        let (stream, peer) = tokio::select! {
            accepted = self.listener.accept() => {
                accepted.context("Failed to accept handshake connection")?
            }
            _ = recorder.wait_for_shutdown() => {
                info!("Capture ended before any device connected");
                return Ok(());
            }
        };

        info!("Device connected from {}", peer);
        Self::serve(stream, &recorder).await
    }

    async fn serve(mut stream: TcpStream, recorder: &RecorderHandle) -> Result<()> {
        let mut buf = [0u8; MAX_FRAME_LEN];

        loop {
            let n = tokio::select! {
                read = stream.read(&mut buf) => read.context("Handshake read failed")?,
                _ = recorder.wait_for_shutdown() => {
                    info!("Capture ended, closing handshake connection");
                    return Ok(());
                }
            };

            if n == 0 {
                warn!("Device disconnected from handshake socket");
                return Ok(());
            }

            match HandshakeFrame::decode(&buf[..n]) {
                Ok(HandshakeFrame::Close) => {
                    info!("Received close command");
                    recorder.close().await?;
                    if let Err(e) = stream.shutdown().await {
                        warn!("Failed to shut down handshake connection: {}", e);
                    }
                    return Ok(());
                }
                Ok(HandshakeFrame::Announce(device_id)) => {
                    info!("Received device id: {}", device_id);
                    recorder.rotate(device_id).await?;
                    stream
                        .write_all(ACK)
                        .await
                        .context("Failed to acknowledge device id")?;
                }
                Err(e) => {
                    error!("{}, shutting capture down", e);
                    if let Err(close_err) = recorder.close().await {
                        warn!("Close after handshake failure failed: {}", close_err);
                    }
                    return Err(e.into());
                }
            }
        }
    }
}
