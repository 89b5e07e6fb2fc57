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
use clap::Parser;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sigmf_recorder::config::{load_with_overrides, ConfigOverrides, LoggingConfig};
use sigmf_recorder::recorder::{CaptureDriver, CaptureSessionManager, CaptureSettings};
use sigmf_recorder::source::{FileReplaySource, SampleSource};
use sigmf_recorder::{HandshakeListener, RecorderConfig};

/// SigMF Recorder - Record sample streams to SigMF datasets keyed by device id
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides config file)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Filename stem (overrides config file)
    #[arg(short, long)]
    filename: Option<String>,

    /// Raw sample file to replay, one per channel in order (repeatable)
    #[arg(short, long)]
    input: Vec<PathBuf>,

    /// Record without waiting for device handshakes
    #[arg(long)]
    no_handshake: bool,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

fn load(args: &Args) -> Result<RecorderConfig> {
    let overrides = ConfigOverrides {
        output_dir: args.output_dir.clone(),
        filename: args.filename.clone(),
        inputs: args.input.clone(),
        disable_handshake: args.no_handshake,
    };
    load_with_overrides(args.config.as_deref(), &overrides)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load(&args)?;

    init_tracing(&config.logging)?;

    info!("Starting SigMF Recorder");
    if let Some(path) = &args.config {
        info!("Loaded configuration from: {:?}", path);
    }
    info!("Output directory: {}", config.capture.output_dir);

    let settings = CaptureSettings::from_config(&config.capture)?;
    let manager = CaptureSessionManager::new(settings)?;
    let (recorder, driver) = CaptureDriver::spawn(manager, config.runtime.event_queue_capacity);

    let listener = if config.handshake.enabled {
        let listener = HandshakeListener::bind(config.handshake.socket_addr()).await?;
        Some(tokio::spawn(listener.run(recorder.clone())))
    } else {
        info!("Handshake disabled, recording under device 0");
        None
    };

    let mut sources = JoinSet::new();
    for (channel, path) in config.source.inputs.iter().enumerate() {
        let mut source = FileReplaySource::new(
            path,
            channel,
            recorder.item_size(),
            config.source.chunk_samples,
        )
        .with_boundary_interval(config.source.boundary_interval_samples);
        let handle = recorder.clone();
        sources.spawn(async move { source.run(handle).await });
    }
    let replaying = !sources.is_empty();

    // Run until the streams end, a device sends close, or Ctrl+C
    tokio::select! {
        _ = async {
            while let Some(joined) = sources.join_next().await {
                match joined {
                    Ok(Err(e)) => error!("Sample source failed: {:#}", e),
                    Err(e) => error!("Sample source task failed: {}", e),
                    Ok(Ok(())) => {}
                }
            }
        }, if replaying => {
            info!("All sample sources finished");
            recorder.stop().await;
        }
        _ = recorder.wait_for_shutdown() => {
            info!("Capture closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            recorder.stop().await;
        }
    }

    // Cleanup
    drop(recorder);
    driver.await.context("Capture driver panicked")??;
    sources.shutdown().await;
    if let Some(listener) = listener {
        listener.await.context("Handshake listener panicked")??;
    }

    info!("SigMF Recorder shut down successfully");
    Ok(())
}
