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

/// Capture session manager state machine and rollover tests
///
use std::path::Path;
use tempfile::TempDir;

use sigmf_recorder::config::CaptureConfig;
use sigmf_recorder::protocol::DeviceId;
use sigmf_recorder::recorder::{CaptureDriver, CaptureSessionManager, CaptureSettings};
use sigmf_recorder::sigmf::{cf32_bytes, MetadataDocument};
use sigmf_recorder::{ChannelState, RecorderError};

fn capture_config(dir: &Path, channels: usize) -> CaptureConfig {
    CaptureConfig {
        filename: "run".to_string(),
        output_dir: dir.to_string_lossy().to_string(),
        item_size: 8,
        channels,
        ..CaptureConfig::default()
    }
}

fn create_manager(dir: &Path, channels: usize) -> CaptureSessionManager {
    let settings = CaptureSettings::from_config(&capture_config(dir, channels)).unwrap();
    CaptureSessionManager::new(settings).unwrap()
}

fn samples(n: usize) -> Vec<u8> {
    cf32_bytes(&vec![(0.5, -0.5); n]).to_vec()
}

fn read_meta(path: &Path) -> MetadataDocument {
    MetadataDocument::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_unsupported_encoding_aborts_construction() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = capture_config(temp_dir.path(), 1);
    config.item_size = 16;

    let err = CaptureSettings::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        RecorderError::UnsupportedEncoding { item_size: 16, .. }
    ));
}

#[test]
fn test_channels_start_unassigned() {
    let temp_dir = TempDir::new().unwrap();
    let manager = create_manager(temp_dir.path(), 3);

    assert_eq!(manager.channel_count(), 3);
    assert_eq!(manager.device_id(), DeviceId::UNASSIGNED);
    for (i, channel) in manager.channels().iter().enumerate() {
        assert_eq!(channel.index(), i);
        assert_eq!(channel.state(), ChannelState::Active);
        assert_eq!(channel.device_id(), DeviceId::UNASSIGNED);
    }
    // Nothing is created until samples arrive
    assert!(dir_entries(temp_dir.path()).is_empty());
}

#[test]
fn test_dispatch_out_of_range() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 2);

    let err = manager.dispatch(2, &samples(1)).unwrap_err();
    assert!(matches!(err, RecorderError::ChannelIndex { index: 2, count: 2 }));
    assert!(matches!(
        manager.signal_symbol_boundary(5).unwrap_err(),
        RecorderError::ChannelIndex { index: 5, count: 2 }
    ));

    // Session still usable
    assert_eq!(manager.dispatch(1, &samples(1)).unwrap(), 1);
}

#[test]
fn test_single_channel_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 1);

    assert!(manager.rotate_all(DeviceId(7)).unwrap());
    let data_path = temp_dir.path().join("run_device_7_input0.sigmf-data");
    assert_eq!(manager.channel(0).unwrap().data_path().unwrap(), data_path);

    manager.signal_symbol_boundary(0).unwrap();
    manager.dispatch(0, &samples(4)).unwrap();
    assert_eq!(std::fs::metadata(&data_path).unwrap().len(), 32);
    assert_eq!(manager.channel(0).unwrap().annotations().len(), 1);

    manager.dispatch(0, &samples(4)).unwrap();
    assert_eq!(std::fs::metadata(&data_path).unwrap().len(), 64);
    assert_eq!(manager.channel(0).unwrap().annotations().len(), 1);

    manager.close_all().unwrap();
    let doc = read_meta(&temp_dir.path().join("run_device_7_input0.sigmf-meta"));
    assert_eq!(
        doc.global.comment.as_deref(),
        Some("Total number of symbols: 1")
    );
    assert_eq!(doc.annotations.len(), 1);
    assert_eq!(doc.annotations[0].sample_start, 0);
    assert_eq!(doc.global.datatype.datatype(), "cf32_le");

    // The pre-handshake dataset never received samples
    assert_eq!(
        dir_entries(temp_dir.path()),
        vec![
            "run_device_7_input0.sigmf-data".to_string(),
            "run_device_7_input0.sigmf-meta".to_string(),
        ]
    );
}

#[test]
fn test_same_device_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 1);

    assert!(manager.rotate_all(DeviceId(7)).unwrap());
    manager.dispatch(0, &samples(4)).unwrap();

    assert!(!manager.rotate_all(DeviceId(7)).unwrap());

    let channel = manager.channel(0).unwrap();
    assert_eq!(channel.samples_written(), 4);
    assert_eq!(channel.symbol_count(), 1);
    assert!(!temp_dir.path().join("run_device_7_input0.sigmf-meta").exists());
    assert_eq!(
        dir_entries(temp_dir.path()),
        vec!["run_device_7_input0.sigmf-data".to_string()]
    );
}

#[test]
fn test_two_channel_partial_rollover() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 2);

    manager.dispatch(0, &samples(8)).unwrap();
    assert!(manager.rotate_all(DeviceId(3)).unwrap());

    // Channel 0 finalized under the old identity
    let doc = read_meta(&temp_dir.path().join("run_device_0_input0.sigmf-meta"));
    assert_eq!(
        doc.global.comment.as_deref(),
        Some("Total number of symbols: 1")
    );
    // Channel 1 had nothing to finalize
    assert!(!temp_dir.path().join("run_device_0_input1.sigmf-meta").exists());
    assert!(!temp_dir.path().join("run_device_0_input1.sigmf-data").exists());

    for channel in manager.channels() {
        assert_eq!(channel.device_id(), DeviceId(3));
        assert_eq!(channel.samples_written(), 0);
    }
    assert_eq!(
        manager.channel(0).unwrap().data_path().unwrap(),
        temp_dir.path().join("run_device_3_input0.sigmf-data")
    );
    assert_eq!(
        manager.channel(1).unwrap().data_path().unwrap(),
        temp_dir.path().join("run_device_3_input1.sigmf-data")
    );
}

#[test]
fn test_boundary_signals_are_per_channel() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 2);

    manager.dispatch(0, &samples(2)).unwrap();
    manager.dispatch(1, &samples(2)).unwrap();

    manager.signal_symbol_boundary(1).unwrap();
    manager.dispatch(0, &samples(2)).unwrap();
    manager.dispatch(1, &samples(2)).unwrap();

    assert_eq!(manager.channel(0).unwrap().symbol_count(), 1);
    assert_eq!(manager.channel(1).unwrap().symbol_count(), 2);
    assert_eq!(manager.channel(1).unwrap().annotations()[1].sample_start, 2);
}

#[test]
fn test_rotate_back_to_previous_device_keeps_old_data() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 1);

    manager.rotate_all(DeviceId(7)).unwrap();
    manager.dispatch(0, &samples(2)).unwrap();
    manager.rotate_all(DeviceId(8)).unwrap();
    manager.rotate_all(DeviceId(7)).unwrap();
    manager.dispatch(0, &samples(3)).unwrap();
    manager.close_all().unwrap();

    let original = temp_dir.path().join("run_device_7_input0.sigmf-data");
    assert_eq!(std::fs::metadata(&original).unwrap().len(), 16);

    let second = manager.channel(0).unwrap().data_path().unwrap().to_path_buf();
    assert_ne!(second, original);
    assert_eq!(std::fs::metadata(&second).unwrap().len(), 24);
    assert!(manager.channel(0).unwrap().meta_path().unwrap().exists());
}

#[test]
fn test_close_then_stop_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 1);

    manager.rotate_all(DeviceId(1)).unwrap();
    manager.dispatch(0, &samples(1)).unwrap();
    manager.close_all().unwrap();
    assert!(manager.is_closed());

    let meta = temp_dir.path().join("run_device_1_input0.sigmf-meta");
    let before = std::fs::read(&meta).unwrap();

    manager.stop().unwrap();
    manager.close_all().unwrap();
    assert_eq!(std::fs::read(&meta).unwrap(), before);

    assert!(matches!(
        manager.rotate_all(DeviceId(2)).unwrap_err(),
        RecorderError::SessionStopped
    ));
    assert!(matches!(
        manager.dispatch(0, &samples(1)).unwrap_err(),
        RecorderError::ChannelClosed { index: 0 }
    ));
}

#[test]
fn test_stop_finalizes_nonempty_channels() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 2);

    manager.dispatch(1, &samples(5)).unwrap();
    manager.stop().unwrap();

    assert!(manager.is_closed());
    assert!(temp_dir.path().join("run_device_0_input1.sigmf-meta").exists());
    assert!(!temp_dir.path().join("run_device_0_input0.sigmf-meta").exists());
}

#[test]
fn test_failed_rollover_keeps_old_identity_and_stops() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_manager(temp_dir.path(), 3);
    for index in 0..3 {
        manager.dispatch(index, &samples(1)).unwrap();
    }
    // Channel 1 cannot write its metadata document
    std::fs::create_dir(temp_dir.path().join("run_device_0_input1.sigmf-meta")).unwrap();

    let err = manager.rotate_all(DeviceId(3)).unwrap_err();
    assert!(matches!(err, RecorderError::Io { .. }));

    assert!(manager.is_closed());
    assert_eq!(manager.device_id(), DeviceId::UNASSIGNED);
    for channel in manager.channels() {
        assert_eq!(channel.device_id(), DeviceId::UNASSIGNED);
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    // No further writes land anywhere
    for index in 0..3 {
        assert!(matches!(
            manager.dispatch(index, &samples(1)).unwrap_err(),
            RecorderError::ChannelClosed { .. }
        ));
    }
    assert!(matches!(
        manager.rotate_all(DeviceId(3)).unwrap_err(),
        RecorderError::SessionStopped
    ));
    manager.stop().unwrap();

    // The healthy channels were finalized under the old id
    assert!(temp_dir.path().join("run_device_0_input0.sigmf-meta").is_file());
    assert!(temp_dir.path().join("run_device_0_input2.sigmf-meta").is_file());
    assert!(dir_entries(temp_dir.path())
        .iter()
        .all(|name| !name.contains("device_3")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_rollover_ends_capture_run() {
    let temp_dir = TempDir::new().unwrap();
    let (recorder, driver) = CaptureDriver::spawn(create_manager(temp_dir.path(), 2), 16);

    recorder.push_samples(0, samples(2).into()).await.unwrap();
    recorder.push_samples(1, samples(2).into()).await.unwrap();
    std::fs::create_dir(temp_dir.path().join("run_device_0_input0.sigmf-meta")).unwrap();

    assert!(matches!(
        recorder.rotate(DeviceId(5)).await.unwrap_err(),
        RecorderError::RolloverFailed { device_id: DeviceId(5) }
    ));

    let err = driver.await.unwrap().unwrap_err();
    assert!(matches!(err, RecorderError::Io { .. }));
    assert!(recorder.is_shutdown());
    assert!(matches!(
        recorder.push_samples(1, samples(1).into()).await.unwrap_err(),
        RecorderError::SessionStopped
    ));
    assert!(temp_dir.path().join("run_device_0_input1.sigmf-meta").is_file());
}
