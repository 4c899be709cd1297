// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the recorder and recording files

use bytes::Bytes;
use mjpeg_shm_camera::backends::camera::types::{FrameGeometry, TimeStamp};
use mjpeg_shm_camera::config::{RecordingConfig, RecordingMode};
use mjpeg_shm_camera::media::formats::envelope::ENVELOPE_MAGIC;
use mjpeg_shm_camera::media::formats::{Envelope, ImageReading};
use mjpeg_shm_camera::pipelines::{ControlCommand, Recorder};
use mjpeg_shm_camera::storage::{EnvelopeScanner, RecordingContents, read_recording};
use std::path::Path;
use std::sync::Arc;

const GEOMETRY: FrameGeometry = FrameGeometry::new(640, 480);

fn config(dir: &Path, mode: RecordingMode, rec: Option<&str>) -> RecordingConfig {
    RecordingConfig {
        mode,
        rec: rec.map(str::to_string),
        suffix: String::new(),
        directory: dir.to_path_buf(),
    }
}

fn jpeg(seed: u8) -> Bytes {
    Bytes::from(vec![0xFF, 0xD8, seed, seed, 0xFF, 0xD9])
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_record_without_session_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(config(dir.path(), RecordingMode::Remote { cid: 7 }, None), 1);
    recorder.begin().unwrap();

    for i in 0..50 {
        let written = recorder.record(&jpeg(i), GEOMETRY, TimeStamp::new(i as i32, 0));
        assert!(!written.unwrap());
    }

    assert!(!recorder.is_active());
    assert_eq!(recorder.recorded(), 0);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn test_envelope_layout_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(
        config(dir.path(), RecordingMode::Continuous, Some("layout.rec")),
        9,
    );
    let path = recorder.begin().unwrap().unwrap();
    assert_eq!(path, dir.path().join("layout.rec"));

    let sample = TimeStamp::new(1_700_000_000, 123_456);
    assert!(recorder.record(&jpeg(1), GEOMETRY, sample).unwrap());
    assert!(recorder.record(&jpeg(2), GEOMETRY, sample).unwrap());
    recorder.shutdown();

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(raw[..2], ENVELOPE_MAGIC);

    let contents = RecordingContents::parse(&raw);
    assert_eq!(contents.skipped_bytes, 0);
    assert_eq!(contents.envelopes.len(), 2);
    assert_eq!(contents.envelopes[0].offset, 0);

    let envelope = &contents.envelopes[1].envelope;
    assert_eq!(envelope.data_type, 1055);
    assert_eq!(envelope.sender_stamp, 9);
    assert_eq!(envelope.sample_time_stamp, sample);
    assert!(envelope.sent.seconds > 0);
    assert_eq!(envelope.received, TimeStamp::default());

    let reading = ImageReading::decode(&envelope.serialized_data).unwrap();
    assert_eq!(reading.fourcc, "jfif");
    assert_eq!(reading.width, 640);
    assert_eq!(reading.height, 480);
    assert_eq!(reading.data, jpeg(2));
}

#[test]
fn test_remote_start_stop_and_rotate() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), RecordingMode::Remote { cid: 111 }, None);
    cfg.suffix = "-front".into();
    let recorder = Recorder::new(cfg, 0);

    recorder.handle_command(ControlCommand::Start);
    assert!(recorder.is_active());
    let first = recorder.current_path().unwrap();
    let name = first.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with("-front.rec"), "{name}");
    assert!(recorder.record(&jpeg(1), GEOMETRY, TimeStamp::now()).unwrap());

    // A second start closes the current file and opens a fresh one
    recorder.handle_command(ControlCommand::Start);
    assert!(recorder.is_active());
    assert!(recorder.record(&jpeg(2), GEOMETRY, TimeStamp::now()).unwrap());
    let second = recorder.current_path().unwrap();

    recorder.handle_command(ControlCommand::Stop);
    assert!(!recorder.is_active());
    assert!(recorder.current_path().is_none());
    assert!(!recorder.record(&jpeg(3), GEOMETRY, TimeStamp::now()).unwrap());

    let contents = read_recording(&second).unwrap();
    let last = &contents.envelopes.last().unwrap().envelope;
    let reading = ImageReading::decode(&last.serialized_data).unwrap();
    assert_eq!(reading.data, jpeg(2));
    assert_eq!(recorder.recorded(), 2);

    // Stop without a session is harmless
    recorder.handle_command(ControlCommand::Stop);
    assert!(!recorder.is_active());
}

#[test]
fn test_continuous_mode_ignores_commands() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(
        config(dir.path(), RecordingMode::Continuous, Some("always.rec")),
        0,
    );
    recorder.begin().unwrap();

    recorder.handle_command(ControlCommand::Stop);
    assert!(recorder.is_active());
    assert!(recorder.record(&jpeg(1), GEOMETRY, TimeStamp::now()).unwrap());
    assert_eq!(files_in(dir.path()), vec!["always.rec".to_string()]);
}

#[test]
fn test_empty_frames_are_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(
        config(dir.path(), RecordingMode::Continuous, Some("empty.rec")),
        0,
    );
    let path = recorder.begin().unwrap().unwrap();

    assert!(!recorder.record(&Bytes::new(), GEOMETRY, TimeStamp::now()).unwrap());
    recorder.shutdown();
    assert_eq!(std::fs::metadata(path).unwrap().len(), 0);
}

#[test]
fn test_toggling_while_recording_keeps_files_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::new(
        config(dir.path(), RecordingMode::Remote { cid: 3 }, Some("toggle.rec")),
        0,
    ));
    recorder.handle_command(ControlCommand::Start);

    let control = {
        let recorder = Arc::clone(&recorder);
        std::thread::spawn(move || {
            for i in 0..100 {
                let command = if i % 2 == 0 {
                    ControlCommand::Stop
                } else {
                    ControlCommand::Start
                };
                recorder.handle_command(command);
            }
        })
    };

    for i in 0..500u32 {
        recorder
            .record(&jpeg(i as u8), GEOMETRY, TimeStamp::new(i as i32, 0))
            .unwrap();
    }
    control.join().unwrap();
    recorder.shutdown();

    // Whatever the interleaving, the last file holds only whole envelopes
    let contents = read_recording(&dir.path().join("toggle.rec")).unwrap();
    assert_eq!(contents.skipped_bytes, 0);
    let stamps: Vec<i32> = contents
        .envelopes
        .iter()
        .map(|e| e.envelope.sample_time_stamp.seconds)
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_scanner_resynchronises_after_damage() {
    let envelope = |stamp: u32| Envelope {
        data_type: ImageReading::DATA_TYPE,
        serialized_data: ImageReading::jfif(GEOMETRY, jpeg(stamp as u8)).encode(),
        sender_stamp: stamp,
        ..Envelope::default()
    };

    let garbage = b"garbage between records";
    let mut data = envelope(1).to_framed().unwrap().to_vec();
    data.extend_from_slice(garbage);
    data.extend_from_slice(&envelope(2).to_framed().unwrap());
    // The tail of a recording cut short by a crash
    let third = envelope(3).to_framed().unwrap();
    let cut = &third[..third.len() - 3];
    data.extend_from_slice(cut);
    data.push(0x0D);

    let mut scanner = EnvelopeScanner::new(&data);
    let stamps: Vec<u32> = scanner.by_ref().map(|s| s.envelope.sender_stamp).collect();
    assert_eq!(stamps, vec![1, 2]);
    assert_eq!(scanner.skipped(), garbage.len() + cut.len() + 1);

    let summary = RecordingContents::parse(&data).summary();
    assert_eq!(summary.envelopes, 2);
    assert_eq!(summary.total_bytes, data.len());
    assert_eq!(summary.image_readings, 2);
}
