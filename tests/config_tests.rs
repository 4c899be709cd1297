// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use mjpeg_shm_camera::Config;
use mjpeg_shm_camera::backends::camera::types::FrameGeometry;
use mjpeg_shm_camera::config::{RecordingConfig, RecordingMode};
use mjpeg_shm_camera::constants::OutputEncoding;
use mjpeg_shm_camera::errors::ConfigError;
use std::time::Duration;

fn config() -> Config {
    Config::new("http://camera.local/mjpg/video.mjpg", FrameGeometry::new(640, 480))
}

#[test]
fn test_config_defaults() {
    let config = config();

    assert_eq!(config.i420_name, "video0.i420");
    assert_eq!(config.argb_name, "video0.argb");
    assert_eq!(config.sender_stamp, 0);
    assert!(config.outputs.i420 && config.outputs.argb);
    assert_eq!(config.recording.mode, RecordingMode::Continuous);
    assert_eq!(config.transport.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.transport.low_speed_limit, 60);
    assert_eq!(config.transport.low_speed_time, Duration::from_secs(30));
    assert!(config.validate().is_ok());
}

#[test]
fn test_region_sizes() {
    let config = config();
    assert_eq!(config.region_size(OutputEncoding::I420), 640 * 480 * 3 / 2);
    assert_eq!(config.region_size(OutputEncoding::Argb), 640 * 480 * 4);
}

#[test]
fn test_validation_errors() {
    let mut empty_url = config();
    empty_url.transport.url = "  ".into();
    assert_eq!(empty_url.validate(), Err(ConfigError::EmptyUrl));

    let mut zero = config();
    zero.geometry = FrameGeometry::new(0, 480);
    assert_eq!(
        zero.validate(),
        Err(ConfigError::ZeroGeometry(FrameGeometry::new(0, 480)))
    );

    let mut odd = config();
    odd.geometry = FrameGeometry::new(641, 480);
    assert_eq!(
        odd.validate(),
        Err(ConfigError::OddGeometry(FrameGeometry::new(641, 480)))
    );

    let mut unnamed = config();
    unnamed.argb_name = "/".into();
    assert_eq!(unnamed.validate(), Err(ConfigError::EmptyRegionName("ARGB")));

    let mut duplicate = config();
    duplicate.argb_name = "/video0.i420".into();
    assert_eq!(
        duplicate.validate(),
        Err(ConfigError::DuplicateRegionName("video0.i420".into()))
    );
}

#[test]
fn test_both_outputs_may_be_skipped() {
    let mut config = config();
    config.outputs.i420 = false;
    config.outputs.argb = false;
    assert!(config.validate().is_ok());
}

#[test]
fn test_recording_flags() {
    let continuous = RecordingConfig::from_flags(false, Some(111), None, None).unwrap();
    assert_eq!(continuous.mode, RecordingMode::Continuous);

    let remote =
        RecordingConfig::from_flags(true, Some(111), Some("out.rec".into()), Some("-a".into()))
            .unwrap();
    assert_eq!(remote.mode, RecordingMode::Remote { cid: 111 });
    assert_eq!(remote.rec.as_deref(), Some("out.rec"));
    assert_eq!(remote.suffix, "-a");

    assert_eq!(
        RecordingConfig::from_flags(true, None, None, None),
        Err(ConfigError::MissingControlSession)
    );

    let blank = RecordingConfig::from_flags(false, None, Some(String::new()), None).unwrap();
    assert_eq!(blank.rec, None);
}

#[test]
fn test_config_serializes_to_json() {
    let json = serde_json::to_value(config()).unwrap();
    assert_eq!(json["geometry"]["width"], 640);
    assert_eq!(json["recording"]["mode"], "Continuous");
    let back: Config = serde_json::from_value(json).unwrap();
    assert_eq!(back, config());
}
