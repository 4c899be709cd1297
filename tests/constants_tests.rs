// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use mjpeg_shm_camera::backends::camera::types::FrameGeometry;
use mjpeg_shm_camera::constants::{
    DEFAULT_ARGB_REGION, DEFAULT_I420_REGION, IMAGE_READING_ID, MAX_HEADER_LINE, MAX_JPEG_FRAME,
    OutputEncoding, RECORDER_COMMAND_ID,
};
use mjpeg_shm_camera::media::formats::{ImageReading, RecorderCommand};

#[test]
fn test_publication_order() {
    // I420 is always published before ARGB
    assert_eq!(OutputEncoding::ALL, [OutputEncoding::I420, OutputEncoding::Argb]);
}

#[test]
fn test_frame_sizes() {
    let geometry = FrameGeometry::new(1280, 720);
    assert_eq!(OutputEncoding::I420.frame_size(geometry), 1_382_400);
    assert_eq!(OutputEncoding::Argb.frame_size(geometry), 3_686_400);
}

#[test]
fn test_default_region_names() {
    assert_eq!(OutputEncoding::I420.default_region_name(), DEFAULT_I420_REGION);
    assert_eq!(OutputEncoding::Argb.default_region_name(), DEFAULT_ARGB_REGION);
    assert_ne!(DEFAULT_I420_REGION, DEFAULT_ARGB_REGION);
}

#[test]
fn test_display_names() {
    for encoding in OutputEncoding::ALL {
        assert!(!encoding.display_name().is_empty());
    }
}

#[test]
fn test_message_ids() {
    assert_eq!(ImageReading::DATA_TYPE, IMAGE_READING_ID);
    assert_eq!(RecorderCommand::DATA_TYPE, RECORDER_COMMAND_ID);
    assert_eq!(IMAGE_READING_ID, 1055);
    assert_eq!(RECORDER_COMMAND_ID, 11);
}

#[test]
fn test_buffer_capacities() {
    assert_eq!(MAX_HEADER_LINE, 1000);
    assert_eq!(MAX_JPEG_FRAME, 8 * 1024 * 1024);
}
