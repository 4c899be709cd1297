// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for multipart frame extraction

use mjpeg_shm_camera::backends::camera::multipart::{ParserLimits, StreamParser, StreamState};
use mjpeg_shm_camera::backends::camera::types::ExtractedFrame;

/// One multipart part as a camera sends it
fn part(payload: &[u8]) -> Vec<u8> {
    let mut bytes = format!(
        "--myboundary\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    )
    .into_bytes();
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(b"\r\n");
    bytes
}

fn fake_jpeg(len: usize, seed: u8) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31) ^ seed).collect();
    if len >= 4 {
        data[..2].copy_from_slice(&[0xFF, 0xD8]);
        data[len - 2..].copy_from_slice(&[0xFF, 0xD9]);
    }
    data
}

fn feed_chunks(parser: &mut StreamParser, stream: &[u8], chunk_size: usize) -> Vec<ExtractedFrame> {
    stream
        .chunks(chunk_size)
        .flat_map(|chunk| parser.feed(chunk))
        .collect()
}

fn payloads(frames: &[ExtractedFrame]) -> Vec<Vec<u8>> {
    frames.iter().map(|f| f.data.to_vec()).collect()
}

#[test]
fn test_single_frame_in_one_chunk() {
    let mut parser = StreamParser::new();
    let frames = parser.feed(b"--boundary\r\nContent-Length: 4\r\n\r\n\xFF\xD8\xFF\xD9");

    assert_eq!(frames.len(), 1);
    assert_eq!(&frames[0].data[..], &[0xFF, 0xD8, 0xFF, 0xD9]);
    assert_eq!(frames[0].declared_len, 4);
    assert!(!frames[0].is_truncated());
    assert_eq!(parser.state(), StreamState::AwaitingFrameHeader);
    assert_eq!(parser.expected_len(), 0);
}

#[test]
fn test_single_frame_in_single_byte_chunks() {
    let stream = b"--boundary\r\nContent-Length: 4\r\n\r\n\xFF\xD8\xFF\xD9";
    let mut parser = StreamParser::new();
    let frames = feed_chunks(&mut parser, stream, 1);

    assert_eq!(payloads(&frames), vec![vec![0xFF, 0xD8, 0xFF, 0xD9]]);
}

#[test]
fn test_frame_is_emitted_on_last_payload_byte() {
    let mut parser = StreamParser::new();
    assert!(parser.feed(b"--b\r\nContent-Length: 3\r\n\r\nab").is_empty());
    assert_eq!(parser.state(), StreamState::InFrame);

    let frames = parser.feed(b"c");
    assert_eq!(payloads(&frames), vec![b"abc".to_vec()]);
}

#[test]
fn test_two_frames_in_one_block() {
    let first = fake_jpeg(100, 1);
    let second = fake_jpeg(100, 2);
    let mut stream = part(&first);
    stream.extend(part(&second));

    let mut parser = StreamParser::new();
    let frames = parser.feed(&stream);

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].len(), 100);
    assert_eq!(frames[1].len(), 100);
    assert_eq!(payloads(&frames), vec![first, second]);
}

#[test]
fn test_every_two_way_split_yields_the_same_frames() {
    let first = fake_jpeg(37, 7);
    let second = fake_jpeg(12, 9);
    let mut stream = part(&first);
    stream.extend(part(&second));
    let expected = vec![first, second];

    for split in 0..=stream.len() {
        let mut parser = StreamParser::new();
        let mut frames = parser.feed(&stream[..split]);
        frames.extend(parser.feed(&stream[split..]));
        assert_eq!(payloads(&frames), expected, "split at {split}");
    }
}

#[test]
fn test_chunk_size_does_not_change_output() {
    let parts: Vec<Vec<u8>> = (0..5).map(|i| fake_jpeg(50 + i * 13, i as u8)).collect();
    let stream: Vec<u8> = parts.iter().flat_map(|p| part(p)).collect();

    for chunk_size in [1, 2, 3, 7, 16, 64, 333, stream.len()] {
        let mut parser = StreamParser::new();
        let frames = feed_chunks(&mut parser, &stream, chunk_size);
        assert_eq!(payloads(&frames), parts, "chunk size {chunk_size}");
    }
}

#[test]
fn test_payload_containing_header_like_bytes() {
    let payload = b"--fake\r\nContent-Length: 999\r\n\r\n".to_vec();
    let mut stream = part(&payload);
    stream.extend(part(b"next"));

    let mut parser = StreamParser::new();
    let frames = feed_chunks(&mut parser, &stream, 5);
    assert_eq!(payloads(&frames), vec![payload, b"next".to_vec()]);
}

#[test]
fn test_server_preamble_before_first_boundary() {
    let mut stream = b"HTTP/1.0 200 OK\r\nContent-Type: multipart/x-mixed-replace\r\n\r\n".to_vec();
    stream.extend(part(b"jpeg"));

    let mut parser = StreamParser::new();
    let frames = parser.feed(&stream);
    assert_eq!(payloads(&frames), vec![b"jpeg".to_vec()]);
}

#[test]
fn test_oversized_frame_resumes_with_next_part() {
    let limits = ParserLimits {
        max_header_line: 128,
        max_frame_size: 16,
    };
    let big = fake_jpeg(40, 3);
    let small = fake_jpeg(10, 4);
    let mut stream = part(&big);
    stream.extend(part(&small));

    for chunk_size in [1, 3, stream.len()] {
        let mut parser = StreamParser::with_limits(limits);
        let frames = feed_chunks(&mut parser, &stream, chunk_size);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 16);
        assert_eq!(&frames[0].data[..], &big[..16]);
        assert_eq!(frames[0].declared_len, 40);
        assert!(frames[0].is_truncated());
        assert_eq!(&frames[1].data[..], &small[..]);
        assert!(!frames[1].is_truncated());
        assert_eq!(parser.state(), StreamState::AwaitingFrameHeader);
    }
}

#[test]
fn test_zero_length_part_is_emitted_empty() {
    let mut stream = part(b"");
    stream.extend(part(b"ok"));

    let mut parser = StreamParser::new();
    let frames = parser.feed(&stream);
    assert_eq!(frames.len(), 2);
    assert!(frames[0].is_empty());
    assert_eq!(&frames[1].data[..], b"ok");
}
