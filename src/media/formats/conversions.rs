// SPDX-License-Identifier: MPL-2.0

//! Colorspace conversion for published frames
//!
//! Integer BT.601 (limited range) conversions:
//! - packed RGB24 (R, G, B byte order) to planar I420
//! - planar I420 to packed 32-bit ARGB, stored little endian (B, G, R, A bytes)
//!
//! Both expect even frame dimensions; chroma is sampled per 2x2 block.

use crate::backends::camera::types::FrameGeometry;
use crate::constants::OutputEncoding;
use crate::errors::DecodeError;

/// Byte sizes of the Y, U and V planes
pub fn i420_plane_sizes(geometry: FrameGeometry) -> (usize, usize, usize) {
    let luma = geometry.pixel_count();
    let chroma = (geometry.width as usize / 2) * (geometry.height as usize / 2);
    (luma, chroma, chroma)
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<(), DecodeError> {
    if actual < expected {
        return Err(DecodeError::Codec(format!(
            "{what} buffer holds {actual} bytes, need {expected}"
        )));
    }
    Ok(())
}

#[inline]
fn rgb_to_y(r: i32, g: i32, b: i32) -> u8 {
    ((66 * r + 129 * g + 25 * b + 0x1080) >> 8) as u8
}

#[inline]
fn rgb_to_u(r: i32, g: i32, b: i32) -> u8 {
    ((112 * b - 74 * g - 38 * r + 0x8080) >> 8) as u8
}

#[inline]
fn rgb_to_v(r: i32, g: i32, b: i32) -> u8 {
    ((112 * r - 94 * g - 18 * b + 0x8080) >> 8) as u8
}

/// Convert packed RGB24 into planar I420
pub fn rgb24_to_i420(
    rgb: &[u8],
    geometry: FrameGeometry,
    i420: &mut [u8],
) -> Result<(), DecodeError> {
    let w = geometry.width as usize;
    let h = geometry.height as usize;
    let (luma_len, chroma_len, _) = i420_plane_sizes(geometry);
    check_len("RGB", rgb.len(), w * h * 3)?;
    check_len("I420", i420.len(), OutputEncoding::I420.frame_size(geometry))?;

    let (y_plane, chroma) = i420.split_at_mut(luma_len);
    let (u_plane, v_plane) = chroma.split_at_mut(chroma_len);

    for (y, row) in rgb.chunks_exact(w * 3).take(h).enumerate() {
        let out = &mut y_plane[y * w..(y + 1) * w];
        for (dst, px) in out.iter_mut().zip(row.chunks_exact(3)) {
            *dst = rgb_to_y(px[0] as i32, px[1] as i32, px[2] as i32);
        }
    }

    let half_w = w / 2;
    for cy in 0..h / 2 {
        let top = &rgb[(2 * cy) * w * 3..(2 * cy + 1) * w * 3];
        let bottom = &rgb[(2 * cy + 1) * w * 3..(2 * cy + 2) * w * 3];
        for cx in 0..half_w {
            let i = cx * 6;
            let avg = |c: usize| {
                let sum = top[i + c] as i32
                    + top[i + 3 + c] as i32
                    + bottom[i + c] as i32
                    + bottom[i + 3 + c] as i32;
                (sum + 2) >> 2
            };
            let (r, g, b) = (avg(0), avg(1), avg(2));
            u_plane[cy * half_w + cx] = rgb_to_u(r, g, b);
            v_plane[cy * half_w + cx] = rgb_to_v(r, g, b);
        }
    }

    Ok(())
}

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Convert planar I420 into packed ARGB (B, G, R, A in memory)
pub fn i420_to_argb(
    i420: &[u8],
    geometry: FrameGeometry,
    argb: &mut [u8],
) -> Result<(), DecodeError> {
    let w = geometry.width as usize;
    let h = geometry.height as usize;
    let (luma_len, chroma_len, _) = i420_plane_sizes(geometry);
    check_len("I420", i420.len(), OutputEncoding::I420.frame_size(geometry))?;
    check_len("ARGB", argb.len(), OutputEncoding::Argb.frame_size(geometry))?;

    let y_plane = &i420[..luma_len];
    let u_plane = &i420[luma_len..luma_len + chroma_len];
    let v_plane = &i420[luma_len + chroma_len..luma_len + 2 * chroma_len];
    let half_w = w / 2;

    for (y, row) in argb.chunks_exact_mut(w * 4).take(h).enumerate() {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let c = y_plane[y * w + x] as i32 - 16;
            let chroma_idx = (y / 2) * half_w + x / 2;
            let d = u_plane[chroma_idx] as i32 - 128;
            let e = v_plane[chroma_idx] as i32 - 128;

            px[0] = clamp_u8((298 * c + 516 * d + 128) >> 8);
            px[1] = clamp_u8((298 * c - 100 * d - 208 * e + 128) >> 8);
            px[2] = clamp_u8((298 * c + 409 * e + 128) >> 8);
            px[3] = 255;
        }
    }

    Ok(())
}
