//! services/client/src/adapters/image_codec.rs
//!
//! This module contains the image codec adapter, which implements the
//! `ImageCodec` port with the `image` crate. Decoding and encoding are
//! CPU-bound and run on the blocking thread pool.

use async_trait::async_trait;
use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageReader};
use social_feed_core::domain::ImageDimensions;
use social_feed_core::image::clamp_quality;
use social_feed_core::ports::{ImageCodec, PortError, PortResult};
use std::io::Cursor;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Resizes with Lanczos3 and re-encodes as baseline JPEG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterCodec;

impl RasterCodec {
    pub fn new() -> Self {
        Self
    }
}

/// Maps `0.1..=1.0` onto the JPEG encoder's `1..=100`.
fn jpeg_quality(quality: f32) -> u8 {
    (clamp_quality(quality) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn probe_blocking(data: &[u8]) -> PortResult<ImageDimensions> {
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PortError::Image(e.to_string()))?
        .into_dimensions()
        .map_err(|e| PortError::Image(e.to_string()))?;
    Ok(ImageDimensions::new(width, height))
}

fn resize_blocking(data: &[u8], width: u32, height: u32, quality: f32) -> PortResult<Bytes> {
    let source = image::load_from_memory(data).map_err(|e| PortError::Image(e.to_string()))?;

    // JPEG has no alpha channel.
    let scaled = source.resize_exact(width, height, FilterType::Lanczos3);
    let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());

    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality)))
        .map_err(|e| PortError::Image(e.to_string()))?;

    debug!(
        width,
        height,
        quality,
        input_bytes = data.len(),
        output_bytes = out.len(),
        "Re-encoded image"
    );
    Ok(Bytes::from(out))
}

//=========================================================================================
// `ImageCodec` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageCodec for RasterCodec {
    async fn probe(&self, data: Bytes) -> PortResult<ImageDimensions> {
        tokio::task::spawn_blocking(move || probe_blocking(&data))
            .await
            .map_err(|e| PortError::Unexpected(format!("Task join error: {}", e)))?
    }

    async fn resize(&self, data: Bytes, width: u32, height: u32, quality: f32) -> PortResult<Bytes> {
        tokio::task::spawn_blocking(move || resize_blocking(&data, width, height, quality))
            .await
            .map_err(|e| PortError::Unexpected(format!("Task join error: {}", e)))?
    }
}
