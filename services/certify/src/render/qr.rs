//! QR encoding of verification URLs.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

/// Prefix of every data URL produced by [`QrImage::data_url`].
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Smallest rendered edge, in pixels, quiet zone included.
const MIN_EDGE_PX: u32 = 200;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("payload cannot be encoded as a QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("failed to encode QR image as PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// A rendered QR code together with the text it encodes.
#[derive(Debug, Clone)]
pub struct QrImage {
    payload: String,
    pixels: GrayImage,
    png: Vec<u8>,
}

impl QrImage {
    /// Encodes `payload` with medium error correction and a quiet zone.
    pub fn encode(payload: &str) -> Result<Self, QrError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)?;
        let pixels = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .min_dimensions(MIN_EDGE_PX, MIN_EDGE_PX)
            .build();

        let mut png = Vec::new();
        pixels.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        Ok(Self {
            payload: payload.to_string(),
            pixels,
            png,
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// 8-bit grayscale pixels, row-major, one byte per pixel.
    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// The PNG as a `data:` URL, embeddable in an `<img src>`.
    pub fn data_url(&self) -> String {
        format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(&self.png))
    }
}
