//! QR Decoder
//!
//! Raster bytes in any supported format -> greyscale bitmap -> QR symbol text.

use thiserror::Error;

/// Why an image yielded no identifier. Every variant is a guest-facing
/// "invalid QR" outcome, never an infrastructure failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Image could not be read: {0}")]
    UnreadableImage(String),
    #[error("No QR symbol found in image")]
    NoSymbol,
    #[error("QR symbol is damaged: {0}")]
    Corrupt(String),
}

/// Decodes the payload text out of an image containing a QR code
pub trait QrDecoder: Send + Sync {
    fn decode(&self, image_bytes: &[u8]) -> Result<String, DecodeError>;
}

/// `rqrr`-backed decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    #[allow(clippy::cast_possible_truncation)] // grid coordinates come from a u32-sized image
    fn decode(&self, image_bytes: &[u8]) -> Result<String, DecodeError> {
        let luma = image::load_from_memory(image_bytes)
            .map_err(|e| DecodeError::UnreadableImage(e.to_string()))?
            .to_luma8();

        let (width, height) = luma.dimensions();
        let (width, height) = (width as usize, height as usize);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });

        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Err(DecodeError::NoSymbol);
        }

        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => return Ok(content),
                Err(e) => last_error = Some(e.to_string()),
            }
        }
        Err(DecodeError::Corrupt(last_error.unwrap_or_else(|| "unknown".to_string())))
    }
}
