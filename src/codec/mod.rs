//! The decode-service contract and the built-in decoder variants.
//!
//! Decompression is an external concern: the compositor only ever talks to a
//! [`DecodeService`]. Two variant implementations ship with the crate,
//! [`RawCopyDecoder`] for uncompressed payloads and [`JpegDecoder`] for
//! JPEG-compressed tiles, selected by configuration rather than subclassing.

mod jpeg;

pub use jpeg::JpegDecoder;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bitmap::{Bitmap, PixelType};
use crate::error::CodecError;
use crate::geometry::IntSize;

/// Decodes a sub-block's compressed payload into a bitmap.
///
/// Implementations must produce a bitmap of exactly the declared pixel type
/// and physical size, or fail; the compositor never accepts a partially
/// decoded tile.
#[async_trait]
pub trait DecodeService: Send + Sync {
    async fn decode(
        &self,
        payload: &Bytes,
        pixel_type: PixelType,
        size: IntSize,
    ) -> Result<Bitmap, CodecError>;
}

/// Decoder for uncompressed payloads: the bytes are the pixel rows, tightly
/// packed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCopyDecoder;

impl RawCopyDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecodeService for RawCopyDecoder {
    async fn decode(
        &self,
        payload: &Bytes,
        pixel_type: PixelType,
        size: IntSize,
    ) -> Result<Bitmap, CodecError> {
        let expected = size.w as usize * size.h as usize * pixel_type.bytes_per_pixel();
        if payload.len() != expected {
            return Err(CodecError::Malformed(format!(
                "uncompressed payload holds {} bytes, {}x{} {:?} needs {}",
                payload.len(),
                size.w,
                size.h,
                pixel_type,
                expected
            )));
        }

        let stride = size.w as usize * pixel_type.bytes_per_pixel();
        Bitmap::from_vec(pixel_type, size.w, size.h, stride, payload.to_vec())
            .ok_or_else(|| CodecError::Malformed("payload does not form a bitmap".into()))
    }
}
