//! JPEG decode variant backed by the `image` crate.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageReader};

use super::DecodeService;
use crate::bitmap::{Bitmap, PixelType};
use crate::error::CodecError;
use crate::geometry::IntSize;

/// Decoder for JPEG-compressed sub-block payloads.
///
/// Produces `Gray8` or `Bgr24` bitmaps (the pixel types JPEG can carry); any
/// other requested pixel type is rejected up front. The decoded dimensions
/// must match the sub-block's declared physical size.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder;

impl JpegDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecodeService for JpegDecoder {
    async fn decode(
        &self,
        payload: &Bytes,
        pixel_type: PixelType,
        size: IntSize,
    ) -> Result<Bitmap, CodecError> {
        if !matches!(pixel_type, PixelType::Gray8 | PixelType::Bgr24) {
            return Err(CodecError::UnsupportedPixelType(pixel_type));
        }

        let cursor = Cursor::new(payload.as_ref());
        let reader = ImageReader::with_format(cursor, image::ImageFormat::Jpeg);
        let img = reader
            .decode()
            .map_err(|e| CodecError::Malformed(e.to_string()))?;

        if img.width() != size.w || img.height() != size.h {
            return Err(CodecError::SizeMismatch {
                expected_w: size.w,
                expected_h: size.h,
                actual_w: img.width(),
                actual_h: img.height(),
            });
        }

        let bitmap = match pixel_type {
            PixelType::Gray8 => {
                let gray = img.into_luma8();
                let stride = size.w as usize;
                Bitmap::from_vec(pixel_type, size.w, size.h, stride, gray.into_raw())
            }
            PixelType::Bgr24 => rgb_to_bgr24(img, size),
            _ => unreachable!("pixel type checked above"),
        };

        bitmap.ok_or_else(|| CodecError::Malformed("decoded image does not form a bitmap".into()))
    }
}

/// Repack the decoder's RGB rows into B, G, R memory order.
fn rgb_to_bgr24(img: DynamicImage, size: IntSize) -> Option<Bitmap> {
    let rgb = img.into_rgb8();
    let mut data = rgb.into_raw();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    let stride = size.w as usize * 3;
    Bitmap::from_vec(PixelType::Bgr24, size.w, size.h, stride, data)
}
