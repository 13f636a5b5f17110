//! Pixel-level operations: background fill, clipped offset copy and
//! nearest-neighbor resampling, each with a mask-aware variant.
//!
//! All operations work within one pixel type; the compositor rejects mixed
//! pixel types before any of these run.

use super::{Bitmap, BitonalBitmap, PixelType, RgbFloatColor};
use crate::geometry::DblRect;

/// One pixel's worth of bytes for a fill color.
fn color_pattern(pixel_type: PixelType, color: RgbFloatColor) -> Vec<u8> {
    fn q8(v: f32) -> u8 {
        (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
    }
    fn q16(v: f32) -> [u8; 2] {
        ((v.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16).to_le_bytes()
    }

    match pixel_type {
        PixelType::Gray8 => vec![q8(color.r)],
        PixelType::Gray16 => q16(color.r).to_vec(),
        PixelType::Gray32Float => color.r.to_le_bytes().to_vec(),
        PixelType::Bgr24 => vec![q8(color.b), q8(color.g), q8(color.r)],
        PixelType::Bgr48 => {
            let mut px = Vec::with_capacity(6);
            px.extend_from_slice(&q16(color.b));
            px.extend_from_slice(&q16(color.g));
            px.extend_from_slice(&q16(color.r));
            px
        }
    }
}

/// Fill every pixel of the bitmap with the given color.
pub fn fill(bitmap: &mut Bitmap, color: RgbFloatColor) {
    let pattern = color_pattern(bitmap.pixel_type(), color);
    let bpp = pattern.len();
    for y in 0..bitmap.height() {
        let row = bitmap.row_mut(y);
        for px in row.chunks_exact_mut(bpp) {
            px.copy_from_slice(&pattern);
        }
    }
}

/// Copy `src` into `dst` at the given pixel offset, clipped to `dst`.
///
/// Both bitmaps must share one pixel type; this is the pixel-exact path used
/// when the zoom factor is exactly 1.
pub fn copy_with_offset(src: &Bitmap, dst: &mut Bitmap, x_offset: i32, y_offset: i32) {
    debug_assert_eq!(src.pixel_type(), dst.pixel_type());
    let bpp = src.pixel_type().bytes_per_pixel();

    let Some((dst_x0, dst_y0, dst_x1, dst_y1)) = clipped_dest_range(src, dst, x_offset, y_offset)
    else {
        return;
    };

    for dst_y in dst_y0..dst_y1 {
        let src_y = (dst_y as i32 - y_offset) as u32;
        let src_x0 = (dst_x0 as i32 - x_offset) as usize;
        let width = (dst_x1 - dst_x0) as usize;
        let src_row = &src.row(src_y)[src_x0 * bpp..(src_x0 + width) * bpp];
        let dst_row = &mut dst.row_mut(dst_y)[dst_x0 as usize * bpp..(dst_x0 as usize + width) * bpp];
        dst_row.copy_from_slice(src_row);
    }
}

/// Like [`copy_with_offset`], but source pixels whose mask bit is 0 leave the
/// destination pixel untouched.
///
/// The mask must have the same dimensions as `src`.
pub fn copy_with_offset_masked(
    src: &Bitmap,
    mask: &BitonalBitmap,
    dst: &mut Bitmap,
    x_offset: i32,
    y_offset: i32,
) {
    debug_assert_eq!(src.pixel_type(), dst.pixel_type());
    debug_assert_eq!((mask.width(), mask.height()), (src.width(), src.height()));
    let bpp = src.pixel_type().bytes_per_pixel();

    let Some((dst_x0, dst_y0, dst_x1, dst_y1)) = clipped_dest_range(src, dst, x_offset, y_offset)
    else {
        return;
    };

    for dst_y in dst_y0..dst_y1 {
        let src_y = (dst_y as i32 - y_offset) as u32;
        let src_row = src.row(src_y);
        let dst_row = dst.row_mut(dst_y);
        for dst_x in dst_x0..dst_x1 {
            let src_x = (dst_x as i32 - x_offset) as u32;
            if !mask.get(src_x, src_y) {
                continue;
            }
            let s = src_x as usize * bpp;
            let d = dst_x as usize * bpp;
            dst_row[d..d + bpp].copy_from_slice(&src_row[s..s + bpp]);
        }
    }
}

/// The destination rows/columns `[x0, x1) x [y0, y1)` touched by an offset
/// copy, or `None` when the source lands entirely outside the destination.
fn clipped_dest_range(
    src: &Bitmap,
    dst: &Bitmap,
    x_offset: i32,
    y_offset: i32,
) -> Option<(u32, u32, u32, u32)> {
    let dst_x0 = x_offset.max(0);
    let dst_y0 = y_offset.max(0);
    let dst_x1 = (x_offset + src.width() as i32).min(dst.width() as i32);
    let dst_y1 = (y_offset + src.height() as i32).min(dst.height() as i32);
    if dst_x0 >= dst_x1 || dst_y0 >= dst_y1 {
        None
    } else {
        Some((dst_x0 as u32, dst_y0 as u32, dst_x1 as u32, dst_y1 as u32))
    }
}

/// Nearest-neighbor resample of the fractional source ROI onto the fractional
/// destination ROI.
pub fn nn_resize(src: &Bitmap, dst: &mut Bitmap, src_roi: &DblRect, dst_roi: &DblRect) {
    nn_resize_masked(src, None, dst, src_roi, dst_roi);
}

/// Nearest-neighbor resample honoring an optional opacity mask.
///
/// For each destination pixel in `dst_roi` the nearest source pixel inside
/// `src_roi` is looked up; if a mask is present and its bit for that source
/// pixel is 0 the destination pixel keeps its previous value, otherwise it is
/// overwritten with the source pixel.
///
/// The mask, when present, must have the same dimensions as `src`.
pub fn nn_resize_masked(
    src: &Bitmap,
    mask: Option<&BitonalBitmap>,
    dst: &mut Bitmap,
    src_roi: &DblRect,
    dst_roi: &DblRect,
) {
    debug_assert_eq!(src.pixel_type(), dst.pixel_type());
    if let Some(mask) = mask {
        debug_assert_eq!((mask.width(), mask.height()), (src.width(), src.height()));
    }
    if src_roi.w <= 0.0 || src_roi.h <= 0.0 || dst_roi.w <= 0.0 || dst_roi.h <= 0.0 {
        return;
    }

    let bpp = src.pixel_type().bytes_per_pixel();
    let src_width = src.width() as i64;
    let src_height = src.height() as i64;

    let dst_x_start = (dst_roi.x as i32).max(0);
    let dst_x_end = ((dst_roi.x + dst_roi.w) as i32).min(dst.width() as i32 - 1);
    let dst_y_start = (dst_roi.y as i32).max(0);
    let dst_y_end = ((dst_roi.y + dst_roi.h) as i32).min(dst.height() as i32 - 1);

    // destination pixels whose nearest source would fall outside the source
    // bitmap are excluded up front, the remaining lookups only need clamping
    let x_min = ((0.0 - src_roi.x) * dst_roi.w) / src_roi.w + dst_roi.x;
    let x_max = ((src_width as f64 - 1.0 - src_roi.x) * dst_roi.w) / src_roi.w + dst_roi.x;
    let y_min = ((0.0 - src_roi.y) * dst_roi.h) / src_roi.h + dst_roi.y;
    let y_max = ((src_height as f64 - 1.0 - src_roi.y) * dst_roi.h) / src_roi.h + dst_roi.y;

    let dst_x_start = (x_min.ceil() as i32).max(dst_x_start);
    let dst_x_end = (x_max.ceil() as i32).min(dst_x_end);
    let dst_y_start = (y_min.ceil() as i32).max(dst_y_start);
    let dst_y_end = (y_max.ceil() as i32).min(dst_y_end);
    if dst_x_start > dst_x_end || dst_y_start > dst_y_end {
        return;
    }

    let src_per_dst_x = src_roi.w / dst_roi.w;
    let src_per_dst_y = src_roi.h / dst_roi.h;

    for y in dst_y_start..=dst_y_end {
        let src_y = (y as f64 - dst_roi.y) * src_per_dst_y + src_roi.y;
        let src_y = (src_y.round() as i64).clamp(0, src_height - 1) as u32;
        let src_row = src.row(src_y);
        let dst_row = dst.row_mut(y as u32);
        for x in dst_x_start..=dst_x_end {
            let src_x = (x as f64 - dst_roi.x) * src_per_dst_x + src_roi.x;
            let src_x = (src_x.round() as i64).clamp(0, src_width - 1) as u32;
            if let Some(mask) = mask {
                if !mask.get(src_x, src_y) {
                    continue;
                }
            }
            let s = src_x as usize * bpp;
            let d = x as usize * bpp;
            dst_row[d..d + bpp].copy_from_slice(&src_row[s..s + bpp]);
        }
    }
}
