//! The scaling, mask-aware tile compositor.
//!
//! Given a plane coordinate, a region of interest in document pixel space and
//! a zoom factor, the accessor locates every sub-block intersecting the
//! region (possibly across multiple pyramid resolutions), obtains their
//! decoded bitmaps through the shared [`SubBlockCache`] (falling back to the
//! [`DecodeService`] on a miss) and blends them into one destination bitmap,
//! honoring per-pixel opacity masks and draw order.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ScalingTileAccessor                      │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                        get()                           │  │
//! │  │  1. List matching sub-blocks   4. Cache get / decode   │  │
//! │  │  2. Group + order by pyramid   5. Mask-aware blend     │  │
//! │  │  3. Occlusion pruning (opt.)   6. Return bitmap        │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │         │                   │                    │           │
//! │         ▼                   ▼                    ▼           │
//! │  ┌─────────────┐    ┌───────────────┐    ┌──────────────┐    │
//! │  │ Repository  │    │ SubBlockCache │    │ DecodeService│    │
//! │  └─────────────┘    └───────────────┘    └──────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding always happens outside any cache lock; see the cache module for
//! the duplicate-decode trade-off this implies.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::bitmap::{ops, Bitmap, BitonalBitmap, PixelType, RgbFloatColor};
use crate::cache::SubBlockCache;
use crate::codec::DecodeService;
use crate::coord::Coordinate;
use crate::error::{CodecError, ComposeError};
use crate::geometry::{DblRect, IntRect, IntSize, RectangleCoverageCalculator};
use crate::subblock::{SubBlockDescriptor, SubBlockRepository};

/// Pyramid-window factor: starting from the first layer sharp enough for the
/// requested zoom, sub-blocks are drawn until their stored zoom reaches this
/// multiple of the starting zoom.
const PYRAMID_WINDOW_FACTOR: f64 = 1.9;

/// Configuration for one composition request.
#[derive(Debug, Clone)]
pub struct AccessorOptions {
    /// Fill for destination pixels not covered by any sub-block (or masked
    /// out)
    pub background_color: RgbFloatColor,

    /// Order layer-0 sub-blocks of equal zoom by their m-index (sub-blocks
    /// without one draw first); repository order breaks remaining ties
    pub sort_by_m: bool,

    /// Skip decoding sub-blocks fully occluded by later-drawn ones; output
    /// pixels are identical, decode cost is not
    pub use_coverage_optimization: bool,

    /// Honor per-pixel opacity mask attachments: mask bit 0 leaves the
    /// destination pixel unchanged
    pub mask_aware: bool,

    /// Restrict contributing sub-blocks to these scene indices; sub-blocks
    /// without a scene dimension always pass
    pub scene_filter: Option<BTreeSet<i32>>,

    /// Treat "no sub-block matches" as a valid all-background result instead
    /// of an error
    pub allow_empty: bool,
}

impl Default for AccessorOptions {
    fn default() -> Self {
        Self {
            background_color: RgbFloatColor::BLACK,
            sort_by_m: true,
            use_coverage_optimization: false,
            mask_aware: false,
            scene_filter: None,
            allow_empty: false,
        }
    }
}

/// The tile compositor.
///
/// Cheap to share: holds `Arc`s to the repository, the cache and the decode
/// service. Any number of `get` calls may run concurrently; the cache is the
/// only shared mutable state.
pub struct ScalingTileAccessor<R> {
    repository: Arc<R>,
    cache: Arc<SubBlockCache>,
    decoder: Arc<dyn DecodeService>,
}

impl<R: SubBlockRepository> ScalingTileAccessor<R> {
    pub fn new(
        repository: Arc<R>,
        cache: Arc<SubBlockCache>,
        decoder: Arc<dyn DecodeService>,
    ) -> Self {
        Self {
            repository,
            cache,
            decoder,
        }
    }

    /// The destination size a request will produce: the region of interest
    /// scaled by `zoom`, truncated.
    pub fn calc_size(roi: &IntRect, zoom: f64) -> IntSize {
        IntSize::new(
            (f64::from(roi.w) * zoom) as u32,
            (f64::from(roi.h) * zoom) as u32,
        )
    }

    /// Compose the requested region, deriving the pixel type from the
    /// contributing sub-blocks.
    ///
    /// Zero matches cannot yield a pixel type, so this variant fails with
    /// [`ComposeError::NoMatchingData`] even when `allow_empty` is set; use
    /// [`get_with_pixel_type`] to compose possibly-empty regions.
    ///
    /// [`get_with_pixel_type`]: ScalingTileAccessor::get_with_pixel_type
    pub async fn get(
        &self,
        coordinate: &Coordinate,
        roi: &IntRect,
        zoom: f64,
        options: &AccessorOptions,
    ) -> Result<Bitmap, ComposeError> {
        let matches = self.collect(coordinate, roi, zoom, options).await?;
        let pixel_type = matches
            .first()
            .map(|d| d.pixel_type)
            .ok_or(ComposeError::NoMatchingData)?;
        self.compose(pixel_type, matches, roi, zoom, options).await
    }

    /// Compose the requested region into a bitmap of the given pixel type.
    ///
    /// Every contributing sub-block must decode to exactly this pixel type.
    pub async fn get_with_pixel_type(
        &self,
        pixel_type: PixelType,
        coordinate: &Coordinate,
        roi: &IntRect,
        zoom: f64,
        options: &AccessorOptions,
    ) -> Result<Bitmap, ComposeError> {
        let matches = self.collect(coordinate, roi, zoom, options).await?;
        self.compose(pixel_type, matches, roi, zoom, options).await
    }

    /// List and scene-filter the sub-blocks contributing to a request.
    async fn collect(
        &self,
        coordinate: &Coordinate,
        roi: &IntRect,
        zoom: f64,
        options: &AccessorOptions,
    ) -> Result<Vec<SubBlockDescriptor>, ComposeError> {
        if roi.is_empty() {
            return Err(ComposeError::InvalidRequest(format!(
                "region of interest {roi:?} is empty"
            )));
        }
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(ComposeError::InvalidRequest(format!(
                "zoom factor {zoom} must be positive and finite"
            )));
        }
        let size = Self::calc_size(roi, zoom);
        if size.w == 0 || size.h == 0 {
            return Err(ComposeError::InvalidRequest(format!(
                "region {roi:?} at zoom {zoom} produces an empty destination"
            )));
        }

        let mut matches = self.repository.list(coordinate, Some(roi)).await?;
        if let Some(filter) = &options.scene_filter {
            matches.retain(|d| d.scene().map_or(true, |s| filter.contains(&s)));
        }

        debug!(
            plane = %coordinate,
            ?roi,
            zoom,
            matches = matches.len(),
            "composing region"
        );
        Ok(matches)
    }

    async fn compose(
        &self,
        pixel_type: PixelType,
        matches: Vec<SubBlockDescriptor>,
        roi: &IntRect,
        zoom: f64,
        options: &AccessorOptions,
    ) -> Result<Bitmap, ComposeError> {
        let size = Self::calc_size(roi, zoom);
        let mut dest = Bitmap::new(pixel_type, size.w, size.h);
        ops::fill(&mut dest, options.background_color);

        if matches.is_empty() {
            return if options.allow_empty {
                Ok(dest)
            } else {
                Err(ComposeError::NoMatchingData)
            };
        }

        for descriptor in &matches {
            if descriptor.pixel_type != pixel_type {
                return Err(ComposeError::PixelTypeMismatch {
                    id: descriptor.id,
                    expected: pixel_type,
                    actual: descriptor.pixel_type,
                });
            }
        }

        // One request may span several scenes; each scene's sub-blocks form
        // their own pyramid and are painted as a group, scene-less sub-blocks
        // first, then scenes in ascending order.
        let mut groups: BTreeMap<Option<i32>, Vec<SubBlockDescriptor>> = BTreeMap::new();
        for descriptor in matches {
            groups.entry(descriptor.scene()).or_default().push(descriptor);
        }

        for (scene, group) in groups {
            trace!(?scene, sub_blocks = group.len(), "painting scene group");
            self.paint(&mut dest, roi, group, zoom, options).await?;
        }

        Ok(dest)
    }

    /// Paint one scene group: order by pyramid, select the zoom window, prune
    /// occluded sub-blocks, then blend each remaining sub-block.
    async fn paint(
        &self,
        dest: &mut Bitmap,
        roi: &IntRect,
        mut group: Vec<SubBlockDescriptor>,
        zoom: f64,
        options: &AccessorOptions,
    ) -> Result<(), ComposeError> {
        sort_for_drawing(&mut group, options.sort_by_m);

        // the first layer at least as sharp as the request starts the window;
        // anything sharper than PYRAMID_WINDOW_FACTOR times that is left to a
        // finer request
        let Some(start) = group.iter().position(|d| d.zoom() >= zoom) else {
            // overzoom: every stored layer is coarser than the request
            trace!(zoom, "no sub-block sharp enough, skipping group");
            return Ok(());
        };
        let start_zoom = group[start].zoom();
        let end = group[start..]
            .iter()
            .position(|d| d.zoom() >= start_zoom * PYRAMID_WINDOW_FACTOR)
            .map_or(group.len(), |offset| start + offset);
        let selected = &group[start..end];

        let draw_list: Vec<&SubBlockDescriptor> = if options.use_coverage_optimization {
            visible_sub_blocks(roi, selected)
        } else {
            selected.iter().collect()
        };

        for descriptor in draw_list {
            trace!(
                id = ?descriptor.id,
                rect = ?descriptor.logical_rect,
                m_index = ?descriptor.m_index,
                "drawing sub-block"
            );
            let source = self.fetch_bitmap(descriptor).await?;

            if source.pixel_type() != dest.pixel_type() {
                return Err(ComposeError::PixelTypeMismatch {
                    id: descriptor.id,
                    expected: dest.pixel_type(),
                    actual: source.pixel_type(),
                });
            }
            if source.width() != descriptor.physical_size.w
                || source.height() != descriptor.physical_size.h
            {
                return Err(ComposeError::Decode(CodecError::SizeMismatch {
                    expected_w: descriptor.physical_size.w,
                    expected_h: descriptor.physical_size.h,
                    actual_w: source.width(),
                    actual_h: source.height(),
                }));
            }

            let mask = if options.mask_aware {
                self.repository.fetch_mask(descriptor.id).await?
            } else {
                None
            };
            // a mask must match the stored bitmap pixel-for-pixel
            let mask = mask.filter(|m| {
                let fits = m.width() == source.width() && m.height() == source.height();
                if !fits {
                    debug!(id = ?descriptor.id, "mask size differs from bitmap, ignoring mask");
                }
                fits
            });

            scale_blt(dest, roi, zoom, descriptor, &source, mask.as_ref());
        }

        Ok(())
    }

    /// Decoded bitmap for a sub-block: cache hit, or decode-then-populate.
    ///
    /// The decode runs outside any cache lock, so concurrent requests for the
    /// same missing sub-block may decode it twice; the last `add` wins.
    async fn fetch_bitmap(
        &self,
        descriptor: &SubBlockDescriptor,
    ) -> Result<Arc<Bitmap>, ComposeError> {
        if let Some(hit) = self.cache.get(descriptor.id).await {
            trace!(id = ?descriptor.id, "cache hit");
            return Ok(hit);
        }

        let payload = self.repository.fetch_payload(descriptor.id).await?;
        let bitmap = Arc::new(
            self.decoder
                .decode(&payload, descriptor.pixel_type, descriptor.physical_size)
                .await?,
        );
        self.cache.add(descriptor.id, Arc::clone(&bitmap)).await;
        Ok(bitmap)
    }
}

/// Draw order within one scene group: zoom ascending, layer-0 ties by
/// m-index (absent m-index first). The sort is stable, so repository
/// insertion order breaks remaining ties.
fn sort_for_drawing(group: &mut [SubBlockDescriptor], sort_by_m: bool) {
    group.sort_by(|a, b| {
        let zoom_a = a.zoom();
        let zoom_b = b.zoom();
        match zoom_a.partial_cmp(&zoom_b) {
            Some(Ordering::Equal) | None => {}
            Some(ord) => return ord,
        }
        if sort_by_m && a.is_layer0() && b.is_layer0() {
            let m_a = a.m_index.unwrap_or(i32::MIN);
            let m_b = b.m_index.unwrap_or(i32::MIN);
            m_a.cmp(&m_b)
        } else {
            Ordering::Equal
        }
    });
}

/// Occlusion pruning: walk the draw list from topmost down, keep only
/// sub-blocks that contribute at least one not-yet-covered pixel, stop once
/// the region is fully covered. Returns the keepers in draw order.
fn visible_sub_blocks<'a>(
    roi: &IntRect,
    selected: &'a [SubBlockDescriptor],
) -> Vec<&'a SubBlockDescriptor> {
    let total = roi.area();
    if total == 0 || selected.is_empty() {
        return Vec::new();
    }

    let mut calculator = RectangleCoverageCalculator::new();
    let mut covered = 0i64;
    let mut keep: Vec<&SubBlockDescriptor> = Vec::with_capacity(selected.len());

    for descriptor in selected.iter().rev() {
        calculator.add_rectangle(descriptor.logical_rect);
        let now_covered = calculator.area_of_intersection(roi);
        if now_covered > covered {
            keep.push(descriptor);
            covered = now_covered;
            if covered == total {
                break;
            }
        }
    }

    keep.reverse();
    keep
}

/// Blend one decoded sub-block into the destination.
///
/// At zoom exactly 1 this is a pixel-exact offset copy; otherwise the
/// intersection of the sub-block's logical rectangle with the region of
/// interest is mapped through both ROIs and resampled nearest-neighbor.
fn scale_blt(
    dest: &mut Bitmap,
    roi: &IntRect,
    zoom: f64,
    descriptor: &SubBlockDescriptor,
    source: &Bitmap,
    mask: Option<&BitonalBitmap>,
) {
    if zoom == 1.0 {
        let x_offset = descriptor.logical_rect.x - roi.x;
        let y_offset = descriptor.logical_rect.y - roi.y;
        match mask {
            Some(mask) => ops::copy_with_offset_masked(source, mask, dest, x_offset, y_offset),
            None => ops::copy_with_offset(source, dest, x_offset, y_offset),
        }
        return;
    }

    let Some(intersect) = descriptor.logical_rect.intersection(roi) else {
        return;
    };
    let logical = descriptor.logical_rect;

    let src_left = f64::from(intersect.x - logical.x) / f64::from(logical.w);
    let src_top = f64::from(intersect.y - logical.y) / f64::from(logical.h);
    let src_right = f64::from(intersect.right() - logical.x) / f64::from(logical.w);
    let src_bottom = f64::from(intersect.bottom() - logical.y) / f64::from(logical.h);

    let dst_left = f64::from(intersect.x - roi.x) / f64::from(roi.w);
    let dst_top = f64::from(intersect.y - roi.y) / f64::from(roi.h);
    let dst_right = f64::from(intersect.right() - roi.x) / f64::from(roi.w);
    let dst_bottom = f64::from(intersect.bottom() - roi.y) / f64::from(roi.h);

    let src_roi = DblRect::new(
        src_left * f64::from(descriptor.physical_size.w),
        src_top * f64::from(descriptor.physical_size.h),
        (src_right - src_left) * f64::from(descriptor.physical_size.w),
        (src_bottom - src_top) * f64::from(descriptor.physical_size.h),
    );
    let dst_roi = DblRect::new(
        dst_left * f64::from(dest.width()),
        dst_top * f64::from(dest.height()),
        (dst_right - dst_left) * f64::from(dest.width()),
        (dst_bottom - dst_top) * f64::from(dest.height()),
    );

    ops::nn_resize_masked(source, mask, dest, &src_roi, &dst_roi);
}
