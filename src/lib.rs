//! # microtile
//!
//! The in-memory data-management core for reading and composing very large,
//! multi-resolution microscopy mosaics stored as independently positioned,
//! independently compressed tiles ("sub-blocks"), each tagged with a position
//! in a sparse, named-dimension coordinate space (channel, time-point,
//! z-plane, scene, ...) rather than a dense array index.
//!
//! ## Features
//!
//! - **Sparse coordinate model**: partial assignments over a fixed dimension
//!   set, with compact string round-tripping (`"C0T2"`, `"C0:3T0:10"`)
//! - **Single-pass statistics**: overall, layer-0-only and per-scene bounding
//!   boxes, m-index and per-dimension index ranges over any sub-block listing
//! - **Memory-bounded tile cache**: strict LRU over a global recency counter,
//!   caller-triggered pruning, consistent statistics snapshots
//! - **Scaling, mask-aware compositor**: pyramid-layer selection per zoom,
//!   draw-order compositing with per-pixel opacity masks, optional occlusion
//!   pruning
//!
//! Container parsing, the compression codecs themselves and byte transport
//! are external collaborators, reached through the [`SubBlockRepository`] and
//! [`DecodeService`] traits.
//!
//! ## Architecture
//!
//! - [`coord`] - sparse coordinates and per-dimension bounds
//! - [`geometry`] - rectangles and coverage bookkeeping
//! - [`bitmap`] - pixel buffers, bitonal masks and pixel operations
//! - [`subblock`] - descriptors and the repository contract
//! - [`statistics`] - the single-pass statistics aggregator
//! - [`cache`] - the shared decoded-bitmap cache
//! - [`codec`] - the decode-service contract and built-in variants
//! - [`accessor`] - the tile compositor
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use microtile::{
//!     AccessorOptions, Coordinate, Dimension, IntRect, IntSize, MemoryRepository, PixelType,
//!     RawCopyDecoder, ScalingTileAccessor, SubBlockCache,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut repo = MemoryRepository::new();
//!     repo.add(
//!         Coordinate::from_pairs([(Dimension::C, 0)]),
//!         IntRect::new(0, 0, 4, 4),
//!         IntSize::new(4, 4),
//!         Some(0),
//!         PixelType::Gray8,
//!         Bytes::from(vec![128u8; 16]),
//!     );
//!
//!     let accessor = ScalingTileAccessor::new(
//!         Arc::new(repo),
//!         Arc::new(SubBlockCache::new()),
//!         Arc::new(RawCopyDecoder::new()),
//!     );
//!
//!     let plane = Coordinate::from_pairs([(Dimension::C, 0)]);
//!     let bitmap = accessor
//!         .get(&plane, &IntRect::new(0, 0, 4, 4), 1.0, &AccessorOptions::default())
//!         .await
//!         .unwrap();
//!     assert_eq!(bitmap.width(), 4);
//! }
//! ```

pub mod accessor;
pub mod bitmap;
pub mod cache;
pub mod codec;
pub mod coord;
pub mod error;
pub mod geometry;
pub mod statistics;
pub mod subblock;

// Re-export commonly used types
pub use accessor::{AccessorOptions, ScalingTileAccessor};
pub use bitmap::{Bitmap, BitonalBitmap, PixelType, RgbFloatColor};
pub use cache::{CacheStatistics, PruneOptions, SubBlockCache};
pub use codec::{DecodeService, JpegDecoder, RawCopyDecoder};
pub use coord::{Coordinate, DimBounds, Dimension};
pub use error::{CodecError, ComposeError, CoordinateError, RepositoryError};
pub use geometry::{DblRect, IntRect, IntSize, RectangleCoverageCalculator};
pub use statistics::{
    compute, SceneBoundingBoxes, StatisticsBuilder, SubBlockStatistics,
};
pub use subblock::{MemoryRepository, SubBlockDescriptor, SubBlockId, SubBlockRepository};
