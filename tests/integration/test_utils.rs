//! Test utilities for integration tests.
//!
//! Provides a decode-service wrapper that counts invocations, so tests can
//! verify how often the compositor actually reaches the (expensive) decoder,
//! plus helpers for assembling synthetic mosaic repositories.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use microtile::{
    Bitmap, CodecError, Coordinate, DecodeService, Dimension, IntRect, IntSize, MemoryRepository,
    PixelType, RawCopyDecoder, SubBlockCache,
};

/// Install a tracing subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Counting Decode Service
// =============================================================================

/// A decode service that delegates to [`RawCopyDecoder`] and counts calls.
pub struct CountingDecoder {
    inner: RawCopyDecoder,
    calls: AtomicUsize,
}

impl CountingDecoder {
    pub fn new() -> Self {
        Self {
            inner: RawCopyDecoder::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecodeService for CountingDecoder {
    async fn decode(
        &self,
        payload: &Bytes,
        pixel_type: PixelType,
        size: IntSize,
    ) -> Result<Bitmap, CodecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(payload, pixel_type, size).await
    }
}

// =============================================================================
// Repository Builders
// =============================================================================

/// A payload whose pixels all hold `value`.
pub fn gray_payload(width: u32, height: u32, value: u8) -> Bytes {
    Bytes::from(vec![value; (width * height) as usize])
}

/// The plane coordinate used throughout the tests.
pub fn plane_c0() -> Coordinate {
    Coordinate::from_pairs([(Dimension::C, 0)])
}

/// A 2x2 mosaic of `tile`-sized layer-0 tiles at channel 0, with m-indices
/// 0..4 in row-major order and each tile's pixels set to `10 * (m + 1)`.
pub fn mosaic_2x2(tile: u32) -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    let mut m = 0u32;
    for ty in 0..2u32 {
        for tx in 0..2u32 {
            repo.add(
                plane_c0(),
                IntRect::new(
                    (tx * tile) as i32,
                    (ty * tile) as i32,
                    tile as i32,
                    tile as i32,
                ),
                IntSize::new(tile, tile),
                Some(m as i32),
                PixelType::Gray8,
                gray_payload(tile, tile, (10 * (m + 1)) as u8),
            );
            m += 1;
        }
    }
    repo
}

/// Wrap a repository and a counting decoder into the pieces an accessor
/// needs.
pub fn counting_setup(
    repo: MemoryRepository,
) -> (Arc<MemoryRepository>, Arc<SubBlockCache>, Arc<CountingDecoder>) {
    (
        Arc::new(repo),
        Arc::new(SubBlockCache::new()),
        Arc::new(CountingDecoder::new()),
    )
}
