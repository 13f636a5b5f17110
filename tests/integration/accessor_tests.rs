//! End-to-end compositor tests: mosaics, pyramid selection, masks, the
//! decode/cache interplay and the JPEG decode variant.

use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma};

use microtile::{
    AccessorOptions, BitonalBitmap, Coordinate, Dimension, IntRect, IntSize, JpegDecoder,
    MemoryRepository, PixelType, ScalingTileAccessor, SubBlockCache,
};

use super::test_utils::{counting_setup, gray_payload, init_tracing, mosaic_2x2, plane_c0};

#[tokio::test]
async fn test_mosaic_composition() {
    init_tracing();
    let (repo, cache, decoder) = counting_setup(mosaic_2x2(4));
    let accessor = ScalingTileAccessor::new(repo, cache, decoder);

    let bitmap = accessor
        .get(
            &plane_c0(),
            &IntRect::new(0, 0, 8, 8),
            1.0,
            &AccessorOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(bitmap.width(), 8);
    assert_eq!(bitmap.height(), 8);
    // one probe inside each tile, values follow the m-index layout
    assert_eq!(bitmap.pixel(1, 1), &[10]);
    assert_eq!(bitmap.pixel(5, 1), &[20]);
    assert_eq!(bitmap.pixel(1, 5), &[30]);
    assert_eq!(bitmap.pixel(5, 5), &[40]);
}

#[tokio::test]
async fn test_partial_region_touches_only_intersecting_tiles() {
    let (repo, cache, decoder) = counting_setup(mosaic_2x2(4));
    let accessor = ScalingTileAccessor::new(repo, cache, decoder.clone());

    // a region wholly inside the top-left tile
    let bitmap = accessor
        .get(
            &plane_c0(),
            &IntRect::new(1, 1, 2, 2),
            1.0,
            &AccessorOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(bitmap.width(), 2);
    assert!(bitmap.data().iter().all(|&b| b == 10));
    // only that one tile was decoded
    assert_eq!(decoder.calls(), 1);
}

#[tokio::test]
async fn test_repeated_request_is_served_from_cache() {
    let (repo, cache, decoder) = counting_setup(mosaic_2x2(4));
    let accessor = ScalingTileAccessor::new(repo, Arc::clone(&cache), decoder.clone());
    let roi = IntRect::new(0, 0, 8, 8);

    let first = accessor
        .get(&plane_c0(), &roi, 1.0, &AccessorOptions::default())
        .await
        .unwrap();
    assert_eq!(decoder.calls(), 4);
    assert_eq!(cache.element_count(), 4);

    let second = accessor
        .get(&plane_c0(), &roi, 1.0, &AccessorOptions::default())
        .await
        .unwrap();
    // no further decodes, identical output
    assert_eq!(decoder.calls(), 4);
    assert_eq!(first.data(), second.data());
}

#[tokio::test]
async fn test_coverage_optimization_saves_decodes() {
    let mut repo = MemoryRepository::new();
    // three stacked full-cover tiles; only the topmost is visible
    for m in 0..3 {
        repo.add(
            plane_c0(),
            IntRect::new(0, 0, 8, 8),
            IntSize::new(8, 8),
            Some(m),
            PixelType::Gray8,
            gray_payload(8, 8, (100 + m) as u8),
        );
    }

    let (repo, cache, decoder) = counting_setup(repo);
    let accessor = ScalingTileAccessor::new(repo, cache, decoder.clone());

    let bitmap = accessor
        .get(
            &plane_c0(),
            &IntRect::new(0, 0, 8, 8),
            1.0,
            &AccessorOptions {
                use_coverage_optimization: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(bitmap.data().iter().all(|&b| b == 102));
    assert_eq!(decoder.calls(), 1);
}

#[tokio::test]
async fn test_masked_tile_over_earlier_tile() {
    // a base tile, then a masked tile on top: masked-off pixels must show the
    // base tile, not the background
    let mut repo = MemoryRepository::new();
    repo.add(
        plane_c0(),
        IntRect::new(0, 0, 4, 4),
        IntSize::new(4, 4),
        Some(0),
        PixelType::Gray8,
        gray_payload(4, 4, 50),
    );

    let mut mask = BitonalBitmap::filled(4, 4, true);
    for y in 0..4 {
        mask.set(0, y, false); // left column masked off
    }
    repo.add_with_mask(
        plane_c0(),
        IntRect::new(0, 0, 4, 4),
        IntSize::new(4, 4),
        Some(1),
        PixelType::Gray8,
        gray_payload(4, 4, 200),
        mask,
    );

    let (repo, cache, decoder) = counting_setup(repo);
    let accessor = ScalingTileAccessor::new(repo, cache, decoder);

    let bitmap = accessor
        .get(
            &plane_c0(),
            &IntRect::new(0, 0, 4, 4),
            1.0,
            &AccessorOptions {
                mask_aware: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    for y in 0..4 {
        assert_eq!(bitmap.pixel(0, y), &[50], "masked column shows base tile");
        assert_eq!(bitmap.pixel(1, y), &[200]);
    }
}

#[tokio::test]
async fn test_scaled_mosaic_request() {
    let (repo, cache, decoder) = counting_setup(mosaic_2x2(4));
    let accessor = ScalingTileAccessor::new(repo, cache, decoder);

    // no pyramid layers stored: a zoom-0.5 request resamples layer 0
    let bitmap = accessor
        .get(
            &plane_c0(),
            &IntRect::new(0, 0, 8, 8),
            0.5,
            &AccessorOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(bitmap.width(), 4);
    assert_eq!(bitmap.height(), 4);
    assert_eq!(bitmap.pixel(0, 0), &[10]);
    assert_eq!(bitmap.pixel(3, 3), &[40]);
}

#[tokio::test]
async fn test_multi_scene_document() {
    let scene = |s| Coordinate::from_pairs([(Dimension::C, 0), (Dimension::S, s)]);
    let mut repo = MemoryRepository::new();
    repo.add(
        scene(0),
        IntRect::new(0, 0, 4, 4),
        IntSize::new(4, 4),
        Some(0),
        PixelType::Gray8,
        gray_payload(4, 4, 60),
    );
    repo.add(
        scene(1),
        IntRect::new(4, 0, 4, 4),
        IntSize::new(4, 4),
        Some(0),
        PixelType::Gray8,
        gray_payload(4, 4, 120),
    );

    let (repo, cache, decoder) = counting_setup(repo);
    let accessor = ScalingTileAccessor::new(repo, cache, decoder);

    let bitmap = accessor
        .get(
            &plane_c0(),
            &IntRect::new(0, 0, 8, 4),
            1.0,
            &AccessorOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(bitmap.pixel(1, 1), &[60]);
    assert_eq!(bitmap.pixel(6, 1), &[120]);
}

#[tokio::test]
async fn test_jpeg_decode_service_end_to_end() {
    let width = 16u32;
    let height = 16u32;
    let img = GrayImage::from_pixel(width, height, Luma([180]));
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 95)
        .encode_image(&img)
        .unwrap();

    let mut repo = MemoryRepository::new();
    repo.add(
        plane_c0(),
        IntRect::new(0, 0, width as i32, height as i32),
        IntSize::new(width, height),
        Some(0),
        PixelType::Gray8,
        Bytes::from(buf),
    );

    let accessor = ScalingTileAccessor::new(
        Arc::new(repo),
        Arc::new(SubBlockCache::new()),
        Arc::new(JpegDecoder::new()),
    );

    let bitmap = accessor
        .get(
            &plane_c0(),
            &IntRect::new(0, 0, width as i32, height as i32),
            1.0,
            &AccessorOptions::default(),
        )
        .await
        .unwrap();

    let value = bitmap.pixel(8, 8)[0];
    assert!((i16::from(value) - 180).abs() < 8, "value was {value}");
}
