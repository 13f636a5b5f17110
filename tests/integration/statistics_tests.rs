//! Statistics aggregation over repository listings, plus serialization of
//! the summary types.

use microtile::{
    compute, CacheStatistics, Coordinate, Dimension, IntRect, IntSize, MemoryRepository,
    PixelType, StatisticsBuilder,
};

use super::test_utils::gray_payload;

fn build_two_scene_document() -> MemoryRepository {
    let coord = |c: i32, s: i32| Coordinate::from_pairs([(Dimension::C, c), (Dimension::S, s)]);
    let mut repo = MemoryRepository::new();

    // scene 0: two layer-0 tiles and one pyramid layer
    repo.add(
        coord(0, 0),
        IntRect::new(0, 0, 16, 16),
        IntSize::new(16, 16),
        Some(0),
        PixelType::Gray8,
        gray_payload(16, 16, 1),
    );
    repo.add(
        coord(1, 0),
        IntRect::new(16, 0, 16, 16),
        IntSize::new(16, 16),
        Some(1),
        PixelType::Gray8,
        gray_payload(16, 16, 2),
    );
    repo.add(
        coord(0, 0),
        IntRect::new(0, 0, 200, 16),
        IntSize::new(100, 8),
        None,
        PixelType::Gray8,
        gray_payload(100, 8, 3),
    );

    // scene 1: one layer-0 tile far away
    repo.add(
        coord(0, 1),
        IntRect::new(100, 100, 16, 16),
        IntSize::new(16, 16),
        Some(5),
        PixelType::Gray8,
        gray_payload(16, 16, 4),
    );

    repo
}

#[test]
fn test_statistics_over_repository_listing() {
    let repo = build_two_scene_document();
    let stats = compute(repo.descriptors(), None);

    assert_eq!(stats.sub_block_count, 4);
    // the pyramid layer widens only the overall box
    assert_eq!(stats.bounding_box, IntRect::new(0, 0, 200, 116));
    assert_eq!(stats.bounding_box_layer0, IntRect::new(0, 0, 116, 116));
    assert_eq!(stats.min_m_index, Some(0));
    assert_eq!(stats.max_m_index, Some(5));

    assert_eq!(stats.total_scene_count, 2);
    let (scene0, boxes0) = stats.scene_bounding_boxes[0];
    assert_eq!(scene0, 0);
    assert_eq!(boxes0.bounding_box, IntRect::new(0, 0, 200, 16));
    assert_eq!(boxes0.bounding_box_layer0, IntRect::new(0, 0, 32, 16));

    let (scene1, boxes1) = stats.scene_bounding_boxes[1];
    assert_eq!(scene1, 1);
    assert_eq!(boxes1.bounding_box, IntRect::new(100, 100, 16, 16));

    assert_eq!(stats.dim_bounds.interval(Dimension::C), Some((0, 2)));
    assert_eq!(stats.dim_bounds.interval(Dimension::S), Some((0, 2)));
}

#[test]
fn test_incremental_builder_equals_one_shot() {
    let repo = build_two_scene_document();

    let mut builder = StatisticsBuilder::new();
    for descriptor in repo.descriptors() {
        builder.update(descriptor);
    }
    let incremental = builder.build(None);
    let one_shot = compute(repo.descriptors(), None);

    assert_eq!(incremental, one_shot);
}

#[test]
fn test_statistics_serialize_to_json() {
    let repo = build_two_scene_document();
    let stats = compute(repo.descriptors(), None);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["sub_block_count"], 4);
    assert_eq!(json["bounding_box"]["w"], 200);
    assert_eq!(json["total_scene_count"], 2);
}

#[test]
fn test_cache_statistics_serialize_to_json() {
    let stats = CacheStatistics {
        memory_usage_bytes: 1024,
        element_count: 3,
    };
    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["memory_usage_bytes"], 1024);
    assert_eq!(json["element_count"], 3);
}
