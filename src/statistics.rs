//! Single-pass reduction of a sub-block listing into document-level
//! statistics: overall and per-scene bounding boxes, m-index range, per
//! dimension index ranges.
//!
//! The reduction is pure over its input: feed descriptors into a
//! [`StatisticsBuilder`] (or use [`compute`] for a one-shot pass) and take
//! the resulting [`SubBlockStatistics`]. No synchronization is involved.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::coord::DimBounds;
use crate::geometry::IntRect;
use crate::subblock::SubBlockDescriptor;

/// Bounding boxes of one scene: all sub-blocks, and the layer-0 subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SceneBoundingBoxes {
    /// Union of the logical rectangles of every sub-block in the scene
    pub bounding_box: IntRect,

    /// Union restricted to full-resolution sub-blocks; zero if the scene has
    /// only pyramid layers
    pub bounding_box_layer0: IntRect,
}

/// Document-level statistics over a collection of sub-blocks.
///
/// An empty input produces zeroed boxes, empty bounds and a zero count; that
/// is a valid result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubBlockStatistics {
    /// Number of sub-blocks observed
    pub sub_block_count: u32,

    /// Smallest m-index observed, if any sub-block carried one
    pub min_m_index: Option<i32>,

    /// Largest m-index observed, if any sub-block carried one
    pub max_m_index: Option<i32>,

    /// Union of all logical rectangles
    pub bounding_box: IntRect,

    /// Union of the logical rectangles of full-resolution sub-blocks only
    pub bounding_box_layer0: IntRect,

    /// Per-scene bounding boxes, ordered by scene index.
    ///
    /// Sub-blocks without a scene dimension contribute to `bounding_box` but
    /// appear in no scene entry. When a cap was passed to
    /// [`StatisticsBuilder::build`] this list holds only the lowest-numbered
    /// scenes; compare its length against [`total_scene_count`] to detect the
    /// truncation.
    ///
    /// [`total_scene_count`]: SubBlockStatistics::total_scene_count
    pub scene_bounding_boxes: Vec<(i32, SceneBoundingBoxes)>,

    /// True number of distinct scenes observed, regardless of any cap
    pub total_scene_count: u32,

    /// Observed index range per dimension
    #[serde(skip)]
    pub dim_bounds: DimBounds,
}

/// Accumulator for the single-pass statistics reduction.
#[derive(Debug, Default)]
pub struct StatisticsBuilder {
    sub_block_count: u32,
    min_m_index: Option<i32>,
    max_m_index: Option<i32>,
    bounding_box: Option<IntRect>,
    bounding_box_layer0: Option<IntRect>,
    scenes: BTreeMap<i32, SceneAccumulator>,
    dim_bounds: DimBounds,
}

#[derive(Debug, Default)]
struct SceneAccumulator {
    bounding_box: Option<IntRect>,
    bounding_box_layer0: Option<IntRect>,
}

impl StatisticsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one descriptor into the running statistics.
    pub fn update(&mut self, descriptor: &SubBlockDescriptor) {
        let rect = descriptor.logical_rect;
        let layer0 = descriptor.is_layer0();

        self.bounding_box = IntRect::union_opt(self.bounding_box, &rect);
        if layer0 {
            self.bounding_box_layer0 = IntRect::union_opt(self.bounding_box_layer0, &rect);
        }

        for (dim, value) in descriptor.coordinate.iter() {
            self.dim_bounds.widen_to_include(dim, value);
        }

        if let Some(m) = descriptor.m_index {
            self.min_m_index = Some(self.min_m_index.map_or(m, |cur| cur.min(m)));
            self.max_m_index = Some(self.max_m_index.map_or(m, |cur| cur.max(m)));
        }

        if let Some(scene) = descriptor.scene() {
            let acc = self.scenes.entry(scene).or_default();
            acc.bounding_box = IntRect::union_opt(acc.bounding_box, &rect);
            if layer0 {
                acc.bounding_box_layer0 = IntRect::union_opt(acc.bounding_box_layer0, &rect);
            }
        }

        self.sub_block_count += 1;
    }

    /// Finish the pass.
    ///
    /// When `max_scene_entries` is smaller than the number of scenes observed
    /// the per-scene list is truncated to that many entries, keeping the
    /// lowest-numbered scenes; `total_scene_count` still reports the true
    /// count so the truncation is detectable.
    pub fn build(self, max_scene_entries: Option<usize>) -> SubBlockStatistics {
        let total_scene_count = self.scenes.len() as u32;
        let cap = max_scene_entries.unwrap_or(usize::MAX);

        let scene_bounding_boxes = self
            .scenes
            .into_iter()
            .take(cap)
            .map(|(scene, acc)| {
                (
                    scene,
                    SceneBoundingBoxes {
                        bounding_box: acc.bounding_box.unwrap_or_default(),
                        bounding_box_layer0: acc.bounding_box_layer0.unwrap_or_default(),
                    },
                )
            })
            .collect();

        SubBlockStatistics {
            sub_block_count: self.sub_block_count,
            min_m_index: self.min_m_index,
            max_m_index: self.max_m_index,
            bounding_box: self.bounding_box.unwrap_or_default(),
            bounding_box_layer0: self.bounding_box_layer0.unwrap_or_default(),
            scene_bounding_boxes,
            total_scene_count,
            dim_bounds: self.dim_bounds,
        }
    }
}

/// One-shot reduction over a descriptor sequence.
pub fn compute<'a, I>(sub_blocks: I, max_scene_entries: Option<usize>) -> SubBlockStatistics
where
    I: IntoIterator<Item = &'a SubBlockDescriptor>,
{
    let mut builder = StatisticsBuilder::new();
    for descriptor in sub_blocks {
        builder.update(descriptor);
    }
    builder.build(max_scene_entries)
}
