//! Sub-block descriptors and the repository contract the compositor consumes.
//!
//! A sub-block is one independently stored, independently compressed tile
//! plus its coordinate metadata. The repository owns the descriptors and the
//! compressed payloads; the core only ever holds descriptors by value for the
//! duration of one operation.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::bitmap::{BitonalBitmap, PixelType};
use crate::coord::{Coordinate, Dimension};
use crate::error::RepositoryError;
use crate::geometry::{IntRect, IntSize};

/// Opaque, stable identity of a sub-block within its repository.
///
/// Doubles as the cache key and as the deterministic tie-breaker for
/// eviction ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubBlockId(pub u32);

/// The read-only, per-tile unit the core consumes.
#[derive(Debug, Clone)]
pub struct SubBlockDescriptor {
    /// Stable identity within the repository
    pub id: SubBlockId,

    /// Where the sub-block sits in the sparse dimension space
    pub coordinate: Coordinate,

    /// Placement in document pixel space
    pub logical_rect: IntRect,

    /// Pixel size actually stored; smaller than `logical_rect` for reduced
    /// pyramid layers
    pub physical_size: IntSize,

    /// Disambiguates multiple sub-blocks sharing one coordinate (mosaic tiles)
    pub m_index: Option<i32>,

    /// Pixel format of the decoded bitmap
    pub pixel_type: PixelType,
}

impl SubBlockDescriptor {
    /// The zoom this sub-block is stored at: the physical/logical size ratio
    /// along the larger physical axis. Layer-0 sub-blocks have zoom 1.
    pub fn zoom(&self) -> f64 {
        if self.physical_size.w > self.physical_size.h {
            f64::from(self.physical_size.w) / f64::from(self.logical_rect.w)
        } else {
            f64::from(self.physical_size.h) / f64::from(self.logical_rect.h)
        }
    }

    /// Whether this sub-block is stored at full resolution (not a reduced
    /// pyramid layer).
    pub fn is_layer0(&self) -> bool {
        self.physical_size.w as i64 == i64::from(self.logical_rect.w)
            && self.physical_size.h as i64 == i64::from(self.logical_rect.h)
    }

    /// The scene index, if the coordinate carries one.
    pub fn scene(&self) -> Option<i32> {
        self.coordinate.get(Dimension::S)
    }
}

/// The external store of sub-blocks the core composes from.
///
/// Implementations are read-only from the core's perspective; `list` must
/// return descriptors in a stable insertion order, which the compositor uses
/// as the draw-order tie-breaker.
#[async_trait]
pub trait SubBlockRepository: Send + Sync {
    /// All descriptors whose coordinate matches `filter` (absent dimensions
    /// are wildcards) and, when `region` is given, whose logical rectangle
    /// intersects it.
    async fn list(
        &self,
        filter: &Coordinate,
        region: Option<&IntRect>,
    ) -> Result<Vec<SubBlockDescriptor>, RepositoryError>;

    /// The compressed payload of a sub-block.
    async fn fetch_payload(&self, id: SubBlockId) -> Result<Bytes, RepositoryError>;

    /// The parsed opacity-mask attachment of a sub-block, if it carries one.
    async fn fetch_mask(&self, id: SubBlockId) -> Result<Option<BitonalBitmap>, RepositoryError>;
}

/// An in-memory repository: descriptors plus payloads held in insertion
/// order.
///
/// Useful for assembling synthetic documents and as the backing store in
/// tests.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use microtile::coord::{Coordinate, Dimension};
/// use microtile::geometry::{IntRect, IntSize};
/// use microtile::bitmap::PixelType;
/// use microtile::subblock::MemoryRepository;
///
/// let mut repo = MemoryRepository::new();
/// repo.add(
///     Coordinate::from_pairs([(Dimension::C, 0)]),
///     IntRect::new(0, 0, 4, 4),
///     IntSize::new(4, 4),
///     Some(0),
///     PixelType::Gray8,
///     Bytes::from(vec![0u8; 16]),
/// );
/// ```
#[derive(Default)]
pub struct MemoryRepository {
    descriptors: Vec<SubBlockDescriptor>,
    payloads: HashMap<SubBlockId, Bytes>,
    masks: HashMap<SubBlockId, BitonalBitmap>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sub-block; identities are assigned in insertion order.
    pub fn add(
        &mut self,
        coordinate: Coordinate,
        logical_rect: IntRect,
        physical_size: IntSize,
        m_index: Option<i32>,
        pixel_type: PixelType,
        payload: Bytes,
    ) -> SubBlockId {
        let id = SubBlockId(self.descriptors.len() as u32);
        self.descriptors.push(SubBlockDescriptor {
            id,
            coordinate,
            logical_rect,
            physical_size,
            m_index,
            pixel_type,
        });
        self.payloads.insert(id, payload);
        id
    }

    /// Add a sub-block carrying an opacity-mask attachment.
    #[allow(clippy::too_many_arguments)]
    pub fn add_with_mask(
        &mut self,
        coordinate: Coordinate,
        logical_rect: IntRect,
        physical_size: IntSize,
        m_index: Option<i32>,
        pixel_type: PixelType,
        payload: Bytes,
        mask: BitonalBitmap,
    ) -> SubBlockId {
        let id = self.add(
            coordinate,
            logical_rect,
            physical_size,
            m_index,
            pixel_type,
            payload,
        );
        self.masks.insert(id, mask);
        id
    }

    /// All descriptors in insertion order.
    pub fn descriptors(&self) -> &[SubBlockDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[async_trait]
impl SubBlockRepository for MemoryRepository {
    async fn list(
        &self,
        filter: &Coordinate,
        region: Option<&IntRect>,
    ) -> Result<Vec<SubBlockDescriptor>, RepositoryError> {
        Ok(self
            .descriptors
            .iter()
            .filter(|d| d.coordinate.matches(filter))
            .filter(|d| region.map_or(true, |r| d.logical_rect.intersects(r)))
            .cloned()
            .collect())
    }

    async fn fetch_payload(&self, id: SubBlockId) -> Result<Bytes, RepositoryError> {
        self.payloads
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::SubBlockNotFound(id))
    }

    async fn fetch_mask(&self, id: SubBlockId) -> Result<Option<BitonalBitmap>, RepositoryError> {
        if !self.payloads.contains_key(&id) {
            return Err(RepositoryError::SubBlockNotFound(id));
        }
        Ok(self.masks.get(&id).cloned())
    }
}
