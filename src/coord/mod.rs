//! Sparse named-dimension coordinates and bounds.
//!
//! A mosaic document positions every sub-block in a sparse coordinate space of
//! named axes (channel, time-point, z-plane, scene, ...). A [`Coordinate`] is
//! a partial assignment of integer values to those axes; dimensions that are
//! not assigned are "don't care" and act as wildcards when filtering.
//! [`DimBounds`] describes, per dimension, the half-open interval
//! `[start, start + size)` a document covers.
//!
//! Both types serialize to the compact letter form used throughout the
//! ecosystem (`"C0T1"` for a coordinate, `"C0:3T0:10"` for bounds) and parse
//! it back, round-tripping any combination of present dimensions.

mod bounds;
mod coordinate;
mod dimension;

pub use bounds::DimBounds;
pub use coordinate::Coordinate;
pub use dimension::Dimension;
