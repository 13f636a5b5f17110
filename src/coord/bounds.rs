use std::fmt;
use std::str::FromStr;

use super::coordinate::Scanner;
use super::dimension::Dimension;
use crate::error::CoordinateError;

/// Per-dimension half-open intervals `[start, start + size)`.
///
/// Used as a document-level summary ("this document contains C in [0,3),
/// S in [0,4)") and as the accumulator for the statistics pass.
///
/// # Example
///
/// ```
/// use microtile::coord::{DimBounds, Dimension};
///
/// let mut bounds = DimBounds::new();
/// bounds.set(Dimension::C, 0, 3);
/// assert_eq!(bounds.interval(Dimension::C), Some((0, 3)));
/// assert_eq!(bounds.to_string(), "C0:3");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DimBounds {
    valid: u32,
    start: [i32; Dimension::COUNT],
    size: [i32; Dimension::COUNT],
}

impl DimBounds {
    /// Empty bounds with no dimension present.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build bounds from `(dimension, start, size)` triples.
    pub fn from_intervals<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (Dimension, i32, i32)>,
    {
        let mut bounds = Self::new();
        for (dim, start, size) in intervals {
            bounds.set(dim, start, size);
        }
        bounds
    }

    /// Set the interval for a dimension, marking it present.
    pub fn set(&mut self, dim: Dimension, start: i32, size: i32) {
        self.start[dim.index()] = start;
        self.size[dim.index()] = size;
        self.valid |= dim.bit();
    }

    /// Get `(start, size)` for a dimension, or `None` if absent.
    pub fn interval(&self, dim: Dimension) -> Option<(i32, i32)> {
        if self.contains(dim) {
            Some((self.start[dim.index()], self.size[dim.index()]))
        } else {
            None
        }
    }

    /// Whether the dimension is present.
    #[inline]
    pub fn contains(&self, dim: Dimension) -> bool {
        self.valid & dim.bit() != 0
    }

    /// Remove a dimension.
    pub fn clear(&mut self, dim: Dimension) {
        self.valid &= !dim.bit();
        self.start[dim.index()] = 0;
        self.size[dim.index()] = 0;
    }

    /// Whether no dimension is present.
    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }

    /// Iterate present dimensions as `(dimension, start, size)` in canonical
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, i32, i32)> + '_ {
        Dimension::ALL
            .into_iter()
            .filter(|dim| self.contains(*dim))
            .map(|dim| (dim, self.start[dim.index()], self.size[dim.index()]))
    }

    /// Widen the interval of a dimension so it includes `value`, creating a
    /// size-1 interval if the dimension was absent.
    pub fn widen_to_include(&mut self, dim: Dimension, value: i32) {
        match self.interval(dim) {
            None => self.set(dim, value, 1),
            Some((start, size)) => {
                if value < start {
                    self.set(dim, value, size + (start - value));
                } else if value >= start + size {
                    self.set(dim, start, 1 + value - start);
                }
            }
        }
    }

    /// Whether `value` lies within the dimension's interval. A dimension that
    /// is absent contains nothing.
    pub fn contains_value(&self, dim: Dimension, value: i32) -> bool {
        match self.interval(dim) {
            Some((start, size)) => value >= start && value < start + size,
            None => false,
        }
    }
}

impl PartialEq for DimBounds {
    fn eq(&self, other: &Self) -> bool {
        self.valid == other.valid
            && Dimension::ALL
                .into_iter()
                .filter(|dim| self.contains(*dim))
                .all(|dim| self.interval(dim) == other.interval(dim))
    }
}

impl Eq for DimBounds {}

impl fmt::Display for DimBounds {
    /// Writes each present dimension as `<letter><start>:<size>` in canonical
    /// order, e.g. `"C0:3T0:10"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (dim, start, size) in self.iter() {
            write!(f, "{}{}:{}", dim.to_char(), start, size)?;
        }
        Ok(())
    }
}

impl FromStr for DimBounds {
    type Err = CoordinateError;

    /// Parse the compact letter form, e.g. `"T0:10"` or `"C0:2T0:10Z0:5"`.
    ///
    /// A zero size or a repeated dimension is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bounds = DimBounds::new();
        let mut scanner = Scanner::new(s);

        scanner.skip_separators();
        while !scanner.at_end() {
            let (dim, dim_char) = scanner.read_dimension()?;
            if bounds.contains(dim) {
                return Err(CoordinateError::DuplicateDimension(dim_char));
            }
            let start = scanner.read_value()?;
            scanner.expect(b':')?;
            let size = scanner.read_value()?;
            if size == 0 {
                return Err(CoordinateError::EmptyInterval(dim_char));
            }
            bounds.set(dim, start, size);
            scanner.skip_separators();
        }

        Ok(bounds)
    }
}
