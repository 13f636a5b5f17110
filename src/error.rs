use thiserror::Error;

use crate::bitmap::PixelType;
use crate::subblock::SubBlockId;

/// Errors produced when constructing or parsing coordinates and dimension bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    /// The character does not identify any of the fixed dimensions
    #[error("Invalid dimension: '{0}' is not one of Z, C, T, R, S, I, H, V, B")]
    InvalidDimension(char),

    /// The same dimension was given more than once in one string
    #[error("Duplicate dimension: '{0}' appears more than once")]
    DuplicateDimension(char),

    /// The string could not be parsed
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A bounds interval was given with size zero
    #[error("Invalid interval for dimension '{0}': size must be non-zero")]
    EmptyInterval(char),
}

/// Errors reported by a decode-service implementation.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The compressed payload could not be decoded
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// The decoder does not support producing the requested pixel type
    #[error("Unsupported pixel type: {0:?}")]
    UnsupportedPixelType(PixelType),

    /// The decoded bitmap does not have the declared physical size
    #[error("Decoded size mismatch: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },
}

/// Errors reported by a sub-block repository implementation.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// No sub-block with the given identity exists
    #[error("Sub-block not found: {0:?}")]
    SubBlockNotFound(SubBlockId),

    /// The backing store failed to deliver the payload
    #[error("Repository I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by the tile compositor.
///
/// All composition errors are synchronous and final: nothing is retried
/// internally, and no partial bitmap is ever returned.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// No sub-block matched the request and the caller did not opt into an
    /// all-background result (see `AccessorOptions::allow_empty`)
    #[error("No sub-block matches the requested plane and region")]
    NoMatchingData,

    /// Contributing sub-blocks must all share one pixel type
    #[error("Pixel type mismatch: sub-block {id:?} has {actual:?}, expected {expected:?}")]
    PixelTypeMismatch {
        id: SubBlockId,
        expected: PixelType,
        actual: PixelType,
    },

    /// The region of interest or zoom factor is unusable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A required sub-block failed to decode; the whole request is aborted
    #[error("Decode failure: {0}")]
    Decode(#[from] CodecError),

    /// The repository failed to list or deliver a sub-block
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
