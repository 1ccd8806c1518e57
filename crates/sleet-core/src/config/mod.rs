//! Common configuration helpers.

mod vars;

pub use vars::{interpolate, interpolate_with};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Smallest part size S3 accepts for every part except the last.
pub const S3_MIN_PART_SIZE: usize = 5 * MB;

/// Largest part size S3 accepts.
pub const MAX_PART_SIZE: usize = 5 * 1024 * MB;
