//! Error types, one enum per failure family.
//!
//! Structural errors ([`CodecError`], [`RegionError`], [`ContainerError`])
//! never escape the processing of a single node; [`UsageError`] and
//! [`PathError`] abort a batch run before any node is touched.

use thiserror::Error;

use crate::Tag;

/// Alias for a `Result` with the error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while reading or writing the NBT wire format.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The input ended before the document did.
    #[error("unexpected end of input")]
    EndOfFile,

    /// A byte outside 0-12 where a tag kind was expected.
    #[error("invalid NBT tag type: {0:#04x}")]
    InvalidTagType(u8),

    /// A list declared a negative element count.
    #[error("invalid list length: {0}")]
    InvalidListLength(i32),

    /// Nesting deeper than the parser is willing to recurse.
    #[error("nesting depth exceeds {0}")]
    DepthLimit(usize),

    /// A document whose root tag is not a compound, where one is required.
    #[error("root tag must be a compound, got {0}")]
    RootNotCompound(Tag),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of an in-memory container edit.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Duplicate member name in a named container. Recovered locally by
    /// unique-name generation on the paste path; surfaced otherwise.
    #[error("tag name {0:?} is already in use")]
    NameConflict(String),

    /// A list only accepts elements of its established kind.
    #[error("list of {expected} cannot accept {actual}")]
    KindMismatch { expected: Tag, actual: Tag },
}

/// Failures of the region-file chunk store.
#[derive(Error, Debug)]
pub enum RegionError {
    #[error("region file too small to hold a header: {0} bytes")]
    TruncatedHeader(u64),

    #[error("chunk coordinate ({x}, {z}) out of range")]
    CoordOutOfRange { x: i32, z: i32 },

    #[error("chunk ({x}, {z}) is not present")]
    MissingChunk { x: i32, z: i32 },

    #[error("chunk ({x}, {z}) record is malformed")]
    MalformedChunk { x: i32, z: i32 },

    #[error("chunk ({x}, {z}) exceeds the maximum sector allocation")]
    ChunkTooLarge { x: i32, z: i32 },

    #[error("unsupported chunk compression scheme: {0}")]
    UnsupportedScheme(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A path pattern that cannot be anchored to the filesystem.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("empty path pattern")]
    EmptyPattern,

    #[error("path {0:?} does not resolve to an openable file or directory")]
    UnresolvedRoot(String),
}

/// Malformed top-level options for the selected command. Aborts the whole
/// run before any node's `process` is invoked.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct UsageError(pub String);

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    /// An operation precondition failed while processing one node.
    #[error("{0}")]
    Apply(&'static str),

    /// A value string that does not parse as the target tag kind.
    #[error("cannot parse {input:?} as {tag}")]
    ValueParse { tag: Tag, input: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
