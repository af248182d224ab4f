use thiserror::Error;

/// Structural failures while decoding a resource table.
///
/// Always fatal to the smallest enclosing decode unit: a broken type chunk
/// fails its package, a broken package fails the whole table. Unknown chunk
/// tags are not errors; they are skipped by their declared size.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Input shorter than the table header
    #[error("input too small for a resource table")]
    TooSmall,

    /// Chunk header could not be fully read
    #[error("malformed chunk header at offset {0:#x}")]
    ChunkHeader(usize),

    /// Declared chunk size would not advance the walk
    #[error("chunk at offset {0:#x} declares a non-advancing size")]
    StuckChunk(usize),

    /// Declared chunk size overruns the enclosing byte span
    #[error("chunk at offset {0:#x} overruns its container")]
    ChunkBounds(usize),

    /// Got error while parsing a string pool
    #[error("got error while parsing string pool")]
    StringPool,

    /// Got error while parsing a package chunk
    #[error("got error while parsing package chunk")]
    Package,

    /// Got error while parsing a type chunk
    #[error("got error while parsing type chunk")]
    Type,

    /// Got error while parsing a type spec chunk
    #[error("got error while parsing type spec chunk")]
    TypeSpec,
}

/// Semantic lookup failures reported by [`crate::Table::resolve`].
///
/// These distinguish "resource absent for this id/configuration" from a
/// corrupt table; they are ordinary recoverable values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// No package carries the id's package bits
    #[error("unknown package {0:#04x}")]
    UnknownPackage(u8),

    /// No type variant matches the requested configuration
    #[error("no matching variant of type {0:#04x}")]
    UnknownType(u8),

    /// Entry index out of range, or the slot holds the no-entry sentinel
    #[error("unknown entry {0:#06x}")]
    UnknownEntry(u16),
}
