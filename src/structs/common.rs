use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::prelude::*;

/// Tag identifying the kind of a chunk. Tags outside this set are carried
/// as [`ChunkType::Unknown`] so the walkers can skip them by declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkType {
    Null,
    StringPool,
    Table,
    TablePackage,
    TableType,
    TableTypeSpec,
    Unknown(u16),
}

impl From<u16> for ChunkType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => ChunkType::Null,
            0x0001 => ChunkType::StringPool,
            0x0002 => ChunkType::Table,
            0x0200 => ChunkType::TablePackage,
            0x0201 => ChunkType::TableType,
            0x0202 => ChunkType::TableTypeSpec,
            other => ChunkType::Unknown(other),
        }
    }
}

/// Header that appears at the front of every chunk in a resource table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResChunkHeader {
    pub(crate) type_: ChunkType,

    /// Size of the chunk header in bytes; the chunk's data starts here
    pub(crate) header_size: u16,

    /// Total size of the chunk in bytes, header and child chunks included.
    /// Adding this value to the chunk's offset skips it completely.
    pub(crate) size: u32,
}

impl ResChunkHeader {
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResChunkHeader> {
        (le_u16, le_u16, le_u32)
            .map(|(type_, header_size, size)| ResChunkHeader {
                type_: ChunkType::from(type_),
                header_size,
                size,
            })
            .parse_next(input)
    }

    /// Size of this structure in bytes
    #[inline(always)]
    pub(crate) const fn size_of() -> usize {
        // 2 bytes - type_
        // 2 bytes - header_size
        // 4 bytes - size
        2 + 2 + 4
    }
}

/// Type tag of a value record. The resolver only interprets the primitive
/// tags; everything else is [`ResValueType::Raw`] and its payload goes to
/// the caller untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResValueType {
    /// No value stored for this entry
    Null,

    /// Payload is an index into the table's global string pool
    String,

    /// Payload is an integer written in decimal form
    Dec,

    /// Payload is an integer written in hexadecimal form
    Hex,

    /// Payload is 0 or 1
    Boolean,

    /// Any richer tag (references, colors, dimensions, ...)
    Raw(u8),
}

impl From<u8> for ResValueType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ResValueType::Null,
            0x03 => ResValueType::String,
            0x10 => ResValueType::Dec,
            0x11 => ResValueType::Hex,
            0x12 => ResValueType::Boolean,
            v => ResValueType::Raw(v),
        }
    }
}

/// Representation of a value in a resource, supplying type information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResValue {
    /// Number of bytes in this structure
    pub(crate) size: u16,

    /// Always set to 0
    pub(crate) res0: u8,

    /// Type of the data value
    pub(crate) data_type: ResValueType,

    /// Data itself
    pub(crate) data: u32,
}

impl ResValue {
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResValue> {
        (le_u16, le_u8, le_u8, le_u32)
            .map(|(size, res0, data_type, data)| ResValue {
                size,
                res0,
                data_type: ResValueType::from(data_type),
                data,
            })
            .parse_next(input)
    }
}
