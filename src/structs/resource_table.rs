use bitflags::bitflags;
use winnow::binary::{le_u16, le_u32, u8};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::{ResChunkHeader, ResTableConfig, ResValue, StringPool};

/// Entry-index sentinel marking a slot with no entry defined.
pub(crate) const NO_ENTRY: u32 = 0xffff_ffff;

/// Header for a resource table chunk.
#[derive(Debug)]
pub(crate) struct ResTableHeader {
    pub(crate) header: ResChunkHeader,

    /// Declared number of package chunks. Informational only; traversal
    /// is driven by chunk sizes.
    pub(crate) package_count: u32,
}

impl ResTableHeader {
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableHeader> {
        (ResChunkHeader::parse, le_u32)
            .map(|(header, package_count)| ResTableHeader {
                header,
                package_count,
            })
            .parse_next(input)
    }
}

/// Header of a package chunk. The string-pool offsets are relative to the
/// start of the package chunk itself.
#[derive(Debug)]
pub(crate) struct ResTablePackageHeader {
    pub(crate) header: ResChunkHeader,

    /// Package id; the value of the package bits in a resource identifier
    pub(crate) id: u32,

    /// Package name, decoded from its fixed 128-unit UTF-16 buffer
    pub(crate) name: String,

    /// Offset of the type-name string pool
    pub(crate) type_strings: u32,

    /// Last index into the type-name pool that is public
    pub(crate) last_public_type: u32,

    /// Offset of the key-name string pool
    pub(crate) key_strings: u32,

    /// Last index into the key-name pool that is public
    pub(crate) last_public_key: u32,
}

impl ResTablePackageHeader {
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTablePackageHeader> {
        let (header, id, name, type_strings, last_public_type, key_strings, last_public_key) = (
            ResChunkHeader::parse,
            le_u32,
            take(256usize),
            le_u32,
            le_u32,
            le_u32,
            le_u32,
        )
            .parse_next(input)?;

        Ok(ResTablePackageHeader {
            header,
            id,
            name: decode_utf16_name(name),
            type_strings,
            last_public_type,
            key_strings,
            last_public_key,
        })
    }
}

/// \0-terminated UTF-16LE buffer as used for package names.
fn decode_utf16_name(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    String::from_utf16(&units).unwrap_or_default()
}

/// Body of a type chunk header, minus the leading [`ResChunkHeader`].
#[derive(Debug)]
pub(crate) struct ResTableTypeHeader {
    /// The type identifier this chunk is holding; 0 is invalid
    pub(crate) id: u8,

    /// Must be 0
    pub(crate) res0: u8,

    /// Must be 0
    pub(crate) res1: u16,

    /// Number of 32-bit entry indices that follow the header
    pub(crate) entry_count: u32,

    /// Offset of the entries region, relative to the chunk start
    pub(crate) entries_start: u32,

    /// Configuration this collection of entries is designed for
    pub(crate) config: ResTableConfig,
}

impl ResTableTypeHeader {
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableTypeHeader> {
        let (id, res0, res1, entry_count, entries_start) =
            (u8, u8, le_u16, le_u32, le_u32).parse_next(input)?;

        let config = ResTableConfig::parse(input)?;

        Ok(ResTableTypeHeader {
            id,
            res0,
            res1,
            entry_count,
            entries_start,
            config,
        })
    }
}

/// Body of a type-spec chunk header, minus the leading [`ResChunkHeader`].
#[derive(Debug)]
pub(crate) struct ResTableTypeSpecHeader {
    pub(crate) id: u8,
    pub(crate) res0: u8,
    pub(crate) res1: u16,

    /// Number of 32-bit configuration masks that follow
    pub(crate) entry_count: u32,
}

impl ResTableTypeSpecHeader {
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableTypeSpecHeader> {
        (u8, u8, le_u16, le_u32)
            .map(|(id, res0, res1, entry_count)| ResTableTypeSpecHeader {
                id,
                res0,
                res1,
                entry_count,
            })
            .parse_next(input)
    }
}

/// The entry index table of a type chunk, and the flag bitmap of a
/// type-spec chunk: `count` consecutive 32-bit words.
pub(crate) fn parse_u32_run(count: usize, input: &mut &[u8]) -> ModalResult<Vec<u32>> {
    let mut words = Vec::with_capacity(count);
    for _ in 0..count {
        words.push(le_u32.parse_next(input)?);
    }
    Ok(words)
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct EntryFlags: u16 {
        /// Map entry holding name/value pairs instead of a single value
        const COMPLEX = 0x0001;

        /// Declared public, referencable by other packages
        const PUBLIC = 0x0002;

        /// May be overridden by strong resources of the same name and type
        const WEAK = 0x0004;
    }
}

/// On-disk entry header; a value record follows it directly.
#[derive(Debug)]
pub(crate) struct ResTableEntry {
    /// Number of bytes in this structure
    pub(crate) size: u16,

    pub(crate) flags: EntryFlags,

    /// Reference into the package's key-name pool
    pub(crate) key: u32,
}

impl ResTableEntry {
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableEntry> {
        (le_u16, le_u16, le_u32)
            .map(|(size, flags, key)| ResTableEntry {
                size,
                flags: EntryFlags::from_bits_truncate(flags),
                key,
            })
            .parse_next(input)
    }
}

/// One decoded entry slot: key reference, flags and the stored value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableEntry {
    pub(crate) key: u32,
    pub(crate) flags: EntryFlags,
    pub(crate) value: ResValue,
}

/// One configuration-specific instantiation of a type id. Slot `i` of
/// `entries` corresponds to the entry bits `i` of a resource identifier;
/// `None` marks the [`NO_ENTRY`] sentinel.
#[derive(Debug)]
pub(crate) struct TableType {
    pub(crate) id: u8,
    pub(crate) config: ResTableConfig,
    pub(crate) entries: Vec<Option<TableEntry>>,
}

/// One package worth of decoded resources.
#[derive(Debug)]
pub(crate) struct TablePackage {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) type_strings: StringPool,
    pub(crate) key_strings: StringPool,

    /// Variants in chunk-encounter order; several may share a type id,
    /// differing only in configuration
    pub(crate) types: Vec<TableType>,
}

impl TablePackage {
    /// Best matching variant of `type_id` for `requested`; the first
    /// variant found wins ties.
    pub(crate) fn best_type(
        &self,
        type_id: u8,
        requested: &ResTableConfig,
    ) -> Option<&TableType> {
        let mut best: Option<&TableType> = None;
        for candidate in &self.types {
            if candidate.id != type_id || !candidate.config.matches(requested) {
                continue;
            }
            match best {
                Some(current) if !candidate.config.is_better_than(&current.config, Some(requested)) => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}
