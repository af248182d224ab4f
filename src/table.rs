//! Chunk-walking decoder for compiled resource tables, and the
//! configuration-aware resolver over the decoded model.
//!
//! The decoder makes exactly one pass over the byte slice; [`Table`] is
//! immutable afterwards, so resolution needs no synchronization and never
//! touches the input bytes again.

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};

use crate::errors::{DecodeError, ResolveError};
use crate::structs::{
    ChunkType, NO_ENTRY, ResChunkHeader, ResTableConfig, ResTableEntry, ResTableHeader,
    ResTablePackageHeader, ResTableTypeHeader, ResTableTypeSpecHeader, ResValue, ResValueType,
    StringPool, TableEntry, TablePackage, TableType, parse_u32_run,
};

/// 32-bit resource identifier: package id in bits 24..32, type id in bits
/// 16..24, entry index in bits 0..16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

impl ResourceId {
    #[inline]
    pub fn package_id(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub fn type_id(self) -> u8 {
        ((self.0 >> 16) & 0xff) as u8
    }

    #[inline]
    pub fn entry_index(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        ResourceId(value)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// A value resolved for a concrete resource id and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceValue {
    /// The entry exists but stores no value
    Null,

    /// Resolved through the table's global string pool
    String(String),

    /// Integer stored in decimal form
    Dec(i32),

    /// Integer stored in hexadecimal form
    Hex(u32),

    Boolean(bool),

    /// Payload of any richer tag, handed over uninterpreted
    Raw(u32),
}

/// Fully decoded resource table.
#[derive(Debug)]
pub struct Table {
    string_pool: StringPool,
    packages: HashMap<u8, TablePackage>,
}

impl Table {
    /// Decode a complete resource table image.
    pub fn parse(data: &[u8]) -> Result<Table, DecodeError> {
        let mut input = data;
        let header = ResTableHeader::parse(&mut input).map_err(|_| DecodeError::TooSmall)?;

        if header.header.type_ != ChunkType::Table {
            warn!(
                "table chunk tagged {:?}, continuing anyway",
                header.header.type_
            );
        }

        let mut string_pool = StringPool::default();
        let mut packages = HashMap::new();

        let total = header.header.size as usize;
        let mut offset = header.header.header_size as usize;
        while offset < total {
            let (chunk_header, chunk) = chunk_at(data, offset)?;
            match chunk_header.type_ {
                ChunkType::StringPool => {
                    // last pool wins; more than one is unexpected but harmless
                    string_pool =
                        StringPool::parse(&mut &chunk[..]).map_err(|_| DecodeError::StringPool)?;
                }
                ChunkType::TablePackage => {
                    let package = parse_package(chunk)?;
                    debug!(
                        "package {:#04x} {:?}: {} type chunks",
                        package.id,
                        package.name,
                        package.types.len()
                    );
                    packages.insert(package.id as u8, package);
                }
                other => {
                    debug!(
                        "skipping {:?} chunk ({} bytes) at offset {:#x}",
                        other, chunk_header.size, offset
                    );
                }
            }
            offset += chunk_header.size as usize;
        }

        if packages.len() as u32 != header.package_count {
            warn!(
                "table declares {} packages, decoded {}",
                header.package_count,
                packages.len()
            );
        }

        Ok(Table {
            string_pool,
            packages,
        })
    }

    /// Resolve `id` against `requested`, replicating the platform's
    /// qualifier selection: the best matching variant of the addressed
    /// type supplies the entry, whose value is then decoded by tag.
    pub fn resolve(
        &self,
        id: ResourceId,
        requested: &ResTableConfig,
    ) -> Result<ResourceValue, ResolveError> {
        let package = self
            .packages
            .get(&id.package_id())
            .ok_or(ResolveError::UnknownPackage(id.package_id()))?;

        let variant = package
            .best_type(id.type_id(), requested)
            .ok_or(ResolveError::UnknownType(id.type_id()))?;

        let entry = variant
            .entries
            .get(id.entry_index() as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(ResolveError::UnknownEntry(id.entry_index()))?;

        debug!(
            "resource {} ({:?}/{:?}) served by variant {:?}",
            id,
            package
                .type_strings
                .get(u32::from(id.type_id().saturating_sub(1))),
            package.key_strings.get(entry.key),
            variant.config.to_string()
        );

        let value = entry.value;
        Ok(match value.data_type {
            ResValueType::Null => ResourceValue::Null,
            ResValueType::String => ResourceValue::String(self.string(value.data)),
            ResValueType::Dec => ResourceValue::Dec(value.data as i32),
            ResValueType::Hex => ResourceValue::Hex(value.data),
            ResValueType::Boolean => ResourceValue::Boolean(value.data != 0),
            ResValueType::Raw(_) => ResourceValue::Raw(value.data),
        })
    }

    /// Look up an index in the table's global string pool; misses resolve
    /// to an empty string.
    pub fn string(&self, index: u32) -> String {
        self.string_pool
            .get(index)
            .map(str::to_owned)
            .unwrap_or_default()
    }
}

/// Read the chunk header at `offset` and return it together with the
/// chunk's own byte span. Guards the walk against truncated headers,
/// overlong chunks and sizes that would not advance the offset.
fn chunk_at(data: &[u8], offset: usize) -> Result<(ResChunkHeader, &[u8]), DecodeError> {
    let mut input = data.get(offset..).ok_or(DecodeError::ChunkHeader(offset))?;
    let header =
        ResChunkHeader::parse(&mut input).map_err(|_| DecodeError::ChunkHeader(offset))?;

    let size = header.size as usize;
    if size < ResChunkHeader::size_of() {
        return Err(DecodeError::StuckChunk(offset));
    }
    let end = offset
        .checked_add(size)
        .ok_or(DecodeError::ChunkBounds(offset))?;
    let chunk = data
        .get(offset..end)
        .ok_or(DecodeError::ChunkBounds(offset))?;

    Ok((header, chunk))
}

/// Decode one package chunk: its header, both name pools and every nested
/// type chunk, walking nested chunks exactly like the root walk.
fn parse_package(chunk: &[u8]) -> Result<TablePackage, DecodeError> {
    let mut input = chunk;
    let header = ResTablePackageHeader::parse(&mut input).map_err(|_| DecodeError::Package)?;

    // both pools are addressed relative to the package chunk start
    let mut type_input = chunk
        .get(header.type_strings as usize..)
        .ok_or(DecodeError::StringPool)?;
    let type_strings = StringPool::parse(&mut type_input).map_err(|_| DecodeError::StringPool)?;

    let mut key_input = chunk
        .get(header.key_strings as usize..)
        .ok_or(DecodeError::StringPool)?;
    let key_strings = StringPool::parse(&mut key_input).map_err(|_| DecodeError::StringPool)?;

    let mut types = Vec::new();
    let mut offset = header.header.header_size as usize;
    while offset < chunk.len() {
        let (chunk_header, nested) = chunk_at(chunk, offset)?;
        match chunk_header.type_ {
            ChunkType::TableType => types.push(parse_type(&chunk_header, nested)?),
            ChunkType::TableTypeSpec => validate_type_spec(&chunk_header, nested)?,
            other => {
                debug!(
                    "skipping {:?} chunk inside package {:#04x}",
                    other, header.id
                );
            }
        }
        offset += chunk_header.size as usize;
    }

    Ok(TablePackage {
        id: header.id,
        name: header.name,
        type_strings,
        key_strings,
        types,
    })
}

/// Decode one type chunk into its sparse entry array. Slot `i` of the
/// result answers for entry index `i` of a resource identifier.
fn parse_type(chunk_header: &ResChunkHeader, chunk: &[u8]) -> Result<TableType, DecodeError> {
    let mut input = chunk
        .get(ResChunkHeader::size_of()..)
        .ok_or(DecodeError::Type)?;
    let header = ResTableTypeHeader::parse(&mut input).map_err(|_| DecodeError::Type)?;

    // the entry index table sits at the declared header size, not at
    // wherever the config record happened to end
    let mut index_input = chunk
        .get(chunk_header.header_size as usize..)
        .ok_or(DecodeError::Type)?;
    let offsets = parse_u32_run(header.entry_count as usize, &mut index_input)
        .map_err(|_| DecodeError::Type)?;

    let mut entries = Vec::with_capacity(header.entry_count as usize);
    for &entry_offset in &offsets {
        if entry_offset == NO_ENTRY {
            entries.push(None);
            continue;
        }

        let at = header.entries_start as usize + entry_offset as usize;
        let mut entry_input = chunk.get(at..).ok_or(DecodeError::Type)?;
        let entry = ResTableEntry::parse(&mut entry_input).map_err(|_| DecodeError::Type)?;
        let value = ResValue::parse(&mut entry_input).map_err(|_| DecodeError::Type)?;

        entries.push(Some(TableEntry {
            key: entry.key,
            flags: entry.flags,
            value,
        }));
    }

    Ok(TableType {
        id: header.id,
        config: header.config,
        entries,
    })
}

/// Type-spec chunks get framing validation only; their per-entry
/// configuration bitmap carries nothing the resolver consults.
fn validate_type_spec(chunk_header: &ResChunkHeader, chunk: &[u8]) -> Result<(), DecodeError> {
    let mut input = chunk
        .get(ResChunkHeader::size_of()..)
        .ok_or(DecodeError::TypeSpec)?;
    let header = ResTableTypeSpecHeader::parse(&mut input).map_err(|_| DecodeError::TypeSpec)?;

    let mut bitmap_input = chunk
        .get(chunk_header.header_size as usize..)
        .ok_or(DecodeError::TypeSpec)?;
    parse_u32_run(header.entry_count as usize, &mut bitmap_input)
        .map_err(|_| DecodeError::TypeSpec)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::res_string_pool::build_utf8_pool;
    use crate::structs::res_table_config::build_config_record;

    const TAG_NULL: u8 = 0x00;
    const TAG_STRING: u8 = 0x03;
    const TAG_DEC: u8 = 0x10;
    const TAG_HEX: u8 = 0x11;
    const TAG_BOOLEAN: u8 = 0x12;
    const TAG_COLOR: u8 = 0x1c;

    /// Entry slot for fixtures: key reference, value tag, payload.
    type Slot = Option<(u32, u8, u32)>;

    fn type_chunk(id: u8, config: &ResTableConfig, slots: &[Slot]) -> Vec<u8> {
        let header_size = 8 + 12 + 28u16;
        let entries_start = header_size as u32 + 4 * slots.len() as u32;

        let mut index = Vec::new();
        let mut entries = Vec::new();
        for slot in slots {
            match slot {
                None => index.extend_from_slice(&NO_ENTRY.to_le_bytes()),
                Some((key, tag, payload)) => {
                    index.extend_from_slice(&(entries.len() as u32).to_le_bytes());
                    entries.extend_from_slice(&8u16.to_le_bytes());
                    entries.extend_from_slice(&0u16.to_le_bytes());
                    entries.extend_from_slice(&key.to_le_bytes());
                    entries.extend_from_slice(&8u16.to_le_bytes());
                    entries.push(0);
                    entries.push(*tag);
                    entries.extend_from_slice(&payload.to_le_bytes());
                }
            }
        }

        let size = entries_start + entries.len() as u32;
        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&0x0201u16.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.push(id);
        out.push(0);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&(slots.len() as u32).to_le_bytes());
        out.extend_from_slice(&entries_start.to_le_bytes());
        out.extend_from_slice(&build_config_record(config));
        out.extend_from_slice(&index);
        out.extend_from_slice(&entries);
        out
    }

    fn type_spec_chunk(id: u8, entry_count: u32) -> Vec<u8> {
        let size = 16 + 4 * entry_count;
        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&0x0202u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.push(id);
        out.push(0);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&entry_count.to_le_bytes());
        for _ in 0..entry_count {
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        out
    }

    /// A chunk with a tag this decoder does not know.
    fn alien_chunk(tag: u16, body: usize) -> Vec<u8> {
        let size = 8 + body as u32;
        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&vec![0xa5; body]);
        out
    }

    fn package_chunk(
        id: u32,
        name: &str,
        type_names: &[&str],
        key_names: &[&str],
        children: &[Vec<u8>],
    ) -> Vec<u8> {
        let header_size = 8 + 4 + 256 + 16u16;
        let type_pool = build_utf8_pool(type_names);
        let key_pool = build_utf8_pool(key_names);

        let type_strings = header_size as u32;
        let key_strings = type_strings + type_pool.len() as u32;

        let children_len: usize = children.iter().map(Vec::len).sum();
        let size = key_strings + key_pool.len() as u32 + children_len as u32;

        let mut name_buffer = [0u8; 256];
        for (i, unit) in name.encode_utf16().take(127).enumerate() {
            name_buffer[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }

        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&0x0200u16.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&name_buffer);
        out.extend_from_slice(&type_strings.to_le_bytes());
        out.extend_from_slice(&(type_names.len() as u32).to_le_bytes());
        out.extend_from_slice(&key_strings.to_le_bytes());
        out.extend_from_slice(&(key_names.len() as u32).to_le_bytes());
        out.extend_from_slice(&type_pool);
        out.extend_from_slice(&key_pool);
        for child in children {
            out.extend_from_slice(child);
        }
        out
    }

    fn table_bytes(global: &[&str], chunks: &[Vec<u8>]) -> Vec<u8> {
        let pool = build_utf8_pool(global);
        let chunks_len: usize = chunks.iter().map(Vec::len).sum();
        let size = 12 + pool.len() as u32 + chunks_len as u32;
        let package_count = chunks
            .iter()
            .filter(|c| c[0] == 0x00 && c[1] == 0x02)
            .count() as u32;

        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&0x0002u16.to_le_bytes());
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&package_count.to_le_bytes());
        out.extend_from_slice(&pool);
        for chunk in chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    fn lang(code: &[u8; 2]) -> ResTableConfig {
        ResTableConfig {
            language: *code,
            ..ResTableConfig::default()
        }
    }

    fn sdk(version: u16) -> ResTableConfig {
        ResTableConfig {
            sdk_version: version,
            ..ResTableConfig::default()
        }
    }

    fn hello_table() -> Vec<u8> {
        let default = ResTableConfig::default();
        let strings = type_chunk(
            1,
            &default,
            &[Some((0, TAG_STRING, 0)), None],
        );
        let package = package_chunk(
            1,
            "com.example.app",
            &["string"],
            &["hello", "missing"],
            &[type_spec_chunk(1, 2), strings],
        );
        table_bytes(&["hello"], &[package])
    }

    #[test]
    fn resource_id_split() {
        let id = ResourceId::from(0x7f02_0031);
        assert_eq!(id.package_id(), 0x7f);
        assert_eq!(id.type_id(), 0x02);
        assert_eq!(id.entry_index(), 0x31);
        assert_eq!(id.to_string(), "0x7f020031");
    }

    #[test]
    fn resolves_a_string_entry() {
        let table = Table::parse(&hello_table()).unwrap();
        let value = table
            .resolve(ResourceId(0x0101_0000), &ResTableConfig::default())
            .unwrap();
        assert_eq!(value, ResourceValue::String("hello".to_owned()));
    }

    #[test]
    fn sentinel_slot_is_an_unknown_entry() {
        let table = Table::parse(&hello_table()).unwrap();
        assert_eq!(
            table.resolve(ResourceId(0x0101_0001), &ResTableConfig::default()),
            Err(ResolveError::UnknownEntry(1))
        );
    }

    #[test]
    fn out_of_range_entry_is_an_unknown_entry() {
        let table = Table::parse(&hello_table()).unwrap();
        assert_eq!(
            table.resolve(ResourceId(0x0101_0007), &ResTableConfig::default()),
            Err(ResolveError::UnknownEntry(7))
        );
    }

    #[test]
    fn missing_package_and_type_are_reported() {
        let table = Table::parse(&hello_table()).unwrap();
        assert_eq!(
            table.resolve(ResourceId(0x0201_0000), &ResTableConfig::default()),
            Err(ResolveError::UnknownPackage(2))
        );
        assert_eq!(
            table.resolve(ResourceId(0x0102_0000), &ResTableConfig::default()),
            Err(ResolveError::UnknownType(2))
        );
    }

    #[test]
    fn locale_variants_pick_the_qualified_value() {
        let default = type_chunk(1, &ResTableConfig::default(), &[Some((0, TAG_STRING, 0))]);
        let french = type_chunk(1, &lang(b"fr"), &[Some((0, TAG_STRING, 1))]);
        let package = package_chunk(
            1,
            "com.example.app",
            &["string"],
            &["greeting"],
            &[type_spec_chunk(1, 1), default, french],
        );
        let table = Table::parse(&table_bytes(&["hello", "bonjour"], &[package])).unwrap();

        let id = ResourceId(0x0101_0000);
        assert_eq!(
            table.resolve(id, &lang(b"fr")).unwrap(),
            ResourceValue::String("bonjour".to_owned())
        );
        // no candidate speaks English; only the unqualified variant matches
        assert_eq!(
            table.resolve(id, &lang(b"en")).unwrap(),
            ResourceValue::String("hello".to_owned())
        );
        assert_eq!(
            table.resolve(id, &ResTableConfig::default()).unwrap(),
            ResourceValue::String("hello".to_owned())
        );
    }

    #[test]
    fn sdk_variants_pick_the_newest_not_exceeding_the_request() {
        let v1 = type_chunk(1, &ResTableConfig::default(), &[Some((0, TAG_DEC, 1))]);
        let v4 = type_chunk(1, &sdk(4), &[Some((0, TAG_DEC, 4))]);
        let v7 = type_chunk(1, &sdk(7), &[Some((0, TAG_DEC, 7))]);
        let package = package_chunk(
            1,
            "com.example.app",
            &["integer"],
            &["depth"],
            &[type_spec_chunk(1, 1), v1, v4, v7],
        );
        let table = Table::parse(&table_bytes(&[], &[package])).unwrap();

        let id = ResourceId(0x0101_0000);
        assert_eq!(table.resolve(id, &sdk(8)).unwrap(), ResourceValue::Dec(7));
        assert_eq!(table.resolve(id, &sdk(4)).unwrap(), ResourceValue::Dec(4));
        assert_eq!(table.resolve(id, &sdk(3)).unwrap(), ResourceValue::Dec(1));
    }

    #[test]
    fn value_tags_decode_by_kind() {
        let slots: &[Slot] = &[
            Some((0, TAG_NULL, 0)),
            Some((1, TAG_DEC, 0xffff_ffff)),
            Some((2, TAG_HEX, 0xcafe_babe)),
            Some((3, TAG_BOOLEAN, 1)),
            Some((4, TAG_BOOLEAN, 0)),
            Some((5, TAG_COLOR, 0x00ff_00ff)),
        ];
        let chunk = type_chunk(1, &ResTableConfig::default(), slots);
        let package = package_chunk(
            1,
            "com.example.app",
            &["misc"],
            &["a", "b", "c", "d", "e", "f"],
            &[type_spec_chunk(1, 6), chunk],
        );
        let table = Table::parse(&table_bytes(&[], &[package])).unwrap();

        let resolve = |entry: u32| {
            table
                .resolve(ResourceId(0x0101_0000 | entry), &ResTableConfig::default())
                .unwrap()
        };
        assert_eq!(resolve(0), ResourceValue::Null);
        assert_eq!(resolve(1), ResourceValue::Dec(-1));
        assert_eq!(resolve(2), ResourceValue::Hex(0xcafe_babe));
        assert_eq!(resolve(3), ResourceValue::Boolean(true));
        assert_eq!(resolve(4), ResourceValue::Boolean(false));
        assert_eq!(resolve(5), ResourceValue::Raw(0x00ff_00ff));
    }

    #[test]
    fn alien_chunks_are_skipped_by_declared_size() {
        let strings = type_chunk(1, &ResTableConfig::default(), &[Some((0, TAG_STRING, 0))]);
        let package = package_chunk(
            1,
            "com.example.app",
            &["string"],
            &["hello"],
            &[
                type_spec_chunk(1, 1),
                alien_chunk(0x0777, 24),
                strings,
            ],
        );
        let table = Table::parse(&table_bytes(
            &["hello"],
            &[alien_chunk(0x0666, 13), package],
        ))
        .unwrap();

        assert_eq!(
            table
                .resolve(ResourceId(0x0101_0000), &ResTableConfig::default())
                .unwrap(),
            ResourceValue::String("hello".to_owned())
        );
    }

    #[test]
    fn non_advancing_chunk_is_fatal() {
        let mut bytes = table_bytes(&["hello"], &[]);
        // an 8-byte header declaring a zero total size
        bytes.extend_from_slice(&[0x66, 0x06, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let offset = bytes.len() - 8;
        let total_len = bytes.len() as u32;
        bytes[4..8].copy_from_slice(&total_len.to_le_bytes());

        match Table::parse(&bytes) {
            Err(DecodeError::StuckChunk(at)) => assert_eq!(at, offset),
            other => panic!("expected a stuck-chunk error, got {other:?}"),
        }
    }

    #[test]
    fn truncated_package_is_fatal() {
        let bytes = hello_table();
        assert!(Table::parse(&bytes[..bytes.len() - 10]).is_err());
    }

    #[test]
    fn decode_is_deterministic() {
        let bytes = hello_table();
        let first = Table::parse(&bytes).unwrap();
        let second = Table::parse(&bytes).unwrap();

        let configs = [ResTableConfig::default(), lang(b"fr"), sdk(30)];
        for raw in [0x0101_0000u32, 0x0101_0001, 0x0102_0000, 0x0201_0000] {
            for config in &configs {
                assert_eq!(
                    first.resolve(ResourceId(raw), config),
                    second.resolve(ResourceId(raw), config)
                );
            }
        }
    }

    #[test]
    fn global_string_lookup() {
        let table = Table::parse(&hello_table()).unwrap();
        assert_eq!(table.string(0), "hello");
        assert_eq!(table.string(99), "");
    }
}
