use bitflags::bitflags;
use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::ResChunkHeader;

bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct StringPoolFlags: u32 {
        /// Strings are sorted by value
        const SORTED = 1 << 0;

        /// Strings are UTF-8 encoded instead of UTF-16
        const UTF8 = 1 << 8;
    }
}

/// Decoded string-pool chunk.
///
/// The table decoder only relies on indexed lookup; the wire encoding
/// (offset table, UTF-8/UTF-16 payloads, length prefixes) stays private
/// to this module.
#[derive(Debug, Default)]
pub(crate) struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    /// Parse one pool chunk. `input` must start at the chunk header; on
    /// success the stream is left just behind the chunk.
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<StringPool> {
        let chunk = *input;

        let header = ResChunkHeader::parse(input)?;
        let (string_count, _style_count, flags, strings_start, _styles_start) =
            (le_u32, le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        let flags = StringPoolFlags::from_bits_truncate(flags);
        let utf8 = flags.contains(StringPoolFlags::UTF8);

        let mut offsets = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            offsets.push(le_u32.parse_next(input)?);
        }

        // string data is addressed relative to the chunk start, not the
        // current stream position
        let data = chunk
            .get(strings_start as usize..header.size as usize)
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;

        let mut strings = Vec::with_capacity(string_count as usize);
        for &offset in &offsets {
            let mut slice = data
                .get(offset as usize..)
                .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
            strings.push(Self::parse_string(&mut slice, utf8)?);
        }

        // leave the stream behind the chunk for callers parsing pools
        // back to back
        *input = chunk.get(header.size as usize..).unwrap_or_default();

        Ok(StringPool { strings })
    }

    fn parse_string(input: &mut &[u8], utf8: bool) -> ModalResult<String> {
        if utf8 {
            // two length prefixes: character count, then byte count
            let _ = Self::utf8_len(input)?;
            let byte_len = Self::utf8_len(input)?;

            let content = take(byte_len).parse_next(input)?;
            Ok(String::from_utf8_lossy(content).into_owned())
        } else {
            let len = Self::utf16_len(input)?;

            let content = take(len * 2).parse_next(input)?;
            let units = content
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]));

            Ok(char::decode_utf16(units)
                .collect::<Result<String, _>>()
                .unwrap_or_default())
        }
    }

    /// One or two length bytes; the high bit of the first extends it
    fn utf8_len(input: &mut &[u8]) -> ModalResult<usize> {
        let first = le_u8.parse_next(input)?;
        if first & 0x80 != 0 {
            let second = le_u8.parse_next(input)?;
            Ok((((first & 0x7f) as usize) << 8) | second as usize)
        } else {
            Ok(first as usize)
        }
    }

    /// One or two length words; the high bit of the first extends it
    fn utf16_len(input: &mut &[u8]) -> ModalResult<usize> {
        let first = le_u16.parse_next(input)?;
        if first & 0x8000 != 0 {
            let second = le_u16.parse_next(input)?;
            Ok((((first & 0x7fff) as usize) << 16) | second as usize)
        } else {
            Ok(first as usize)
        }
    }

    #[inline]
    pub(crate) fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }
}

/// Build an UTF-8 encoded pool chunk for fixtures.
#[cfg(test)]
pub(crate) fn build_utf8_pool(strings: &[&str]) -> Vec<u8> {
    let mut offsets = Vec::with_capacity(strings.len());
    let mut data = Vec::new();
    for s in strings {
        offsets.push(data.len() as u32);
        data.push(s.chars().count() as u8);
        data.push(s.len() as u8);
        data.extend_from_slice(s.as_bytes());
        data.push(0);
    }

    let strings_start = 28 + 4 * strings.len() as u32;
    let size = strings_start + data.len() as u32;

    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&0x0001u16.to_le_bytes());
    out.extend_from_slice(&28u16.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(1u32 << 8).to_le_bytes());
    out.extend_from_slice(&strings_start.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&data);
    out
}

/// Build an UTF-16 encoded pool chunk for fixtures.
#[cfg(test)]
pub(crate) fn build_utf16_pool(strings: &[&str]) -> Vec<u8> {
    let mut offsets = Vec::with_capacity(strings.len());
    let mut data = Vec::new();
    for s in strings {
        offsets.push(data.len() as u32);
        let units: Vec<u16> = s.encode_utf16().collect();
        data.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for unit in &units {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }

    let strings_start = 28 + 4 * strings.len() as u32;
    let size = strings_start + data.len() as u32;

    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&0x0001u16.to_le_bytes());
    out.extend_from_slice(&28u16.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&strings_start.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&data);
    out
}
