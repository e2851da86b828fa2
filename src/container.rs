//! LIST and DICT codec (§4.5), the only recursive part of the wire format.
//!
//! Both container kinds share one rule for skipping over an already-decoded
//! element without re-parsing it (the "element-advance rule", §4.5): fixed
//! kinds advance by `FIXED_TRAILER[kind] + 1` bytes; variable kinds read a
//! `u32` length at the element's offset 4 and advance by that plus 8,
//! rounded up to 8.

use byteorder::{ByteOrder, LittleEndian};
use indexmap::IndexMap;

use crate::constants::{self, pad8};
use crate::error::DecodeError;
use crate::frame::FrameBackend;
use crate::framer::write_len;
use crate::value::{Dict, Value};

/// Encode a LIST (§4.5): 4-byte code, 4-byte payload length, 8-byte element
/// count, then each element encoded in place with its own padding.
pub fn encode_list(
    buf: &mut Vec<u8>,
    items: &[Value],
    backend: &dyn FrameBackend,
    compress: bool,
) -> Result<(), DecodeError> {
    let start = buf.len();
    buf.extend_from_slice(&[constants::LIST, 0, 0, 0]);
    buf.extend_from_slice(&[0u8; 4]); // payload length, back-patched
    let mut count_bytes = [0u8; 8];
    LittleEndian::write_u64(&mut count_bytes, items.len() as u64);
    buf.extend_from_slice(&count_bytes);
    for item in items {
        crate::encode_value(buf, item, backend, compress)?;
    }
    let payload_len = (buf.len() - start - 8) as u32;
    write_len(buf, payload_len, start + 4);
    Ok(())
}

/// Encode a DICT (§4.5): 4-byte code, 4-byte payload length, 4-byte element
/// count, 4-byte key-block length, `n` end-offsets, key bytes, pad, 8-byte
/// values-block length, then `n` encoded values.
pub fn encode_dict(
    buf: &mut Vec<u8>,
    entries: &Dict,
    backend: &dyn FrameBackend,
    compress: bool,
) -> Result<(), DecodeError> {
    let start = buf.len();
    buf.extend_from_slice(&[constants::DICT, 0, 0, 0]);
    buf.extend_from_slice(&[0u8; 4]); // payload length, back-patched
    let mut count_bytes = [0u8; 4];
    LittleEndian::write_u32(&mut count_bytes, entries.len() as u32);
    buf.extend_from_slice(&count_bytes);
    buf.extend_from_slice(&[0u8; 4]); // key-block length, back-patched

    let offsets_start = buf.len();
    buf.resize(offsets_start + 4 * entries.len(), 0);
    let key_bytes_start = buf.len();
    for (i, key) in entries.keys().enumerate() {
        buf.extend_from_slice(key.as_bytes());
        let offset = (buf.len() - key_bytes_start) as u32;
        let slot = offsets_start + 4 * i;
        LittleEndian::write_u32(&mut buf[slot..slot + 4], offset);
    }
    let key_block_len = (buf.len() - offsets_start) as u32;
    let total = pad8(buf.len() - start);
    buf.resize(start + total, 0);

    let values_len_start = buf.len();
    buf.extend_from_slice(&[0u8; 8]); // values-block length, back-patched
    for value in entries.values() {
        crate::encode_value(buf, value, backend, compress)?;
    }

    let full_len = buf.len();
    write_len(buf, (full_len - start - 8) as u32, start + 4);
    write_len(buf, key_block_len, start + 12);
    let values_len = (full_len - values_len_start - 8) as u64;
    let mut values_len_bytes = [0u8; 8];
    LittleEndian::write_u64(&mut values_len_bytes, values_len);
    buf[values_len_start..values_len_start + 8].copy_from_slice(&values_len_bytes);
    Ok(())
}

/// Decode a LIST. `data` starts at the LIST's own type code.
pub fn decode_list(data: &[u8], backend: &dyn FrameBackend) -> Result<Vec<Value>, DecodeError> {
    let payload_len = read_u32(data, 4)? as usize;
    let body = slice(data, 8, payload_len)?;
    let count = read_u64(body, 0)? as usize;
    if count > constants::MAX_CONTAINER_LEN {
        return Err(DecodeError::ContainerTooLarge { len: count, limit: constants::MAX_CONTAINER_LEN });
    }
    let mut items = Vec::with_capacity(count);
    let mut offset = 8;
    for _ in 0..count {
        let elem_len = element_len(body, offset)?;
        let elem = slice(body, offset, elem_len)?;
        items.push(crate::decode_value(elem, backend)?);
        offset += pad8(elem_len);
    }
    Ok(items)
}

/// Decode a DICT. `data` starts at the DICT's own type code.
pub fn decode_dict(data: &[u8], backend: &dyn FrameBackend) -> Result<Dict, DecodeError> {
    let payload_len = read_u32(data, 4)? as usize;
    let body = slice(data, 8, payload_len)?;
    let count = read_u32(body, 0)? as usize;
    if count > constants::MAX_CONTAINER_LEN {
        return Err(DecodeError::ContainerTooLarge { len: count, limit: constants::MAX_CONTAINER_LEN });
    }

    let mut offset = 8;
    let offsets_start = offset;
    offset += 4 * count;
    let key_bytes_start = offset;
    let mut keys = Vec::with_capacity(count);
    let mut prev_end = 0usize;
    for i in 0..count {
        let end = read_u32(body, offsets_start + 4 * i)? as usize;
        if end < prev_end {
            return Err(DecodeError::KeyOffsetOutOfOrder { offset: end, previous: prev_end });
        }
        let key_bytes = slice(body, key_bytes_start + prev_end, end - prev_end)?;
        if key_bytes.len() > constants::MAX_KEY_LEN {
            return Err(DecodeError::ContainerTooLarge { len: key_bytes.len(), limit: constants::MAX_KEY_LEN });
        }
        let key = std::str::from_utf8(key_bytes)
            .map_err(|source| DecodeError::InvalidUtf8 { field: "dict key", source })?
            .to_owned();
        keys.push(key);
        prev_end = end;
    }
    offset = key_bytes_start + prev_end;
    offset = pad8(offset);
    offset += 8; // values-block length, not needed for decode

    let mut entries = IndexMap::with_capacity(count);
    for key in keys {
        let elem_len = element_len(body, offset)?;
        let elem = slice(body, offset, elem_len)?;
        let value = crate::decode_value(elem, backend)?;
        if entries.insert(key.clone(), value).is_some() {
            return Err(DecodeError::DuplicateKey(key));
        }
        offset += pad8(elem_len);
    }
    Ok(entries)
}

/// The element-advance rule (§4.5): fixed kinds advance by a table lookup,
/// variable kinds by their own length prefix plus 8.
fn element_len(body: &[u8], offset: usize) -> Result<usize, DecodeError> {
    let kind = *body.get(offset).ok_or(DecodeError::Truncated {
        offset,
        needed: 1,
        available: body.len().saturating_sub(offset),
    })?;
    let trailer = constants::fixed_trailer(kind);
    if trailer >= 0 {
        Ok(trailer as usize + 1)
    } else {
        // Variable-length kinds, including a nested ERR (§4.6): a 4-byte
        // code, a 4-byte length at offset+4, then that many payload bytes.
        let len = read_u32(body, offset + 4)? as usize;
        Ok(len + 8)
    }
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, DecodeError> {
    let bytes = data.get(at..at + 4).ok_or(DecodeError::Truncated {
        offset: at,
        needed: 4,
        available: data.len().saturating_sub(at.min(data.len())),
    })?;
    Ok(LittleEndian::read_u32(bytes))
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, DecodeError> {
    let bytes = data.get(at..at + 8).ok_or(DecodeError::Truncated {
        offset: at,
        needed: 8,
        available: data.len().saturating_sub(at.min(data.len())),
    })?;
    Ok(LittleEndian::read_u64(bytes))
}

fn slice(data: &[u8], at: usize, len: usize) -> Result<&[u8], DecodeError> {
    data.get(at..at + len).ok_or(DecodeError::Truncated {
        offset: at,
        needed: len,
        available: data.len().saturating_sub(at.min(data.len())),
    })
}
