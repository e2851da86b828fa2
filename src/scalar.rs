//! Scalar codec (§4.3) and the ERR value codec (§4.6).
//!
//! Every function here operates on a *data* slice that begins at the value's
//! own type code (offset 0 is the code byte); this is the same convention
//! [`crate::frame`] and [`crate::container`] use, so a container's element
//! loop can hand either module the same subslice without adjustment.

use byteorder::{ByteOrder, LittleEndian};

use crate::constants::{self, pad8};
use crate::error::DecodeError;
use crate::value::Value;

/// Append the encoded form of a fixed-layout or text scalar to `buf`,
/// including its trailing pad. Containers and frames are not accepted here;
/// callers dispatch those to [`crate::container`] and [`crate::frame`]
/// first. `Value::Err` goes through the same generic 4-byte-code-plus-length
/// layout as `String`/`Cat` here (mirroring [`decode_scalar`]'s generic ERR
/// branch), so a `Value::Err` decoded from a nested element round-trips;
/// [`encode_err_response`]/[`decode_err_response`] remain the separate,
/// unpadded pair used to build a whole response payload (§4.6, §9).
pub fn encode_scalar(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.extend_from_slice(&[0u8; 8]),
        Value::Boolean(v) => {
            buf.extend_from_slice(&[constants::BOOLEAN, 0, 0, 0]);
            buf.extend_from_slice(&[*v as u8, 0, 0, 0]);
        }
        Value::Int(v) => encode_i64_like(buf, constants::INT, *v),
        Value::Time(v) => encode_i64_like(buf, constants::TIME, *v),
        Value::Duration(v) => encode_i64_like(buf, constants::DURATION, *v),
        Value::Float(v) => {
            buf.extend_from_slice(&[constants::FLOAT, 0, 0, 0]);
            buf.extend_from_slice(&[0u8; 4]);
            let mut bits = [0u8; 8];
            LittleEndian::write_f64(&mut bits, *v);
            buf.extend_from_slice(&bits);
        }
        Value::Date(days) => {
            buf.extend_from_slice(&[constants::DATE, 0, 0, 0]);
            let mut bytes = [0u8; 4];
            LittleEndian::write_i32(&mut bytes, *days);
            buf.extend_from_slice(&bytes);
        }
        Value::Datetime { millis, tz } => encode_tz_epoch(buf, constants::DATETIME, *millis, tz),
        Value::Timestamp { nanos, tz } => encode_tz_epoch(buf, constants::TIMESTAMP, *nanos, tz),
        Value::String(s) => encode_text(buf, constants::STRING, s),
        Value::Cat(s) => encode_text(buf, constants::CAT, s),
        Value::Fn(body) => encode_text(buf, constants::FN, body),
        Value::Err(text) => encode_text(buf, constants::ERR, text),
        other => unreachable!("encode_scalar called with non-scalar kind {:?}", other.kind()),
    }
}

fn encode_i64_like(buf: &mut Vec<u8>, code: u8, v: i64) {
    buf.extend_from_slice(&[code, 0, 0, 0]);
    buf.extend_from_slice(&[0u8; 4]);
    let mut bytes = [0u8; 8];
    LittleEndian::write_i64(&mut bytes, v);
    buf.extend_from_slice(&bytes);
}

fn encode_tz_epoch(buf: &mut Vec<u8>, code: u8, epoch: i64, tz: &str) {
    let start = buf.len();
    buf.extend_from_slice(&[code, 0, 0, 0]);
    let mut len_bytes = [0u8; 4];
    LittleEndian::write_u32(&mut len_bytes, (8 + tz.len()) as u32);
    buf.extend_from_slice(&len_bytes);
    let mut epoch_bytes = [0u8; 8];
    LittleEndian::write_i64(&mut epoch_bytes, epoch);
    buf.extend_from_slice(&epoch_bytes);
    buf.extend_from_slice(tz.as_bytes());
    pad_to(buf, start);
}

fn encode_text(buf: &mut Vec<u8>, code: u8, text: &str) {
    let start = buf.len();
    buf.extend_from_slice(&[code, 0, 0, 0]);
    let mut len_bytes = [0u8; 4];
    LittleEndian::write_u32(&mut len_bytes, text.len() as u32);
    buf.extend_from_slice(&len_bytes);
    buf.extend_from_slice(text.as_bytes());
    pad_to(buf, start);
}

fn pad_to(buf: &mut Vec<u8>, start: usize) {
    let total = pad8(buf.len() - start);
    buf.resize(start + total, 0);
}

/// Decode a scalar whose kind code has already been read from `data[0]`.
/// `data` is the full element slice, starting at the code byte.
pub fn decode_scalar(kind: u8, data: &[u8]) -> Result<Value, DecodeError> {
    let body = after_code(data)?;
    match kind {
        constants::NULL => Ok(Value::Null),
        constants::BOOLEAN => Ok(Value::Boolean(require(body, 1, 0)?[0] != 0)),
        constants::INT => Ok(Value::Int(read_i64(body, 4)?)),
        constants::TIME => Ok(Value::Time(read_i64(body, 4)?)),
        constants::DURATION => Ok(Value::Duration(read_i64(body, 4)?)),
        constants::FLOAT => {
            let bytes = require(body, 8, 4)?;
            Ok(Value::Float(LittleEndian::read_f64(bytes)))
        }
        constants::DATE => {
            let bytes = require(body, 4, 0)?;
            Ok(Value::Date(LittleEndian::read_i32(bytes)))
        }
        constants::DATETIME | constants::TIMESTAMP => {
            let (epoch, tz) = decode_tz_epoch(body)?;
            if kind == constants::DATETIME {
                Ok(Value::Datetime { millis: epoch, tz })
            } else {
                Ok(Value::Timestamp { nanos: epoch, tz })
            }
        }
        constants::STRING => Ok(Value::String(decode_text(body)?)),
        constants::CAT => Ok(Value::Cat(decode_text(body)?)),
        constants::FN => Ok(Value::Fn(decode_text(body)?)),
        constants::ERR => Ok(Value::Err(decode_text(body)?)),
        other => Err(DecodeError::UnknownKind(other)),
    }
}

fn after_code(data: &[u8]) -> Result<&[u8], DecodeError> {
    require(data, 0, 4)
}

fn require(data: &[u8], needed: usize, skip: usize) -> Result<&[u8], DecodeError> {
    data.get(skip..skip + needed)
        .ok_or(DecodeError::Truncated {
            offset: skip,
            needed,
            available: data.len().saturating_sub(skip.min(data.len())),
        })
}

fn read_i64(body: &[u8], at: usize) -> Result<i64, DecodeError> {
    Ok(LittleEndian::read_i64(require(body, 8, at)?))
}

fn decode_tz_epoch(body: &[u8]) -> Result<(i64, String), DecodeError> {
    let dt_len = LittleEndian::read_u32(require(body, 4, 0)?) as usize;
    let epoch = LittleEndian::read_i64(require(body, 8, 4)?);
    if dt_len < 8 {
        return Err(DecodeError::Truncated {
            offset: 4,
            needed: 8,
            available: dt_len,
        });
    }
    let tz_bytes = require(body, dt_len - 8, 12)?;
    let tz = std::str::from_utf8(tz_bytes)
        .map_err(|source| DecodeError::InvalidUtf8 { field: "timezone name", source })?
        .to_owned();
    Ok((epoch, tz))
}

fn decode_text(body: &[u8]) -> Result<String, DecodeError> {
    let len = LittleEndian::read_u32(require(body, 4, 0)?) as usize;
    let bytes = require(body, len, 4)?;
    std::str::from_utf8(bytes)
        .map(|s| s.to_owned())
        .map_err(|source| DecodeError::InvalidUtf8 { field: "text", source })
}

/// Build a complete sync-response payload carrying an evaluator failure
/// (§4.6, §7): a single code byte `0x10`, a 4-byte little-endian UTF-8
/// length, then the diagnostic text. Unlike every other kind this is not
/// padded to 8 bytes and is never nested inside a container; it is only
/// ever the entire payload of a response frame, so the frame header's own
/// length field already delimits it exactly.
pub fn encode_err_response(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + text.len());
    buf.push(constants::ERR);
    let mut len_bytes = [0u8; 4];
    LittleEndian::write_u32(&mut len_bytes, text.len() as u32);
    buf.extend_from_slice(&len_bytes);
    buf.extend_from_slice(text.as_bytes());
    buf
}

/// Inverse of [`encode_err_response`].
pub fn decode_err_response(payload: &[u8]) -> Result<String, DecodeError> {
    if payload.is_empty() || payload[0] != constants::ERR {
        return Err(DecodeError::UnknownKind(*payload.first().unwrap_or(&0)));
    }
    let len = LittleEndian::read_u32(require(payload, 4, 1)?) as usize;
    let bytes = require(payload, len, 5)?;
    std::str::from_utf8(bytes)
        .map(|s| s.to_owned())
        .map_err(|source| DecodeError::InvalidUtf8 { field: "error text", source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        hex::decode(s.replace(' ', "")).unwrap()
    }

    #[test]
    fn null_round_trips() {
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &Value::Null);
        assert_eq!(buf, hex("00 00 00 00 00 00 00 00"));
        assert_eq!(decode_scalar(constants::NULL, &buf).unwrap(), Value::Null);
    }

    #[test]
    fn boolean_true_matches_golden() {
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &Value::Boolean(true));
        assert_eq!(buf, hex("01 00 00 00 01 00 00 00"));
        assert_eq!(
            decode_scalar(constants::BOOLEAN, &buf).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn int_one_matches_golden() {
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &Value::Int(1));
        assert_eq!(
            buf,
            hex("02 00 00 00 00 00 00 00 01 00 00 00 00 00 00 00")
        );
        assert_eq!(decode_scalar(constants::INT, &buf).unwrap(), Value::Int(1));
    }

    #[test]
    fn date_matches_golden() {
        let bytes = hex("03 00 00 00 70 4E 00 00");
        let value = decode_scalar(constants::DATE, &bytes).unwrap();
        let Value::Date(days) = value else { panic!("wrong kind") };
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &Value::Date(days));
        assert_eq!(buf, bytes);
    }

    #[test]
    fn timestamp_with_tz_matches_golden() {
        let bytes = hex(
            "06 00 00 00 12 00 00 00 42 68 6A 39 00 7E F0 0A \
             41 73 69 61 2F 54 6F 6B 79 6F 00 00 00 00 00 00",
        );
        let value = decode_scalar(constants::TIMESTAMP, &bytes).unwrap();
        assert_eq!(
            value,
            Value::Timestamp { nanos: 788268474218211394, tz: "Asia/Tokyo".into() }
        );
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &value);
        assert_eq!(buf, bytes);
    }

    #[test]
    fn timestamp_with_empty_tz_round_trips() {
        let value = Value::Timestamp { nanos: -1, tz: String::new() };
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &value);
        assert_eq!(buf.len() % 8, 0);
        assert_eq!(decode_scalar(constants::TIMESTAMP, &buf).unwrap(), value);
    }

    #[test]
    fn string_matches_golden() {
        let bytes = hex("09 00 00 00 07 00 00 00 46 72 69 65 72 65 6E 00");
        let value = decode_scalar(constants::STRING, &bytes).unwrap();
        assert_eq!(value, Value::String("Frieren".into()));
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &value);
        assert_eq!(buf, bytes);
    }

    #[test]
    fn empty_string_round_trips() {
        let value = Value::String(String::new());
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &value);
        assert_eq!(buf.len(), 8);
        assert_eq!(decode_scalar(constants::STRING, &buf).unwrap(), value);
    }

    #[test]
    fn err_response_round_trips() {
        let payload = encode_err_response("X");
        assert_eq!(payload, hex("10 01 00 00 00 58"));
        assert_eq!(decode_err_response(&payload).unwrap(), "X");
    }

    #[test]
    fn truncated_string_is_a_decode_error() {
        let bytes = hex("09 00 00 00 07 00 00 00 46 72");
        assert!(decode_scalar(constants::STRING, &bytes).is_err());
    }

    #[test]
    fn unknown_kind_is_a_decode_error() {
        let bytes = hex("FF 00 00 00 00 00 00 00");
        assert!(matches!(
            decode_scalar(0xFF, &bytes),
            Err(DecodeError::UnknownKind(0xFF))
        ));
    }

    #[test]
    fn nested_err_round_trips_through_generic_dispatch() {
        let value = Value::Err("boom".to_string());
        let mut buf = Vec::new();
        encode_scalar(&mut buf, &value);
        assert_eq!(buf.len() % 8, 0);
        assert_eq!(decode_scalar(constants::ERR, &buf).unwrap(), value);
    }
}
