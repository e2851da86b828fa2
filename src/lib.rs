//! Value codec and IPC session protocol for the J data-analysis engine.
//!
//! This crate owns the wire format, not the language that runs on top of
//! it. A [`value::Value`] is a tagged union; encoding dispatches on its
//! discriminant through [`encode_value`], decoding on a one-byte kind code
//! through [`decode_value`]. The tabular kinds (`SERIES`/`DATAFRAME`) are
//! handed off to a pluggable [`frame::FrameBackend`]; everything else is
//! handled directly.
//!
//! See [`session`] for the client/server halves of the connection that
//! carries these values.

pub mod constants;
pub mod container;
pub mod error;
pub mod estimate;
pub mod frame;
pub mod framer;
pub mod scalar;
pub mod session;
pub mod value;

use frame::FrameBackend;
use error::DecodeError;
use value::Value;

/// Encode `value` onto the end of `buf`, dispatching by kind (§4). The
/// result is always a whole number of 8-byte words. `compress`
/// only affects `SERIES`/`DATAFRAME`; callers typically derive it from
/// [`frame::should_compress`] rather than hardcoding it.
///
/// A nested [`Value::Err`] round-trips through the generic 4-byte-code ERR
/// layout like any other variable-length scalar (§4.6). A whole response
/// payload carrying an evaluator failure is still built separately, through
/// [`scalar::encode_err_response`]'s unpadded single-value layout (§4.6, §9).
pub fn encode_value(
    buf: &mut Vec<u8>,
    value: &Value,
    backend: &dyn FrameBackend,
    compress: bool,
) -> Result<(), DecodeError> {
    match value {
        Value::List(items) => container::encode_list(buf, items, backend, compress),
        Value::Dict(entries) => container::encode_dict(buf, entries, backend, compress),
        Value::Series(column) => {
            buf.extend_from_slice(&frame::encode_series(backend, column, compress)?);
            Ok(())
        }
        Value::DataFrame(table) => {
            buf.extend_from_slice(&frame::encode_dataframe(backend, table, compress)?);
            Ok(())
        }
        _ => {
            scalar::encode_scalar(buf, value);
            Ok(())
        }
    }
}

/// Encode `value` into a freshly allocated, appropriately sized buffer.
/// Preallocates via [`estimate::estimate_size`] so the single write pass
/// never needs to grow the buffer (§4.2, §9).
pub fn encode_value_buf(
    value: &Value,
    backend: &dyn FrameBackend,
    compress: bool,
) -> Result<Vec<u8>, DecodeError> {
    let mut buf = Vec::with_capacity(estimate::estimate_size(value, backend));
    encode_value(&mut buf, value, backend, compress)?;
    Ok(buf)
}

/// Decode a single value from `data`, which must start at the value's own
/// type code (offset 0). Every module that slices a sub-element
/// ([`container`], [`frame`]) hands its callee a subslice with this same
/// convention, so decoding never needs to track a running cursor across
/// module boundaries.
pub fn decode_value(data: &[u8], backend: &dyn FrameBackend) -> Result<Value, DecodeError> {
    let kind = *data.first().ok_or(DecodeError::Truncated { offset: 0, needed: 1, available: 0 })?;
    match kind {
        constants::LIST => Ok(Value::List(container::decode_list(data, backend)?)),
        constants::DICT => Ok(Value::Dict(container::decode_dict(data, backend)?)),
        constants::SERIES => Ok(Value::Series(frame::decode_series(backend, &data[4..])?)),
        constants::DATAFRAME => Ok(Value::DataFrame(frame::decode_dataframe(backend, &data[4..])?)),
        kind if constants::is_known_kind(kind) => scalar::decode_scalar(kind, data),
        other => Err(DecodeError::UnknownKind(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame::PolarsFrameBackend;

    #[test]
    fn scalar_round_trips_through_dispatch() {
        let backend = PolarsFrameBackend;
        let buf = encode_value_buf(&Value::Int(42), &backend, false).unwrap();
        assert_eq!(decode_value(&buf, &backend).unwrap(), Value::Int(42));
    }

    #[test]
    fn nested_container_round_trips_through_dispatch() {
        let backend = PolarsFrameBackend;
        let mut dict = value::Dict::new();
        dict.insert("a".to_string(), Value::List(vec![Value::Int(1), Value::Null]));
        let value = Value::Dict(dict);
        let buf = encode_value_buf(&value, &backend, false).unwrap();
        assert_eq!(buf.len() % 8, 0);
        assert_eq!(decode_value(&buf, &backend).unwrap(), value);
    }

    #[test]
    fn err_value_round_trips_through_dispatch_without_panicking() {
        let backend = PolarsFrameBackend;
        let value = Value::Err("boom".to_string());
        let buf = encode_value_buf(&value, &backend, false).unwrap();
        assert_eq!(decode_value(&buf, &backend).unwrap(), value);
    }

    #[test]
    fn encoded_length_never_exceeds_estimate() {
        let backend = PolarsFrameBackend;
        let value = Value::List(vec![
            Value::String("hello".into()),
            Value::Dict({
                let mut d = value::Dict::new();
                d.insert("k".into(), Value::Float(1.5));
                d
            }),
        ]);
        let estimated = estimate::estimate_size(&value, &backend);
        let buf = encode_value_buf(&value, &backend, false).unwrap();
        assert!(buf.len() <= estimated);
    }
}
