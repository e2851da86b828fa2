//! The SERIES / DATAFRAME codec (§4.4) and the `FrameBackend` hook.
//!
//! The frame engine itself (how columns are typed, how a table is grouped
//! or joined) is out of scope for this crate (§1's Non-goal). What the
//! codec owns is everything *around* that black box: picking compression
//! based on the size heuristic and locality, writing the 8-byte frame
//! header, and padding the result to the container alignment. A
//! [`FrameBackend`] implementation supplies the actual Arrow-IPC bytes; the
//! default one is backed by `polars`, mirroring the original engine's own
//! use of `polars.write_ipc`/`read_ipc`.

use byteorder::{ByteOrder, LittleEndian};

use crate::constants::{self, pad8};
use crate::error::DecodeError;
use crate::framer::write_len;

/// A single column, opaque to the codec beyond what `FrameBackend` needs to
/// serialize it. Wraps a `polars::series::Series`.
#[derive(Debug, Clone)]
pub struct Column(pub polars::series::Series);

/// A multi-column table, opaque to the codec beyond what `FrameBackend`
/// needs to serialize it. Wraps a `polars::frame::DataFrame`.
#[derive(Debug, Clone)]
pub struct Frame(pub polars::frame::DataFrame);

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }
}

/// The external "frame writer/reader" hook (§1, §9). Implementations turn a
/// [`Frame`]/[`Column`] into Arrow-IPC bytes and back; the codec never
/// inspects frame internals directly.
pub trait FrameBackend: Send + Sync {
    /// Serialize a whole frame to an Arrow-IPC byte stream, optionally with
    /// zstd block compression.
    fn write_frame(&self, frame: &Frame, compressed: bool) -> Result<Vec<u8>, DecodeError>;

    /// Deserialize an Arrow-IPC byte stream produced by `write_frame`.
    fn read_frame(&self, bytes: &[u8]) -> Result<Frame, DecodeError>;

    /// Serialize a single column, wrapped as a single-column frame, to an
    /// Arrow-IPC byte stream.
    fn write_column(&self, column: &Column, compressed: bool) -> Result<Vec<u8>, DecodeError>;

    /// Deserialize an Arrow-IPC byte stream produced by `write_column` and
    /// extract its sole column.
    fn read_column(&self, bytes: &[u8]) -> Result<Column, DecodeError>;

    /// Upper bound, in bytes, of the Arrow-IPC encoding of `frame` before
    /// compression is considered. Used by the size estimator.
    fn estimate_frame(&self, frame: &Frame) -> usize;

    /// Upper bound, in bytes, of the Arrow-IPC encoding of `column`.
    fn estimate_column(&self, column: &Column) -> usize;
}

/// Default [`FrameBackend`], backed by `polars`'s Arrow-IPC reader/writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolarsFrameBackend;

impl FrameBackend for PolarsFrameBackend {
    fn write_frame(&self, frame: &Frame, compressed: bool) -> Result<Vec<u8>, DecodeError> {
        write_ipc(&frame.0, compressed)
    }

    fn read_frame(&self, bytes: &[u8]) -> Result<Frame, DecodeError> {
        read_ipc(bytes).map(Frame)
    }

    fn write_column(&self, column: &Column, compressed: bool) -> Result<Vec<u8>, DecodeError> {
        let df = column.0.clone().into_frame();
        write_ipc(&df, compressed)
    }

    fn read_column(&self, bytes: &[u8]) -> Result<Column, DecodeError> {
        let df = read_ipc(bytes)?;
        let series = df
            .get_columns()
            .first()
            .ok_or_else(|| DecodeError::Frame("SERIES frame has no columns".into()))?
            .as_materialized_series()
            .clone();
        Ok(Column(series))
    }

    fn estimate_frame(&self, frame: &Frame) -> usize {
        frame.0.estimated_size()
    }

    fn estimate_column(&self, column: &Column) -> usize {
        column.0.estimated_size()
    }
}

fn write_ipc(df: &polars::frame::DataFrame, compressed: bool) -> Result<Vec<u8>, DecodeError> {
    use polars::prelude::{IpcCompression, IpcWriter, SerWriter};

    let mut buf = Vec::new();
    let mut writer = IpcWriter::new(&mut buf);
    if compressed {
        writer = writer.with_compression(Some(IpcCompression::ZSTD));
    }
    let mut df = df.clone();
    writer
        .finish(&mut df)
        .map_err(|e| DecodeError::Frame(e.to_string()))?;
    Ok(buf)
}

fn read_ipc(bytes: &[u8]) -> Result<polars::frame::DataFrame, DecodeError> {
    use polars::prelude::IpcReader;
    use std::io::Cursor;

    IpcReader::new(Cursor::new(bytes))
        .finish()
        .map_err(|e| DecodeError::Frame(e.to_string()))
}

/// Encode a DATAFRAME value (§4.4): 4-byte code, 4-byte payload length,
/// Arrow-IPC blob, pad to 8 bytes.
pub fn encode_dataframe(
    backend: &dyn FrameBackend,
    frame: &Frame,
    compressed: bool,
) -> Result<Vec<u8>, DecodeError> {
    encode_frame_like(backend.write_frame(frame, compressed)?, constants::DATAFRAME)
}

/// Encode a SERIES value (§4.4): the column is wrapped in a single-column
/// frame before being handed to the frame writer.
pub fn encode_series(
    backend: &dyn FrameBackend,
    column: &Column,
    compressed: bool,
) -> Result<Vec<u8>, DecodeError> {
    encode_frame_like(backend.write_column(column, compressed)?, constants::SERIES)
}

fn encode_frame_like(ipc_bytes: Vec<u8>, code: u8) -> Result<Vec<u8>, DecodeError> {
    let total = pad8(8 + ipc_bytes.len());
    let mut out = vec![0u8; total];
    out[0] = code;
    write_len(&mut out, ipc_bytes.len() as u32, 4);
    out[8..8 + ipc_bytes.len()].copy_from_slice(&ipc_bytes);
    Ok(out)
}

/// Decode a DATAFRAME payload (the type code at offset 0 has already been
/// consumed by the caller; `data` starts at offset 4, matching the
/// container codec's convention).
pub fn decode_dataframe(backend: &dyn FrameBackend, data: &[u8]) -> Result<Frame, DecodeError> {
    let ipc_bytes = slice_frame_payload(data)?;
    backend.read_frame(ipc_bytes)
}

/// Decode a SERIES payload; see [`decode_dataframe`] for the offset
/// convention.
pub fn decode_series(backend: &dyn FrameBackend, data: &[u8]) -> Result<Column, DecodeError> {
    let ipc_bytes = slice_frame_payload(data)?;
    backend.read_column(ipc_bytes)
}

fn slice_frame_payload(data: &[u8]) -> Result<&[u8], DecodeError> {
    if data.len() < 4 {
        return Err(DecodeError::Truncated {
            offset: 0,
            needed: 4,
            available: data.len(),
        });
    }
    let len = LittleEndian::read_u32(&data[0..4]) as usize;
    data.get(4..4 + len).ok_or(DecodeError::Truncated {
        offset: 4,
        needed: len,
        available: data.len().saturating_sub(4),
    })
}

/// Whether compression should be used for a frame value, given its
/// estimated size and whether the session peer is local (§4.4, §9).
pub fn should_compress(estimated_size: usize, is_local: bool) -> bool {
    estimated_size > constants::COMPRESSION_THRESHOLD && !is_local
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{DataFrame, NamedFrom};
    use polars::series::Series;

    fn sample_frame() -> Frame {
        let a = Series::new("a".into(), &[1i64, 2, 3]);
        let b = Series::new("b".into(), &["x", "y", "z"]);
        Frame(DataFrame::new(vec![a.into(), b.into()]).unwrap())
    }

    #[test]
    fn should_compress_crosses_threshold_for_remote_peers() {
        assert!(!should_compress(constants::COMPRESSION_THRESHOLD, false));
        assert!(should_compress(constants::COMPRESSION_THRESHOLD + 1, false));
    }

    #[test]
    fn should_compress_never_fires_for_local_peers() {
        assert!(!should_compress(constants::COMPRESSION_THRESHOLD + 1, true));
    }

    #[test]
    fn dataframe_round_trips_uncompressed() {
        let backend = PolarsFrameBackend;
        let frame = sample_frame();
        let encoded = encode_dataframe(&backend, &frame, false).unwrap();
        assert_eq!(encoded[0], constants::DATAFRAME);
        assert_eq!(encoded.len() % 8, 0);
        let decoded = decode_dataframe(&backend, &encoded[4..]).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn dataframe_round_trips_compressed() {
        let backend = PolarsFrameBackend;
        let frame = sample_frame();
        let encoded = encode_dataframe(&backend, &frame, true).unwrap();
        let decoded = decode_dataframe(&backend, &encoded[4..]).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn series_round_trips_as_single_column_frame() {
        let backend = PolarsFrameBackend;
        let column = Column(Series::new("a".into(), &[1i64, 2, 3]));
        let encoded = encode_series(&backend, &column, false).unwrap();
        assert_eq!(encoded[0], constants::SERIES);
        let decoded = decode_series(&backend, &encoded[4..]).unwrap();
        assert_eq!(decoded, column);
    }

    #[test]
    fn truncated_frame_payload_is_a_decode_error() {
        let backend = PolarsFrameBackend;
        let frame = sample_frame();
        let encoded = encode_dataframe(&backend, &frame, false).unwrap();
        let truncated = &encoded[4..encoded.len() - 4];
        assert!(decode_dataframe(&backend, truncated).is_err());
    }
}
