//! The 8-byte request/response header (§4.7) and the length back-patch
//! helper shared by the container and frame codecs.

use byteorder::{ByteOrder, LittleEndian};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::IoError;

pub const ENDIAN_MARKER: u8 = 0x01;

/// Request/response discriminator carried in header byte 1 (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Async,
    Sync,
    Response,
}

impl MessageKind {
    fn to_byte(self) -> u8 {
        match self {
            MessageKind::Async => 0,
            MessageKind::Sync => 1,
            MessageKind::Response => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MessageKind::Async),
            1 => Some(MessageKind::Sync),
            2 => Some(MessageKind::Response),
            _ => None,
        }
    }
}

/// An 8-byte message header: endian marker, message kind, two reserved
/// zero bytes, and a little-endian payload length.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub kind: MessageKind,
    pub payload_len: u32,
}

impl Header {
    pub fn new(kind: MessageKind, payload_len: u32) -> Self {
        Header { kind, payload_len }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0] = ENDIAN_MARKER;
        out[1] = self.kind.to_byte();
        LittleEndian::write_u32(&mut out[4..8], self.payload_len);
        out
    }
}

/// Write a header followed by `payload` to `writer`, in one logical
/// message (§4.7: "the payload is consumed in full before the next header
/// is read" governs the reader side; the writer side mirrors it by never
/// interleaving a header with another message's payload).
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    kind: MessageKind,
    payload: &[u8],
) -> Result<(), IoError> {
    let header = Header::new(kind, payload.len() as u32);
    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one header from `reader`. Returns [`IoError::Disconnected`] if the
/// peer closed the socket before any bytes of the header arrived; a
/// partial header is a genuine I/O error, not a clean disconnect.
pub async fn read_header<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Header, IoError> {
    let mut bytes = [0u8; 8];
    match reader.read_exact(&mut bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(IoError::Disconnected);
        }
        Err(e) => return Err(IoError::Io(e)),
    }
    let kind = MessageKind::from_byte(bytes[1]).ok_or_else(|| {
        IoError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unknown message kind byte {}", bytes[1]),
        ))
    })?;
    let payload_len = LittleEndian::read_u32(&bytes[4..8]);
    Ok(Header { kind, payload_len })
}

/// Read exactly `header.payload_len` bytes following a header. A peer that
/// closes the socket before delivering the declared length is treated the
/// same as one that closes before the header: a clean disconnect, not a
/// decode error (§7).
pub async fn read_payload<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    header: &Header,
) -> Result<Vec<u8>, IoError> {
    let mut payload = vec![0u8; header.payload_len as usize];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(IoError::Disconnected);
        }
        Err(e) => return Err(IoError::Io(e)),
    }
    Ok(payload)
}

/// Back-patch a 4-byte little-endian length into `buf` at `start`, as used
/// by the container and frame codecs once a body's final size is known.
pub fn write_len(buf: &mut [u8], len: u32, start: usize) {
    LittleEndian::write_u32(&mut buf[start..start + 4], len);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_bytes() {
        let header = Header::new(MessageKind::Sync, 128);
        let bytes = header.to_bytes();
        assert_eq!(bytes[0], ENDIAN_MARKER);
        assert_eq!(bytes[1], 1);
        assert_eq!(&bytes[2..4], &[0, 0]);
        assert_eq!(LittleEndian::read_u32(&bytes[4..8]), 128);
    }

    #[tokio::test]
    async fn write_then_read_message_round_trips() {
        let (mut client, mut server) = tokio::io::duplex(256);
        write_message(&mut client, MessageKind::Async, b"hello").await.unwrap();
        let header = read_header(&mut server).await.unwrap();
        assert_eq!(header.kind, MessageKind::Async);
        assert_eq!(header.payload_len, 5);
        let payload = read_payload(&mut server, &header).await.unwrap();
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn read_header_on_closed_socket_is_disconnected() {
        let (client, mut server) = tokio::io::duplex(8);
        drop(client);
        assert!(matches!(
            read_header(&mut server).await,
            Err(IoError::Disconnected)
        ));
    }

    #[test]
    fn write_len_patches_in_place() {
        let mut buf = vec![0u8; 8];
        write_len(&mut buf, 42, 4);
        assert_eq!(LittleEndian::read_u32(&buf[4..8]), 42);
    }
}
