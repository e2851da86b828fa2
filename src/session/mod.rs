//! The session endpoint (§4.8): handshake, credential exchange, and the
//! sync/async request/response loop, on both sides of one TCP connection.

pub mod client;
pub mod server;

pub use client::ClientSession;
pub use server::{serve, Authenticator, Evaluator};

use byteorder::{ByteOrder, LittleEndian};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::constants;
use crate::error::{AuthError, IoError};

/// Send the client half of the handshake: the literal tag, a 4-byte
/// little-endian credential length, then the UTF-8 `"user:password"`
/// credential (§4.8 step 1).
pub(crate) async fn write_handshake<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    credential: &str,
) -> Result<(), IoError> {
    writer.write_all(constants::HANDSHAKE_TAG).await?;
    let mut len_bytes = [0u8; 4];
    LittleEndian::write_u32(&mut len_bytes, credential.len() as u32);
    writer.write_all(&len_bytes).await?;
    writer.write_all(credential.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the server half of the handshake. `raw_tag` lets the caller decide
/// how to react to a tag mismatch; this crate treats it as a protocol-level
/// I/O error rather than folding it into [`AuthError`], since the peer may
/// simply not be speaking this protocol at all.
pub(crate) async fn read_handshake<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<(String, String), IoError> {
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag).await?;
    if &tag != constants::HANDSHAKE_TAG {
        return Err(IoError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "handshake tag mismatch",
        )));
    }
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = LittleEndian::read_u32(&len_bytes) as usize;
    let mut credential = vec![0u8; len];
    reader.read_exact(&mut credential).await?;
    let credential = String::from_utf8(credential).map_err(|e| {
        IoError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    match credential.split_once(':') {
        Some((user, password)) => Ok((user.to_string(), password.to_string())),
        None => Ok((credential, String::new())),
    }
}

/// Write the credential-response byte (§4.8 step 2): 0 rejects, any
/// nonzero byte accepts. This crate names the protocol version 1.
pub(crate) async fn write_credential_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    accepted: bool,
) -> Result<(), IoError> {
    writer.write_all(&[if accepted { 1 } else { 0 }]).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the credential-response byte and translate a rejection into
/// [`AuthError`].
pub(crate) async fn read_credential_response<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<(), AuthError> {
    let mut byte = [0u8];
    reader
        .read_exact(&mut byte)
        .await
        .map_err(|_| AuthError)?;
    if byte[0] == 0 {
        Err(AuthError)
    } else {
        Ok(())
    }
}

/// Resolve the user portion of a credential the way the original engine
/// does (§6): the caller-supplied value if non-empty, else the OS login
/// name, else `"unknown"`.
pub fn default_user(supplied: Option<&str>) -> String {
    if let Some(user) = supplied.filter(|s| !s.is_empty()) {
        return user.to_string();
    }
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Resolve the password portion of a credential (§6): the caller-supplied
/// value if non-empty, else [`constants::DEFAULT_PASSWORD_ENV`], else
/// empty.
pub fn default_password(supplied: Option<&str>) -> String {
    if let Some(password) = supplied.filter(|s| !s.is_empty()) {
        return password.to_string();
    }
    std::env::var(constants::DEFAULT_PASSWORD_ENV).unwrap_or_default()
}

/// A peer at `127.0.0.1` or `localhost` is local; compression is disabled
/// for local peers (§6, §9).
pub fn is_local_host(host: &str) -> bool {
    host == "127.0.0.1" || host == "localhost"
}
