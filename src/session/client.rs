//! Client half of the session endpoint (§4.8, §5).
//!
//! A [`ClientSession`] owns one TCP connection and serializes every sync
//! exchange through an internal mutex: §5 requires that "multiple logical
//! requests on the same client connection must not interleave."

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::{default_password, default_user, is_local_host};
use crate::error::SessionError;
use crate::frame::FrameBackend;
use crate::framer::{self, MessageKind};
use crate::value::Value;

/// A connected client session. Cloning the handle is cheap (it is an
/// `Arc`-free wrapper around a mutex-guarded socket); concurrent callers
/// simply queue behind the mutex rather than interleaving requests.
pub struct ClientSession<B: FrameBackend> {
    stream: Mutex<TcpStream>,
    is_local: bool,
    backend: B,
}

impl<B: FrameBackend> ClientSession<B> {
    /// Connect to `host:port`, perform the handshake with the given or
    /// defaulted credential, and return a ready session.
    pub async fn connect(
        host: &str,
        port: u16,
        user: Option<&str>,
        password: Option<&str>,
        backend: B,
    ) -> Result<Self, SessionError> {
        let mut stream = TcpStream::connect((host, port)).await?;
        let credential = format!("{}:{}", default_user(user), default_password(password));
        super::write_handshake(&mut stream, &credential).await?;
        super::read_credential_response(&mut stream).await?;
        Ok(ClientSession { stream: Mutex::new(stream), is_local: is_local_host(host), backend })
    }

    /// Send `value` as a sync request and block until the response has
    /// been fully read and decoded (§4.8 step 4). An `ERR` response is
    /// surfaced as [`crate::error::EvalError`] rather than returned as a
    /// value.
    pub async fn sync(&self, value: &Value) -> Result<Value, SessionError> {
        let mut stream = self.stream.lock().await;
        let compress = crate::frame::should_compress(
            crate::estimate::estimate_size(value, &self.backend),
            self.is_local,
        );
        let payload = crate::encode_value_buf(value, &self.backend, compress)?;
        framer::write_message(&mut *stream, MessageKind::Sync, &payload).await?;

        let header = framer::read_header(&mut *stream).await?;
        let response = framer::read_payload(&mut *stream, &header).await?;
        self.decode_response(&response)
    }

    /// Send `value` as an async request (fire-and-forget). Returns once
    /// the payload has been flushed to the socket; no response is awaited
    /// (§4.8 step 4, §5).
    pub async fn asyn(&self, value: &Value) -> Result<(), SessionError> {
        let mut stream = self.stream.lock().await;
        let compress = crate::frame::should_compress(
            crate::estimate::estimate_size(value, &self.backend),
            self.is_local,
        );
        let payload = crate::encode_value_buf(value, &self.backend, compress)?;
        framer::write_message(&mut *stream, MessageKind::Async, &payload).await?;
        Ok(())
    }

    /// Close the underlying socket (§4.8 step 5).
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut stream = self.stream.lock().await;
        stream.shutdown().await.map_err(crate::error::IoError::Io)?;
        Ok(())
    }

    fn decode_response(&self, payload: &[u8]) -> Result<Value, SessionError> {
        if payload.first() == Some(&crate::constants::ERR) {
            let text = crate::scalar::decode_err_response(payload)?;
            return Err(SessionError::Eval(crate::error::EvalError::new(text)));
        }
        Ok(crate::decode_value(payload, &self.backend)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::frame::PolarsFrameBackend;

    #[test]
    fn default_user_falls_back_to_env_or_unknown() {
        assert_eq!(default_user(Some("alice")), "alice");
        assert_eq!(default_user(Some("")), std::env::var("USER").unwrap_or_else(|_| "unknown".into()));
    }

    #[test]
    fn default_password_prefers_supplied_value() {
        assert_eq!(default_password(Some("secret")), "secret");
    }

    #[test]
    fn is_local_host_matches_localhost_and_loopback() {
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("localhost"));
        assert!(!is_local_host("10.0.0.5"));
    }

    #[tokio::test]
    async fn handshake_and_sync_round_trip_over_loopback() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (user, password) = super::super::read_handshake(&mut socket).await.unwrap();
            assert_eq!(user, "tester");
            assert_eq!(password, "pw");
            super::super::write_credential_response(&mut socket, true).await.unwrap();

            let header = crate::framer::read_header(&mut socket).await.unwrap();
            let payload = crate::framer::read_payload(&mut socket, &header).await.unwrap();
            let backend = PolarsFrameBackend;
            let value = crate::decode_value(&payload, &backend).unwrap();
            assert_eq!(value, Value::Int(7));
            let response = crate::encode_value_buf(&Value::Int(8), &backend, false).unwrap();
            crate::framer::write_message(&mut socket, crate::framer::MessageKind::Response, &response)
                .await
                .unwrap();
        });

        let backend = PolarsFrameBackend;
        let session = ClientSession::connect(
            "127.0.0.1",
            addr.port(),
            Some("tester"),
            Some("pw"),
            backend,
        )
        .await
        .unwrap();
        let reply = session.sync(&Value::Int(7)).await.unwrap();
        assert_eq!(reply, Value::Int(8));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_handshake_is_an_auth_error() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            super::super::read_handshake(&mut socket).await.unwrap();
            super::super::write_credential_response(&mut socket, false).await.unwrap();
        });

        let backend = PolarsFrameBackend;
        let result = ClientSession::connect("127.0.0.1", addr.port(), None, None, backend).await;
        assert!(matches!(result, Err(SessionError::Auth(_))));
        server.await.unwrap();
    }

    #[test]
    fn err_constant_is_the_top_level_decode_trigger() {
        assert_eq!(constants::ERR, 16);
    }
}
