//! Server half of the session endpoint (§4.8, §5): accept loop, one task
//! per connection, cooperative cancellation via [`CancellationToken`].

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::is_local_host;
use crate::error::EvalError;
use crate::frame::FrameBackend;
use crate::framer::{self, MessageKind};
use crate::value::Value;

/// Checks a handshake credential. Implementations decide what "valid"
/// means; the wire exchange itself is fixed (§4.8).
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, user: &str, password: &str) -> bool;
}

/// Accepts every credential. Useful for local development and tests; not
/// suitable for a deployment exposed beyond loopback.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthenticator;

impl Authenticator for AllowAllAuthenticator {
    fn authenticate(&self, _user: &str, _password: &str) -> bool {
        true
    }
}

/// Evaluates a decoded request value, producing a result value or an
/// [`EvalError`] (§9's `evaluate(value) -> value` hook). The expression
/// language itself is out of scope for this crate; callers supply their
/// own evaluator.
pub trait Evaluator: Send {
    fn evaluate(&mut self, value: Value) -> Result<Value, EvalError>;
}

/// Run the accept loop on `listener` until `shutdown` is cancelled. Each
/// accepted connection runs as its own task; cancelling `shutdown` cancels
/// every in-flight connection task as well as the accept loop itself
/// (§5).
pub async fn serve<A, E, B>(
    listener: TcpListener,
    authenticator: Arc<A>,
    evaluator: Arc<Mutex<E>>,
    backend: B,
    shutdown: CancellationToken,
) where
    A: Authenticator + 'static,
    E: Evaluator + 'static,
    B: FrameBackend + Clone + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("server shutting down, closing listener");
                break;
            }
            accepted = listener.accept() => {
                let (socket, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("accept failed: {e}");
                        continue;
                    }
                };
                log::info!("accepted connection from {addr}");
                let authenticator = authenticator.clone();
                let evaluator = evaluator.clone();
                let backend = backend.clone();
                let conn_token = shutdown.child_token();
                tokio::spawn(async move {
                    if let Err(e) =
                        handle_connection(socket, authenticator, evaluator, backend, conn_token).await
                    {
                        log::warn!("connection from {addr} ended: {e}");
                    }
                });
            }
        }
    }
}

async fn handle_connection<A, E, B>(
    mut socket: TcpStream,
    authenticator: Arc<A>,
    evaluator: Arc<Mutex<E>>,
    backend: B,
    cancel: CancellationToken,
) -> Result<(), crate::error::SessionError>
where
    A: Authenticator,
    E: Evaluator,
    B: FrameBackend,
{
    let is_local = socket
        .peer_addr()
        .map(|addr| is_local_host(&addr.ip().to_string()))
        .unwrap_or(false);

    let (user, password) = super::read_handshake(&mut socket).await?;
    if !authenticator.authenticate(&user, &password) {
        super::write_credential_response(&mut socket, false).await?;
        return Err(crate::error::AuthError.into());
    }
    super::write_credential_response(&mut socket, true).await?;

    loop {
        let header = tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("connection cancelled mid-wait, closing");
                return Ok(());
            }
            header = framer::read_header(&mut socket) => header,
        };
        let header = match header {
            Ok(header) => header,
            Err(crate::error::IoError::Disconnected) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let payload = tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("connection cancelled mid-payload, closing");
                return Ok(());
            }
            payload = framer::read_payload(&mut socket, &header) => payload,
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(crate::error::IoError::Disconnected) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let request = match crate::decode_value(&payload, &backend) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("decode error, closing connection: {e}");
                return Err(e.into());
            }
        };

        let outcome = evaluator.lock().await.evaluate(request);
        if header.kind != MessageKind::Sync {
            if let Err(e) = outcome {
                log::warn!("async evaluation failed: {e}");
            }
            continue;
        }

        match outcome {
            Ok(result) => {
                let compress = crate::frame::should_compress(
                    crate::estimate::estimate_size(&result, &backend),
                    is_local,
                );
                let response = crate::encode_value_buf(&result, &backend, compress)?;
                framer::write_message(&mut socket, MessageKind::Response, &response).await?;
            }
            Err(e) => {
                let response = crate::scalar::encode_err_response(&e.0);
                framer::write_message(&mut socket, MessageKind::Response, &response).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PolarsFrameBackend;
    use crate::session::client::ClientSession;

    struct Echo;

    impl Evaluator for Echo {
        fn evaluate(&mut self, value: Value) -> Result<Value, EvalError> {
            if let Value::String(s) = &value {
                if s == "boom" {
                    return Err(EvalError::new("boom requested"));
                }
            }
            Ok(value)
        }
    }

    #[tokio::test]
    async fn sync_request_echoes_through_evaluator() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server_token = shutdown.clone();
        let server = tokio::spawn(serve(
            listener,
            Arc::new(AllowAllAuthenticator),
            Arc::new(Mutex::new(Echo)),
            PolarsFrameBackend,
            server_token,
        ));

        let session =
            ClientSession::connect("127.0.0.1", addr.port(), None, None, PolarsFrameBackend)
                .await
                .unwrap();
        let reply = session.sync(&Value::Int(9)).await.unwrap();
        assert_eq!(reply, Value::Int(9));

        let err = session.sync(&Value::String("boom".into())).await;
        assert!(matches!(err, Err(crate::error::SessionError::Eval(_))));

        shutdown.cancel();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn async_request_gets_no_response() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server_token = shutdown.clone();
        let server = tokio::spawn(serve(
            listener,
            Arc::new(AllowAllAuthenticator),
            Arc::new(Mutex::new(Echo)),
            PolarsFrameBackend,
            server_token,
        ));

        let session =
            ClientSession::connect("127.0.0.1", addr.port(), None, None, PolarsFrameBackend)
                .await
                .unwrap();
        session.asyn(&Value::Null).await.unwrap();

        shutdown.cancel();
        server.await.unwrap();
    }
}
