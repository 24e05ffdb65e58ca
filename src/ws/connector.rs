//! Socket establishment.
//!
//! The controller never opens sockets itself; it asks a [`Connector`] for a
//! connected WebSocket. The default [`TungsteniteConnector`] dials the
//! endpoint with `tokio-tungstenite`. Tests plug in connectors backed by
//! in-memory streams.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::error::SessionError;

/// A connected WebSocket: a stream of inbound messages and a sink for
/// outbound ones.
pub trait WsSocket:
    Stream<Item = Result<Message, tungstenite::Error>> + Sink<Message, Error = tungstenite::Error> + Send
{
}

impl<T> WsSocket for T where
    T: Stream<Item = Result<Message, tungstenite::Error>> + Sink<Message, Error = tungstenite::Error> + Send + ?Sized
{
}

/// Type-erased connected socket.
pub type BoxSocket = Pin<Box<dyn WsSocket>>;

/// Supplies the headers attached to every handshake request, typically
/// `Authorization` and `Client-Id`. Called once per connect so refreshed
/// tokens are picked up.
pub type HeaderProvider = Arc<dyn Fn() -> Vec<(String, String)> + Send + Sync>;

/// Opens WebSocket connections.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Performs the handshake described by `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the connection cannot be established.
    fn connect(&self, request: Request) -> BoxFuture<'static, Result<BoxSocket, SessionError>>;
}

/// Default connector backed by [`tokio_tungstenite::connect_async`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(&self, request: Request) -> BoxFuture<'static, Result<BoxSocket, SessionError>> {
        Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(request).await?;
            Ok(Box::pin(socket) as BoxSocket)
        })
    }
}

/// Builds the handshake request for `url`, attaching the provider's headers.
///
/// # Errors
///
/// Returns [`SessionError::WebSocket`] if `url` is not a valid WebSocket URL
/// and [`SessionError::InvalidHeader`] if a provided header name or value is
/// not valid HTTP.
pub fn build_request(url: &str, headers: Option<&HeaderProvider>) -> Result<Request, SessionError> {
    let mut request = url.into_client_request()?;
    let Some(provider) = headers else {
        return Ok(request);
    };

    for (name, value) in provider() {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| SessionError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(&value).map_err(|e| SessionError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        request.headers_mut().insert(header_name, header_value);
    }
    Ok(request)
}
