use super::{ConnectionError, Handshake, Session, Transport};
use crate::config::ClientConfig;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Production transport: a WebSocket upgrade against the firehose endpoint
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
	skip_tls_verification: bool,
	idle_timeout: Duration,
	keepalive_interval: Duration,
}

impl WebSocketTransport {
	pub fn new(config: &ClientConfig) -> Self {
		Self {
			skip_tls_verification: config.skip_tls_verification,
			idle_timeout: config.idle_timeout,
			keepalive_interval: config.keepalive_interval,
		}
	}

	fn connector(&self) -> Result<Option<Connector>, ConnectionError> {
		if !self.skip_tls_verification {
			return Ok(None);
		}
		let tls = native_tls::TlsConnector::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.map_err(|e| ConnectionError::Tls(e.to_string()))?;
		Ok(Some(Connector::NativeTls(tls)))
	}
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
	async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Session>, ConnectionError> {
		let url = handshake.url();
		let mut request = url.as_str().into_client_request().map_err(classify_handshake)?;
		let authorization =
			HeaderValue::from_str(&handshake.authorization()).map_err(|e| ConnectionError::Handshake(format!("token is not a valid header value: {e}")))?;
		request.headers_mut().insert(AUTHORIZATION, authorization);

		debug!(%url, "opening firehose websocket");
		let (stream, response) = connect_async_tls_with_config(request, None, true, self.connector()?).await.map_err(classify_handshake)?;
		debug!(status = %response.status(), "websocket upgrade complete");

		Ok(Box::new(WebSocketSession::new(stream, self.idle_timeout, self.keepalive_interval)))
	}
}

/// Errors while opening the socket. Rejections by the server are fatal unless the
/// server itself is failing.
fn classify_handshake(err: WsError) -> ConnectionError {
	match err {
		WsError::Http(response) => {
			let status = response.status();
			match status.as_u16() {
				401 | 403 => ConnectionError::Unauthorized { status: status.as_u16() },
				code if status.is_server_error() => ConnectionError::ServerError(code),
				code => ConnectionError::Handshake(format!("unexpected HTTP {code}")),
			}
		}
		WsError::Url(e) => ConnectionError::InvalidEndpoint(e.to_string()),
		// A socket failing mid TLS handshake is a network blip, a rejected certificate is not
		WsError::Tls(e) if caused_by_io(&e) => ConnectionError::Network(e.to_string()),
		WsError::Tls(e) => ConnectionError::Tls(e.to_string()),
		// The peer hung up before answering the upgrade
		WsError::Protocol(e @ (ProtocolError::HandshakeIncomplete | ProtocolError::ResetWithoutClosingHandshake)) => {
			ConnectionError::RemoteClosed(e.to_string())
		}
		WsError::Protocol(e) => ConnectionError::Handshake(e.to_string()),
		WsError::HttpFormat(e) => ConnectionError::Handshake(e.to_string()),
		other => ConnectionError::Network(other.to_string()),
	}
}

fn caused_by_io(err: &(dyn std::error::Error + 'static)) -> bool {
	let mut current = Some(err);
	while let Some(e) = current {
		if e.is::<std::io::Error>() {
			return true;
		}
		current = e.source();
	}
	false
}

/// Errors on an established session are all worth a reconnect
fn classify_stream(err: WsError) -> ConnectionError {
	match err {
		WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::RemoteClosed(err.to_string()),
		other => ConnectionError::Network(other.to_string()),
	}
}

pub struct WebSocketSession {
	stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
	idle_timeout: Duration,
	keepalive: Interval,
	last_activity: Instant,
}

impl WebSocketSession {
	fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>, idle_timeout: Duration, keepalive_interval: Duration) -> Self {
		let mut keepalive = tokio::time::interval_at(Instant::now() + keepalive_interval, keepalive_interval);
		keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
		Self {
			stream,
			idle_timeout,
			keepalive,
			last_activity: Instant::now(),
		}
	}
}

#[async_trait::async_trait]
impl Session for WebSocketSession {
	async fn next_frame(&mut self) -> Option<Result<Bytes, ConnectionError>> {
		loop {
			let idle_deadline = self.last_activity + self.idle_timeout;
			tokio::select! {
				msg = self.stream.next() => {
					self.last_activity = Instant::now();
					match msg {
						Some(Ok(TungsteniteMessage::Binary(data))) => return Some(Ok(data)),
						Some(Ok(TungsteniteMessage::Ping(payload))) => {
							if let Err(e) = self.stream.send(TungsteniteMessage::Pong(payload)).await {
								return Some(Err(classify_stream(e)));
							}
						}
						Some(Ok(TungsteniteMessage::Text(text))) => {
							trace!(len = text.len(), "ignoring text frame");
						}
						Some(Ok(TungsteniteMessage::Close(frame))) => {
							let reason = frame.map_or_else(|| "no close frame".to_string(), |f| f.to_string());
							info!(%reason, "firehose closed the connection");
							return Some(Err(ConnectionError::RemoteClosed(reason)));
						}
						Some(Ok(_)) => {}
						Some(Err(e)) => return Some(Err(classify_stream(e))),
						None => return None,
					}
				}
				_ = self.keepalive.tick() => {
					if let Err(e) = self.stream.send(TungsteniteMessage::Ping(Bytes::new())).await {
						return Some(Err(classify_stream(e)));
					}
				}
				() = tokio::time::sleep_until(idle_deadline) => {
					return Some(Err(ConnectionError::Timeout {
						operation: "waiting for frames",
						after: self.idle_timeout,
					}));
				}
			}
		}
	}

	async fn close(&mut self) {
		match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
			Ok(Ok(())) => debug!("websocket closed"),
			Ok(Err(e)) => debug!(error = %e, "websocket close did not complete cleanly"),
			Err(_) => debug!("websocket close timed out"),
		}
	}
}
