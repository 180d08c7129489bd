//! Session lifecycle against the firehose: connect, reconnect with backoff, teardown.

mod error;
mod retry;
mod transport;
mod websocket;

pub use error::{ConnectionError, ErrorClassification};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::{Handshake, Session, Transport};
pub use websocket::{WebSocketSession, WebSocketTransport};

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Owns the single active session and every way of getting rid of it
pub struct ConnectionManager {
	transport: Arc<dyn Transport>,
	handshake: Handshake,
	connect_timeout: Duration,
	retry: RetryPolicy,
	session: Option<Box<dyn Session>>,
	pending_delay: Option<Duration>,
}

impl ConnectionManager {
	pub fn new(transport: Arc<dyn Transport>, handshake: Handshake, connect_timeout: Duration, retry: RetryConfig) -> Self {
		Self {
			transport,
			handshake,
			connect_timeout,
			retry: RetryPolicy::new(retry),
			session: None,
			pending_delay: None,
		}
	}

	pub const fn is_connected(&self) -> bool {
		self.session.is_some()
	}

	/// Single attempt bounded by the connect deadline
	pub async fn connect(&mut self) -> Result<(), ConnectionError> {
		if self.session.is_some() {
			return Ok(());
		}
		let session = tokio::time::timeout(self.connect_timeout, self.transport.connect(&self.handshake))
			.await
			.map_err(|_| ConnectionError::Timeout {
				operation: "connecting",
				after: self.connect_timeout,
			})??;
		self.session = Some(session);
		Ok(())
	}

	/// Keep connecting until a session is up or the failure is fatal.
	///
	/// Waits out any backoff scheduled by a lost session first. Dropping the future
	/// abandons the attempt without leaving a session behind.
	pub async fn connect_with_retry(&mut self) -> Result<(), ConnectionError> {
		loop {
			if let Some(delay) = self.pending_delay.take() {
				debug!(?delay, attempt = self.retry.attempts(), "backing off before reconnecting");
				tokio::time::sleep(delay).await;
			}

			match self.connect().await {
				Ok(()) => {
					info!(url = %self.handshake.url(), subscription_id = %self.handshake.subscription_id, "firehose session established");
					return Ok(());
				}
				Err(e) if e.is_retryable() => {
					warn!(error = %e, attempt = self.retry.attempts() + 1, "firehose connection attempt failed");
					self.pending_delay = Some(self.retry.next_delay());
				}
				Err(e) => return Err(e),
			}
		}
	}

	/// Next raw frame of the active session
	pub async fn next_frame(&mut self) -> Option<Result<Bytes, ConnectionError>> {
		let frame = self.session.as_mut()?.next_frame().await;
		if matches!(frame, Some(Ok(_))) && self.retry.attempts() > 0 {
			self.retry.reset();
		}
		frame
	}

	/// Drop the current session after a transient failure and schedule the backoff
	/// for the next [`Self::connect_with_retry`].
	pub async fn session_lost(&mut self) {
		self.disconnect().await;
		self.pending_delay = Some(self.retry.next_delay());
	}

	/// Close the active session, if any. Safe to call any number of times.
	pub async fn disconnect(&mut self) {
		if let Some(mut session) = self.session.take() {
			session.close().await;
			debug!("firehose session closed");
		}
	}
}
