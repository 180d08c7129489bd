use super::ConnectionError;
use bytes::Bytes;

/// Everything presented to the firehose when opening a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
	pub endpoint: String,
	pub token: String,
	pub subscription_id: String,
}

impl Handshake {
	/// `{endpoint}/firehose/{subscription_id}`
	pub fn url(&self) -> String {
		format!("{}/firehose/{}", self.endpoint.trim_end_matches('/'), self.subscription_id)
	}

	/// Value of the `Authorization` header. Tokens handed out by the platform
	/// usually carry the scheme already.
	pub fn authorization(&self) -> String {
		let token = self.token.trim();
		if token.get(..7).is_some_and(|scheme| scheme.eq_ignore_ascii_case("bearer ")) {
			token.to_string()
		} else {
			format!("bearer {token}")
		}
	}
}

/// Opens sessions against the firehose
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Session>, ConnectionError>;
}

/// One live connection yielding raw envelope frames
#[async_trait::async_trait]
pub trait Session: Send {
	/// Next binary frame. `None` once the peer is gone without an error.
	async fn next_frame(&mut self) -> Option<Result<Bytes, ConnectionError>>;

	async fn close(&mut self);
}
