use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("Authentication rejected (HTTP {status})")]
	Unauthorized { status: u16 },

	#[error("Handshake failed: {0}")]
	Handshake(String),

	#[error("Invalid endpoint: {0}")]
	InvalidEndpoint(String),

	#[error("TLS setup failed: {0}")]
	Tls(String),

	#[error("Server error during upgrade (HTTP {0})")]
	ServerError(u16),

	#[error("Network error: {0}")]
	Network(String),

	#[error("Timeout while {operation} (after {after:?})")]
	Timeout { operation: &'static str, after: Duration },

	#[error("Connection closed by remote: {0}")]
	RemoteClosed(String),
}

/// Decides between reconnecting and giving up
pub trait ErrorClassification {
	fn is_retryable(&self) -> bool;

	fn is_fatal(&self) -> bool {
		!self.is_retryable()
	}
}

impl ErrorClassification for ConnectionError {
	fn is_retryable(&self) -> bool {
		match self {
			Self::ServerError(_) | Self::Network(_) | Self::Timeout { .. } | Self::RemoteClosed(_) => true,
			Self::Unauthorized { .. } | Self::Handshake(_) | Self::InvalidEndpoint(_) | Self::Tls(_) => false,
		}
	}
}
