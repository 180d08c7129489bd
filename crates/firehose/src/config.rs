use crate::connection::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Raised before any connection attempt is made
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error(transparent)]
	UnknownFilter(#[from] crate::envelope::UnknownEventType),

	#[error("Missing required option: {0}")]
	Missing(&'static str),

	#[error("Invalid value for {field}: {reason}")]
	Invalid { field: &'static str, reason: String },
}

/// Options a user picks for one nozzle run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
	/// Verbose diagnostics, including dropped frames
	pub debug: bool,
	/// Display every message, whatever `filter` says
	pub no_filter: bool,
	/// Event type name to display; empty means all
	pub filter: String,
	/// Consumer group shared by clients that split the stream between them
	pub subscription_id: String,
}

impl ClientOptions {
	#[must_use]
	pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
		self.filter = filter.into();
		self
	}

	#[must_use]
	pub const fn with_no_filter(mut self, no_filter: bool) -> Self {
		self.no_filter = no_filter;
		self
	}

	#[must_use]
	pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
		self.subscription_id = subscription_id.into();
		self
	}

	#[must_use]
	pub const fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}
}

/// Tuning knobs for the streaming pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Capacity of the queue between the pump and the consumer
	pub queue_capacity: usize,
	/// Deadline for the TCP connect, TLS and upgrade handshake together
	pub connect_timeout: Duration,
	/// A session that yields nothing (not even a ping) for this long is considered dead
	pub idle_timeout: Duration,
	/// Interval of client-initiated pings
	pub keepalive_interval: Duration,
	/// Accept any server certificate
	pub skip_tls_verification: bool,
	pub retry: RetryConfig,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			queue_capacity: 1024,
			connect_timeout: Duration::from_secs(10),
			idle_timeout: Duration::from_secs(120),
			keepalive_interval: Duration::from_secs(30),
			skip_tls_verification: false,
			retry: RetryConfig::default(),
		}
	}
}

impl ClientConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.queue_capacity == 0 {
			return Err(ConfigError::Invalid {
				field: "queue_capacity",
				reason: "must be at least 1".to_string(),
			});
		}
		for (field, value) in [
			("connect_timeout", self.connect_timeout),
			("idle_timeout", self.idle_timeout),
			("keepalive_interval", self.keepalive_interval),
		] {
			if value.is_zero() {
				return Err(ConfigError::Invalid {
					field,
					reason: "must be non-zero".to_string(),
				});
			}
		}
		self.retry.validate()
	}
}
