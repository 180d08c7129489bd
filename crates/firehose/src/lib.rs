//! Streaming client for the platform telemetry firehose.
//!
//! A [`Client`] holds one authenticated WebSocket session to the firehose, decodes
//! every binary frame into an [`Envelope`], and hands envelopes through a bounded
//! queue to a consumer that filters, formats and writes them to a [`Sink`]. Lost
//! sessions are re-established with exponential backoff; authentication failures
//! end the run.

pub mod client;
pub mod config;
pub mod connection;
mod consumer;
pub mod envelope;
pub mod filter;
mod pump;
pub mod sink;
pub mod stats;

pub use client::{Client, ClientBuilder, ClientState, StopHandle};
pub use config::{ClientConfig, ClientOptions, ConfigError};
pub use connection::{ConnectionError, ErrorClassification, Handshake, RetryConfig, Session, Transport};
pub use envelope::{format_line, Envelope, EventType};
pub use filter::Filter;
pub use sink::{Sink, SinkError, WriterSink};
pub use stats::{StatsSnapshot, StreamStats};

use thiserror::Error;

/// Everything that can end a nozzle run
#[derive(Debug, Error)]
pub enum FirehoseError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("Connection error: {0}")]
	Connection(#[from] ConnectionError),

	#[error("Output error: {0}")]
	Sink(#[from] SinkError),

	#[error("State error: {0}")]
	State(#[from] client::StateError),

	#[error("Pipeline task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
}

impl FirehoseError {
	/// Unauthorized or otherwise unrecoverable connection failures
	pub fn is_fatal_connection(&self) -> bool {
		matches!(self, Self::Connection(e) if e.is_fatal())
	}
}
