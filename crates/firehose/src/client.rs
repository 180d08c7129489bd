//! Wires the connection, pump, consumer and sink together and owns the run/stop
//! lifecycle.

mod state;

pub use state::{transition, ClientState, StateError, StateTracker, StateTransition};

use crate::config::{ClientConfig, ClientOptions, ConfigError};
use crate::connection::{ConnectionManager, Handshake, Transport, WebSocketTransport};
use crate::consumer::Consumer;
use crate::filter::Filter;
use crate::pump::Pump;
use crate::sink::Sink;
use crate::stats::StreamStats;
use crate::FirehoseError;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builds a validated [`Client`]; nothing is connected until [`Client::start`].
pub struct ClientBuilder {
	endpoint: String,
	token: String,
	options: ClientOptions,
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
	#[must_use]
	pub fn options(mut self, options: ClientOptions) -> Self {
		self.options = options;
		self
	}

	#[must_use]
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = config;
		self
	}

	/// Replace the WebSocket transport, e.g. with a scripted one in tests
	#[must_use]
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn build<S: Sink + 'static>(self, sink: S) -> Result<Client<S>, ConfigError> {
		if self.endpoint.trim().is_empty() {
			return Err(ConfigError::Missing("endpoint"));
		}
		if self.token.trim().is_empty() {
			return Err(ConfigError::Missing("auth token"));
		}
		self.config.validate()?;
		let filter = Filter::from_options(&self.options)?;
		let subscription_id = subscription_id(&self.options.subscription_id)?;

		let transport = self.transport.unwrap_or_else(|| Arc::new(WebSocketTransport::new(&self.config)));

		Ok(Client {
			handshake: Handshake {
				endpoint: self.endpoint,
				token: self.token,
				subscription_id,
			},
			options: self.options,
			config: self.config,
			filter,
			transport,
			sink,
			cancel: CancellationToken::new(),
			state: Arc::new(StateTracker::new()),
			stats: Arc::new(StreamStats::default()),
		})
	}
}

/// Clients sharing an id split the stream; without one this client gets its own
/// group and therefore the full stream.
fn subscription_id(requested: &str) -> Result<String, ConfigError> {
	let requested = requested.trim();
	if requested.is_empty() {
		return Ok(format!("nozzle-{}", uuid::Uuid::new_v4()));
	}
	if let Some(bad) = requested.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))) {
		return Err(ConfigError::Invalid {
			field: "subscription_id",
			reason: format!("character {bad:?} is not allowed"),
		});
	}
	Ok(requested.to_string())
}

/// A single firehose nozzle run
pub struct Client<S> {
	handshake: Handshake,
	options: ClientOptions,
	config: ClientConfig,
	filter: Filter,
	transport: Arc<dyn Transport>,
	sink: S,
	cancel: CancellationToken,
	state: Arc<StateTracker>,
	stats: Arc<StreamStats>,
}

impl Client<()> {
	pub fn builder(endpoint: impl Into<String>, token: impl Into<String>) -> ClientBuilder {
		ClientBuilder {
			endpoint: endpoint.into(),
			token: token.into(),
			options: ClientOptions::default(),
			config: ClientConfig::default(),
			transport: None,
		}
	}
}

impl<S: Sink + 'static> Client<S> {
	pub fn stop_handle(&self) -> StopHandle {
		StopHandle {
			cancel: self.cancel.clone(),
			state: self.state.subscribe(),
		}
	}

	pub fn state(&self) -> watch::Receiver<ClientState> {
		self.state.subscribe()
	}

	pub fn stats(&self) -> Arc<StreamStats> {
		self.stats.clone()
	}

	pub fn subscription_id(&self) -> &str {
		&self.handshake.subscription_id
	}

	pub fn filter(&self) -> Filter {
		self.filter
	}

	/// Stream until stopped or a fatal error occurs.
	///
	/// Resolves with `Ok` after [`StopHandle::stop`], with the fatal connection or
	/// output error otherwise.
	pub async fn start(self) -> Result<(), FirehoseError> {
		let Self {
			handshake,
			options,
			config,
			filter,
			transport,
			sink,
			cancel,
			state,
			stats,
		} = self;

		state.apply(StateTransition::Start)?;
		if cancel.is_cancelled() {
			state.apply(StateTransition::Stop)?;
			return Ok(());
		}

		info!(
			endpoint = %handshake.endpoint,
			subscription_id = %handshake.subscription_id,
			?filter,
			"starting the nozzle"
		);

		let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
		let manager = ConnectionManager::new(transport, handshake, config.connect_timeout, config.retry);
		let pump = Pump::new(manager, queue_tx, state.clone(), stats.clone(), options.debug, cancel.clone());
		let consumer = Consumer::new(queue_rx, filter, sink, stats.clone(), cancel.clone());

		let pump_task = tokio::spawn(pump.run());
		let consumer_task = tokio::spawn(consumer.run());
		let (pump_result, consumer_result) = tokio::join!(pump_task, consumer_task);

		cancel.cancel();
		state.apply(StateTransition::Stop)?;

		let summary = stats.snapshot();
		info!(
			frames = summary.frames_received,
			dropped = summary.frames_dropped,
			written = summary.lines_written,
			reconnects = summary.reconnects,
			"nozzle stopped"
		);

		pump_result??;
		consumer_result??;
		Ok(())
	}
}

/// Stops a running [`Client`] from anywhere
#[derive(Debug, Clone)]
pub struct StopHandle {
	cancel: CancellationToken,
	state: watch::Receiver<ClientState>,
}

impl StopHandle {
	/// Cancel the run and wait until both pipeline tasks are gone. No line reaches
	/// the sink after this returns. Calling it again is a no-op.
	pub async fn stop(&self) {
		self.cancel.cancel();
		let mut state = self.state.clone();
		// Idle means start() never ran, so there is nothing to wait for
		let _ = state.wait_for(|s| matches!(s, ClientState::Idle | ClientState::Stopped)).await;
	}

	pub fn is_stopping(&self) -> bool {
		self.cancel.is_cancelled()
	}
}
