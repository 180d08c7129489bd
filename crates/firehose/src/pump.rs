use crate::client::{StateTracker, StateTransition};
use crate::connection::{ConnectionError, ConnectionManager, ErrorClassification};
use crate::envelope::Envelope;
use crate::stats::StreamStats;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Reads frames off the active session, decodes them and feeds the queue
pub struct Pump {
	manager: ConnectionManager,
	queue: mpsc::Sender<Envelope>,
	state: Arc<StateTracker>,
	stats: Arc<StreamStats>,
	debug: bool,
	cancel: CancellationToken,
}

impl Pump {
	pub fn new(
		manager: ConnectionManager,
		queue: mpsc::Sender<Envelope>,
		state: Arc<StateTracker>,
		stats: Arc<StreamStats>,
		debug: bool,
		cancel: CancellationToken,
	) -> Self {
		Self {
			manager,
			queue,
			state,
			stats,
			debug,
			cancel,
		}
	}

	/// Runs until cancelled, the consumer goes away, or the connection fails fatally.
	/// A fatal failure cancels the whole run.
	pub async fn run(mut self) -> Result<(), ConnectionError> {
		let result = self.pump().await;
		self.manager.disconnect().await;

		if let Err(e) = &result {
			warn!(error = %e, "fatal firehose connection error, stopping");
			self.cancel.cancel();
		}
		debug!("pump stopped");
		result
	}

	async fn pump(&mut self) -> Result<(), ConnectionError> {
		loop {
			if !self.manager.is_connected() {
				tokio::select! {
					biased;
					() = self.cancel.cancelled() => return Ok(()),
					connected = self.manager.connect_with_retry() => connected?,
				}
				self.transition(StateTransition::SessionEstablished);
			}

			let frame = tokio::select! {
				biased;
				() = self.cancel.cancelled() => return Ok(()),
				frame = self.manager.next_frame() => frame,
			};

			match frame {
				Some(Ok(frame)) => {
					if !self.forward(&frame).await {
						return Ok(());
					}
				}
				Some(Err(e)) if e.is_retryable() => self.session_lost(&e.to_string()).await,
				Some(Err(e)) => return Err(e),
				None => self.session_lost("stream ended").await,
			}
		}
	}

	/// Decode one frame and enqueue it, waiting for room in the queue.
	/// Returns false once the pipeline is shutting down.
	async fn forward(&mut self, frame: &[u8]) -> bool {
		self.stats.frame_received();

		let envelope = match Envelope::decode(frame) {
			Ok(envelope) => envelope,
			Err(e) => {
				self.stats.frame_dropped();
				if self.debug {
					warn!(error = %e, len = frame.len(), "dropping undecodable frame");
				} else {
					trace!(error = %e, "dropping undecodable frame");
				}
				return true;
			}
		};
		self.stats.envelope_decoded();

		tokio::select! {
			biased;
			() = self.cancel.cancelled() => false,
			sent = self.queue.send(envelope) => sent.is_ok(),
		}
	}

	async fn session_lost(&mut self, cause: &str) {
		info!(%cause, "firehose session lost, reconnecting");
		self.manager.session_lost().await;
		self.stats.reconnect();
		self.transition(StateTransition::SessionLost);
	}

	fn transition(&self, event: StateTransition) {
		if let Err(e) = self.state.apply(event) {
			debug!(error = %e, "ignored state transition");
		}
	}
}
