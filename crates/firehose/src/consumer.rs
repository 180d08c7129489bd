use crate::envelope::{format_line, Envelope};
use crate::filter::Filter;
use crate::sink::{Sink, SinkError};
use crate::stats::StreamStats;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Drains the queue in order, filters, formats and writes to the sink
pub struct Consumer<S> {
	queue: mpsc::Receiver<Envelope>,
	filter: Filter,
	sink: S,
	stats: Arc<StreamStats>,
	cancel: CancellationToken,
}

impl<S: Sink> Consumer<S> {
	pub fn new(queue: mpsc::Receiver<Envelope>, filter: Filter, sink: S, stats: Arc<StreamStats>, cancel: CancellationToken) -> Self {
		Self {
			queue,
			filter,
			sink,
			stats,
			cancel,
		}
	}

	/// A failing sink cancels the whole run; whatever is still queued is discarded.
	pub async fn run(mut self) -> Result<(), SinkError> {
		let result = self.consume().await;

		if let Err(e) = &result {
			error!(error = %e, "output failed, stopping");
			self.cancel.cancel();
		}
		self.queue.close();
		debug!("consumer stopped");
		result
	}

	async fn consume(&mut self) -> Result<(), SinkError> {
		loop {
			let envelope = tokio::select! {
				biased;
				() = self.cancel.cancelled() => return Ok(()),
				next = self.queue.recv() => match next {
					Some(envelope) => envelope,
					None => return Ok(()),
				},
			};

			if !self.filter.accept(&envelope) {
				self.stats.envelope_filtered();
				continue;
			}

			let line = format_line(&envelope);
			tokio::select! {
				biased;
				() = self.cancel.cancelled() => return Ok(()),
				written = self.sink.write_line(&line) => written?,
			}
			self.stats.line_written();
		}
	}
}
