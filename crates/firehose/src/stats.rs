use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the pump and the consumer
#[derive(Debug, Default)]
pub struct StreamStats {
	frames_received: AtomicU64,
	frames_dropped: AtomicU64,
	envelopes_decoded: AtomicU64,
	envelopes_filtered: AtomicU64,
	lines_written: AtomicU64,
	reconnects: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
	pub frames_received: u64,
	pub frames_dropped: u64,
	pub envelopes_decoded: u64,
	pub envelopes_filtered: u64,
	pub lines_written: u64,
	pub reconnects: u64,
}

impl StreamStats {
	pub(crate) fn frame_received(&self) {
		self.frames_received.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn frame_dropped(&self) {
		self.frames_dropped.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn envelope_decoded(&self) {
		self.envelopes_decoded.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn envelope_filtered(&self) {
		self.envelopes_filtered.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn line_written(&self) {
		self.lines_written.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn reconnect(&self) {
		self.reconnects.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> StatsSnapshot {
		StatsSnapshot {
			frames_received: self.frames_received.load(Ordering::Relaxed),
			frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
			envelopes_decoded: self.envelopes_decoded.load(Ordering::Relaxed),
			envelopes_filtered: self.envelopes_filtered.load(Ordering::Relaxed),
			lines_written: self.lines_written.load(Ordering::Relaxed),
			reconnects: self.reconnects.load(Ordering::Relaxed),
		}
	}
}
