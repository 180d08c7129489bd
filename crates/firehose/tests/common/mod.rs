#![allow(dead_code)]

use bytes::Bytes;
use firehose::connection::{ConnectionError, Handshake, Session, Transport};
use firehose::envelope::wire;
use firehose::{Sink, SinkError};
use prost::Message;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub enum Step {
	Frame(Bytes),
	Fail(ConnectionError),
	End,
}

pub enum Attempt {
	Session(Vec<Step>),
	Refuse(ConnectionError),
	/// The connect call never resolves
	Hang,
}

#[derive(Default)]
struct Counters {
	connects: AtomicUsize,
	closes: AtomicUsize,
	frames_served: AtomicUsize,
}

/// Plays back a fixed list of connection attempts. Once the script runs out, or a
/// session runs out of steps, it hangs like an idle firehose.
#[derive(Clone)]
pub struct ScriptedTransport {
	attempts: Arc<Mutex<VecDeque<Attempt>>>,
	handshakes: Arc<Mutex<Vec<Handshake>>>,
	counters: Arc<Counters>,
}

impl ScriptedTransport {
	pub fn new(attempts: Vec<Attempt>) -> Self {
		Self {
			attempts: Arc::new(Mutex::new(attempts.into())),
			handshakes: Arc::default(),
			counters: Arc::default(),
		}
	}

	pub fn single_session(steps: Vec<Step>) -> Self {
		Self::new(vec![Attempt::Session(steps)])
	}

	pub fn connects(&self) -> usize {
		self.counters.connects.load(Ordering::SeqCst)
	}

	pub fn closes(&self) -> usize {
		self.counters.closes.load(Ordering::SeqCst)
	}

	pub fn frames_served(&self) -> usize {
		self.counters.frames_served.load(Ordering::SeqCst)
	}

	pub fn handshakes(&self) -> Vec<Handshake> {
		self.handshakes.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
	async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Session>, ConnectionError> {
		self.counters.connects.fetch_add(1, Ordering::SeqCst);
		self.handshakes.lock().unwrap().push(handshake.clone());

		let next = self.attempts.lock().unwrap().pop_front();
		match next {
			Some(Attempt::Refuse(err)) => Err(err),
			Some(Attempt::Hang) => std::future::pending().await,
			Some(Attempt::Session(steps)) => Ok(Box::new(ScriptedSession {
				steps: steps.into(),
				counters: self.counters.clone(),
			})),
			None => Ok(Box::new(ScriptedSession {
				steps: VecDeque::new(),
				counters: self.counters.clone(),
			})),
		}
	}
}

struct ScriptedSession {
	steps: VecDeque<Step>,
	counters: Arc<Counters>,
}

#[async_trait::async_trait]
impl Session for ScriptedSession {
	async fn next_frame(&mut self) -> Option<Result<Bytes, ConnectionError>> {
		match self.steps.pop_front() {
			Some(Step::Frame(frame)) => {
				self.counters.frames_served.fetch_add(1, Ordering::SeqCst);
				Some(Ok(frame))
			}
			Some(Step::Fail(err)) => Some(Err(err)),
			Some(Step::End) => None,
			None => std::future::pending().await,
		}
	}

	async fn close(&mut self) {
		self.counters.closes.fetch_add(1, Ordering::SeqCst);
	}
}

/// Collects lines; can be stalled behind a gate or told to fail at a given write
#[derive(Clone, Default)]
pub struct RecordingSink {
	lines: Arc<Mutex<Vec<String>>>,
	gate: Option<Arc<Semaphore>>,
	fail_at: Option<usize>,
}

impl RecordingSink {
	/// Every write waits for a permit from the returned semaphore
	pub fn gated() -> (Self, Arc<Semaphore>) {
		let gate = Arc::new(Semaphore::new(0));
		let sink = Self {
			gate: Some(gate.clone()),
			..Self::default()
		};
		(sink, gate)
	}

	/// The write after `written` successful ones fails
	pub fn failing_after(written: usize) -> Self {
		Self {
			fail_at: Some(written),
			..Self::default()
		}
	}

	pub fn lines(&self) -> Vec<String> {
		self.lines.lock().unwrap().clone()
	}

	pub fn len(&self) -> usize {
		self.lines.lock().unwrap().len()
	}

	pub async fn wait_for_lines(&self, count: usize) {
		tokio::time::timeout(Duration::from_secs(5), async {
			while self.len() < count {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("sink never received the expected lines");
	}
}

#[async_trait::async_trait]
impl Sink for RecordingSink {
	async fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
		if let Some(gate) = &self.gate {
			gate.acquire().await.expect("gate closed").forget();
		}
		let mut lines = self.lines.lock().unwrap();
		if self.fail_at == Some(lines.len()) {
			return Err(SinkError::Closed);
		}
		lines.push(line.to_string());
		Ok(())
	}
}

fn envelope(event_type: wire::EventType) -> wire::Envelope {
	wire::Envelope {
		origin: Some("test".to_string()),
		event_type: Some(event_type as i32),
		timestamp: Some(1_000_000_000),
		..wire::Envelope::default()
	}
}

/// ValueMetric frame rendered as `... ValueMetric seq=<n> count`
pub fn metric(seq: u32) -> Bytes {
	let mut env = envelope(wire::EventType::ValueMetric);
	env.value_metric = Some(wire::ValueMetric {
		name: Some("seq".to_string()),
		value: Some(f64::from(seq)),
		unit: Some("count".to_string()),
	});
	Bytes::from(env.encode_to_vec())
}

pub fn log(message: &str) -> Bytes {
	let mut env = envelope(wire::EventType::LogMessage);
	env.log_message = Some(wire::LogMessage {
		message: Some(message.as_bytes().to_vec()),
		message_type: Some(wire::LogMessageType::Out as i32),
		timestamp: Some(1_000_000_000),
		app_id: Some("app-1".to_string()),
		source_type: Some("APP".to_string()),
		source_instance: Some("0".to_string()),
	});
	Bytes::from(env.encode_to_vec())
}

pub fn counter(name: &str, total: u64) -> Bytes {
	let mut env = envelope(wire::EventType::CounterEvent);
	env.counter_event = Some(wire::CounterEvent {
		name: Some(name.to_string()),
		delta: Some(1),
		total: Some(total),
	});
	Bytes::from(env.encode_to_vec())
}

/// A well-formed frame of a type the client does not decode
pub fn container_metric() -> Bytes {
	let mut env = envelope(wire::EventType::ContainerMetric);
	env.container_metric = Some(wire::ContainerMetric {
		application_id: Some("app-1".to_string()),
		instance_index: Some(0),
	});
	Bytes::from(env.encode_to_vec())
}

pub fn seq_of(line: &str) -> u32 {
	let start = line.find("seq=").expect("not a metric line") + 4;
	let rest = &line[start..];
	let end = rest.find(' ').unwrap_or(rest.len());
	rest[..end].parse().expect("seq is not a number")
}
