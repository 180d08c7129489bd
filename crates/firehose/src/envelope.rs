//! Typed telemetry envelopes and their decoding from firehose frames.

mod format;
pub mod wire;

use chrono::{DateTime, TimeZone, Utc};
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use format::format_line;

/// Why a single frame could not be turned into an [`Envelope`]
#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("Malformed protobuf frame: {0}")]
	Protobuf(#[from] prost::DecodeError),

	#[error("Envelope is missing required field `{0}`")]
	MissingField(&'static str),

	#[error("Unsupported event type {0}")]
	UnsupportedEventType(i32),

	#[error("Event type {event_type} carries no {event_type} payload")]
	MissingPayload { event_type: EventType },

	#[error("Event type {event_type} also carries a {extra} payload")]
	ConflictingPayload { event_type: EventType, extra: &'static str },
}

/// Event types this client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
	LogMessage,
	ValueMetric,
	CounterEvent,
	HttpStartStop,
	Error,
}

impl EventType {
	pub const ALL: [Self; 5] = [Self::LogMessage, Self::ValueMetric, Self::CounterEvent, Self::HttpStartStop, Self::Error];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::LogMessage => "LogMessage",
			Self::ValueMetric => "ValueMetric",
			Self::CounterEvent => "CounterEvent",
			Self::HttpStartStop => "HttpStartStop",
			Self::Error => "Error",
		}
	}

	const fn from_wire(event_type: wire::EventType) -> Option<Self> {
		match event_type {
			wire::EventType::LogMessage => Some(Self::LogMessage),
			wire::EventType::ValueMetric => Some(Self::ValueMetric),
			wire::EventType::CounterEvent => Some(Self::CounterEvent),
			wire::EventType::HttpStartStop => Some(Self::HttpStartStop),
			wire::EventType::Error => Some(Self::Error),
			wire::EventType::HttpStart | wire::EventType::HttpStop | wire::EventType::ContainerMetric => None,
		}
	}
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown event type `{0}`, expected one of LogMessage, ValueMetric, CounterEvent, HttpStartStop, Error")]
pub struct UnknownEventType(pub String);

/// Case-sensitive: `valuemetric` is not a valid name.
impl FromStr for EventType {
	type Err = UnknownEventType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or_else(|| UnknownEventType(s.to_string()))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
	Out,
	Err,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
	pub message: Vec<u8>,
	pub level: LogLevel,
	pub source_type: String,
	pub source_instance: String,
	pub app_id: Option<String>,
	pub emitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueMetric {
	pub name: String,
	pub value: f64,
	pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEvent {
	pub name: String,
	pub delta: u64,
	pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerType {
	Client,
	Server,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStartStop {
	pub started_at: Option<DateTime<Utc>>,
	pub stopped_at: Option<DateTime<Utc>>,
	pub request_id: Option<uuid::Uuid>,
	pub method: Option<String>,
	pub uri: String,
	pub status_code: Option<i32>,
	pub peer_type: Option<PeerType>,
	pub remote_address: Option<String>,
	pub user_agent: Option<String>,
	pub content_length: Option<i64>,
	pub application_id: Option<uuid::Uuid>,
}

impl HttpStartStop {
	pub fn duration(&self) -> Option<chrono::Duration> {
		Some(self.stopped_at? - self.started_at?)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
	pub source: String,
	pub code: i32,
	pub message: String,
}

/// The single populated variant of an envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	LogMessage(LogMessage),
	ValueMetric(ValueMetric),
	CounterEvent(CounterEvent),
	HttpStartStop(HttpStartStop),
	Error(ErrorEvent),
}

impl Payload {
	pub const fn event_type(&self) -> EventType {
		match self {
			Self::LogMessage(_) => EventType::LogMessage,
			Self::ValueMetric(_) => EventType::ValueMetric,
			Self::CounterEvent(_) => EventType::CounterEvent,
			Self::HttpStartStop(_) => EventType::HttpStartStop,
			Self::Error(_) => EventType::Error,
		}
	}
}

/// One telemetry record received from the firehose.
///
/// The event type is derived from the payload, so the two can never disagree once
/// an envelope exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
	pub origin: String,
	pub timestamp: Option<DateTime<Utc>>,
	pub payload: Payload,
	pub deployment: Option<String>,
	pub job: Option<String>,
	pub index: Option<String>,
	pub ip: Option<String>,
	pub tags: HashMap<String, String>,
}

impl Envelope {
	pub fn new(origin: impl Into<String>, payload: Payload) -> Self {
		Self {
			origin: origin.into(),
			timestamp: None,
			payload,
			deployment: None,
			job: None,
			index: None,
			ip: None,
			tags: HashMap::new(),
		}
	}

	#[must_use]
	pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}

	pub const fn event_type(&self) -> EventType {
		self.payload.event_type()
	}

	/// Decode a binary frame
	pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
		let raw = wire::Envelope::decode(frame)?;
		Self::try_from(raw)
	}
}

impl TryFrom<wire::Envelope> for Envelope {
	type Error = DecodeError;

	fn try_from(raw: wire::Envelope) -> Result<Self, Self::Error> {
		let origin = raw.origin.ok_or(DecodeError::MissingField("origin"))?;
		let raw_type = raw.event_type.ok_or(DecodeError::MissingField("eventType"))?;
		let event_type = wire::EventType::try_from(raw_type)
			.ok()
			.and_then(EventType::from_wire)
			.ok_or(DecodeError::UnsupportedEventType(raw_type))?;

		let present = [
			("LogMessage", raw.log_message.is_some()),
			("ValueMetric", raw.value_metric.is_some()),
			("CounterEvent", raw.counter_event.is_some()),
			("HttpStartStop", raw.http_start_stop.is_some()),
			("Error", raw.error.is_some()),
			("ContainerMetric", raw.container_metric.is_some()),
		];
		if let Some(&(extra, _)) = present.iter().find(|(name, set)| *set && *name != event_type.as_str()) {
			return Err(DecodeError::ConflictingPayload { event_type, extra });
		}

		let missing = DecodeError::MissingPayload { event_type };
		let payload = match event_type {
			EventType::LogMessage => Payload::LogMessage(raw.log_message.ok_or(missing)?.into()),
			EventType::ValueMetric => Payload::ValueMetric(raw.value_metric.ok_or(missing)?.into()),
			EventType::CounterEvent => Payload::CounterEvent(raw.counter_event.ok_or(missing)?.into()),
			EventType::HttpStartStop => Payload::HttpStartStop(raw.http_start_stop.ok_or(missing)?.into()),
			EventType::Error => Payload::Error(raw.error.ok_or(missing)?.into()),
		};

		Ok(Self {
			origin,
			timestamp: raw.timestamp.map(from_nanos),
			payload,
			deployment: raw.deployment,
			job: raw.job,
			index: raw.index,
			ip: raw.ip,
			tags: raw.tags,
		})
	}
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
	Utc.timestamp_nanos(nanos)
}

impl From<wire::LogMessage> for LogMessage {
	fn from(raw: wire::LogMessage) -> Self {
		let level = match raw.message_type.map(wire::LogMessageType::try_from) {
			Some(Ok(wire::LogMessageType::Err)) => LogLevel::Err,
			_ => LogLevel::Out,
		};
		Self {
			message: raw.message.unwrap_or_default(),
			level,
			source_type: raw.source_type.unwrap_or_default(),
			source_instance: raw.source_instance.unwrap_or_default(),
			app_id: raw.app_id,
			emitted_at: raw.timestamp.map(from_nanos),
		}
	}
}

impl From<wire::ValueMetric> for ValueMetric {
	fn from(raw: wire::ValueMetric) -> Self {
		Self {
			name: raw.name.unwrap_or_default(),
			value: raw.value.unwrap_or_default(),
			unit: raw.unit.unwrap_or_default(),
		}
	}
}

impl From<wire::CounterEvent> for CounterEvent {
	fn from(raw: wire::CounterEvent) -> Self {
		Self {
			name: raw.name.unwrap_or_default(),
			delta: raw.delta.unwrap_or_default(),
			total: raw.total.unwrap_or_default(),
		}
	}
}

impl From<wire::Error> for ErrorEvent {
	fn from(raw: wire::Error) -> Self {
		Self {
			source: raw.source.unwrap_or_default(),
			code: raw.code.unwrap_or_default(),
			message: raw.message.unwrap_or_default(),
		}
	}
}

impl From<wire::Uuid> for uuid::Uuid {
	fn from(raw: wire::Uuid) -> Self {
		let low = raw.low.unwrap_or_default().to_le_bytes();
		let high = raw.high.unwrap_or_default().to_le_bytes();
		let mut bytes = [0u8; 16];
		bytes[..8].copy_from_slice(&low);
		bytes[8..].copy_from_slice(&high);
		Self::from_bytes(bytes)
	}
}

impl From<wire::HttpStartStop> for HttpStartStop {
	fn from(raw: wire::HttpStartStop) -> Self {
		let peer_type = raw.peer_type.and_then(|p| wire::PeerType::try_from(p).ok()).map(|p| match p {
			wire::PeerType::Client => PeerType::Client,
			wire::PeerType::Server => PeerType::Server,
		});
		let method = raw.method.and_then(|m| wire::Method::try_from(m).ok()).map(method_name);

		Self {
			started_at: raw.start_timestamp.map(from_nanos),
			stopped_at: raw.stop_timestamp.map(from_nanos),
			request_id: raw.request_id.map(Into::into),
			method,
			uri: raw.uri.unwrap_or_default(),
			status_code: raw.status_code,
			peer_type,
			remote_address: raw.remote_address,
			user_agent: raw.user_agent,
			content_length: raw.content_length,
			application_id: raw.application_id.map(Into::into),
		}
	}
}

fn method_name(method: wire::Method) -> String {
	match method {
		wire::Method::BaselineControl => "BASELINE-CONTROL".to_string(),
		wire::Method::VersionControl => "VERSION-CONTROL".to_string(),
		other => format!("{other:?}").to_uppercase(),
	}
}
