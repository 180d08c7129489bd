//! Protobuf schema of the frames the firehose sends.
//!
//! Field tags follow the platform's telemetry envelope definition. Every field is
//! decoded as optional so that validation happens in one place, when the raw
//! message is lifted into [`crate::Envelope`].

use prost::{Enumeration, Message};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum EventType {
	HttpStart = 2,
	HttpStop = 3,
	HttpStartStop = 4,
	LogMessage = 5,
	ValueMetric = 6,
	CounterEvent = 7,
	Error = 8,
	ContainerMetric = 9,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum LogMessageType {
	Out = 1,
	Err = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum PeerType {
	Client = 1,
	Server = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum Method {
	Get = 1,
	Post = 2,
	Put = 3,
	Delete = 4,
	Head = 5,
	Acl = 6,
	BaselineControl = 7,
	Bind = 8,
	Checkin = 9,
	Checkout = 10,
	Connect = 11,
	Copy = 12,
	Debug = 13,
	Label = 14,
	Link = 15,
	Lock = 16,
	Merge = 17,
	Mkactivity = 18,
	Mkcalendar = 19,
	Mkcol = 20,
	Mkredirectref = 21,
	Mkworkspace = 22,
	Move = 23,
	Options = 24,
	Orderpatch = 25,
	Patch = 26,
	Pri = 27,
	Propfind = 28,
	Proppatch = 29,
	Rebind = 30,
	Report = 31,
	Search = 32,
	Showmethod = 33,
	Spacejump = 34,
	Textsearch = 35,
	Trace = 36,
	Track = 37,
	Unbind = 38,
	Uncheckout = 39,
	Unlink = 40,
	Unlock = 41,
	Update = 42,
	Updateredirectref = 43,
	VersionControl = 44,
}

/// Top level frame
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
	#[prost(string, optional, tag = "1")]
	pub origin: Option<String>,

	#[prost(enumeration = "EventType", optional, tag = "2")]
	pub event_type: Option<i32>,

	/// Nanoseconds since the unix epoch
	#[prost(int64, optional, tag = "6")]
	pub timestamp: Option<i64>,

	#[prost(message, optional, tag = "7")]
	pub http_start_stop: Option<HttpStartStop>,

	#[prost(message, optional, tag = "8")]
	pub log_message: Option<LogMessage>,

	#[prost(message, optional, tag = "9")]
	pub value_metric: Option<ValueMetric>,

	#[prost(message, optional, tag = "10")]
	pub counter_event: Option<CounterEvent>,

	#[prost(message, optional, tag = "11")]
	pub error: Option<Error>,

	/// Only tracked so a frame that carries it next to a supported payload is caught
	#[prost(message, optional, tag = "12")]
	pub container_metric: Option<ContainerMetric>,

	#[prost(string, optional, tag = "13")]
	pub deployment: Option<String>,

	#[prost(string, optional, tag = "14")]
	pub job: Option<String>,

	#[prost(string, optional, tag = "15")]
	pub index: Option<String>,

	#[prost(string, optional, tag = "16")]
	pub ip: Option<String>,

	#[prost(map = "string, string", tag = "17")]
	pub tags: HashMap<String, String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LogMessage {
	#[prost(bytes = "vec", optional, tag = "1")]
	pub message: Option<Vec<u8>>,

	#[prost(enumeration = "LogMessageType", optional, tag = "2")]
	pub message_type: Option<i32>,

	#[prost(int64, optional, tag = "3")]
	pub timestamp: Option<i64>,

	#[prost(string, optional, tag = "4")]
	pub app_id: Option<String>,

	#[prost(string, optional, tag = "5")]
	pub source_type: Option<String>,

	#[prost(string, optional, tag = "6")]
	pub source_instance: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueMetric {
	#[prost(string, optional, tag = "1")]
	pub name: Option<String>,

	#[prost(double, optional, tag = "2")]
	pub value: Option<f64>,

	#[prost(string, optional, tag = "3")]
	pub unit: Option<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CounterEvent {
	#[prost(string, optional, tag = "1")]
	pub name: Option<String>,

	#[prost(uint64, optional, tag = "2")]
	pub delta: Option<u64>,

	#[prost(uint64, optional, tag = "3")]
	pub total: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Error {
	#[prost(string, optional, tag = "1")]
	pub source: Option<String>,

	#[prost(int32, optional, tag = "2")]
	pub code: Option<i32>,

	#[prost(string, optional, tag = "3")]
	pub message: Option<String>,
}

/// 128-bit id split into two little-endian halves
#[derive(Clone, Copy, PartialEq, Eq, Message)]
pub struct Uuid {
	#[prost(uint64, optional, tag = "1")]
	pub low: Option<u64>,

	#[prost(uint64, optional, tag = "2")]
	pub high: Option<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct HttpStartStop {
	#[prost(int64, optional, tag = "1")]
	pub start_timestamp: Option<i64>,

	#[prost(int64, optional, tag = "2")]
	pub stop_timestamp: Option<i64>,

	#[prost(message, optional, tag = "3")]
	pub request_id: Option<Uuid>,

	#[prost(enumeration = "PeerType", optional, tag = "4")]
	pub peer_type: Option<i32>,

	#[prost(enumeration = "Method", optional, tag = "5")]
	pub method: Option<i32>,

	#[prost(string, optional, tag = "6")]
	pub uri: Option<String>,

	#[prost(string, optional, tag = "7")]
	pub remote_address: Option<String>,

	#[prost(string, optional, tag = "8")]
	pub user_agent: Option<String>,

	#[prost(int32, optional, tag = "9")]
	pub status_code: Option<i32>,

	#[prost(int64, optional, tag = "10")]
	pub content_length: Option<i64>,

	#[prost(message, optional, tag = "12")]
	pub application_id: Option<Uuid>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ContainerMetric {
	#[prost(string, optional, tag = "1")]
	pub application_id: Option<String>,

	#[prost(int32, optional, tag = "2")]
	pub instance_index: Option<i32>,
}
