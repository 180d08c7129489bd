use super::{CounterEvent, Envelope, ErrorEvent, HttpStartStop, LogLevel, LogMessage, Payload, PeerType, ValueMetric};
use chrono::SecondsFormat;
use std::borrow::Cow;
use std::fmt::{self, Write};

/// Render an envelope as a single display line:
/// `<timestamp> [<origin>] <EventType> <payload>`
pub fn format_line(envelope: &Envelope) -> String {
	let timestamp = envelope
		.timestamp
		.map_or_else(|| "-".to_string(), |ts| ts.to_rfc3339_opts(SecondsFormat::Nanos, true));

	let mut line = format!("{timestamp} [{}] {} ", escaped(&envelope.origin), envelope.event_type());
	// Writing into a String cannot fail
	let _ = match &envelope.payload {
		Payload::LogMessage(log) => write_log(&mut line, log),
		Payload::ValueMetric(metric) => write_metric(&mut line, metric),
		Payload::CounterEvent(counter) => write_counter(&mut line, counter),
		Payload::HttpStartStop(http) => write_http(&mut line, http),
		Payload::Error(error) => write_error(&mut line, error),
	};
	line
}

fn write_log(out: &mut String, log: &LogMessage) -> fmt::Result {
	let level = match log.level {
		LogLevel::Out => "OUT",
		LogLevel::Err => "ERR",
	};
	let message = String::from_utf8_lossy(&log.message);
	write!(out, "{level} {}/{}", escaped(&log.source_type), escaped(&log.source_instance))?;
	if let Some(app_id) = &log.app_id {
		write!(out, " app={}", escaped(app_id))?;
	}
	write!(out, " {:?}", message.trim_end_matches(['\n', '\r']))
}

fn write_metric(out: &mut String, metric: &ValueMetric) -> fmt::Result {
	write!(out, "{}={} {}", escaped(&metric.name), metric.value, escaped(&metric.unit))
}

fn write_counter(out: &mut String, counter: &CounterEvent) -> fmt::Result {
	write!(out, "{} delta={} total={}", escaped(&counter.name), counter.delta, counter.total)
}

fn write_http(out: &mut String, http: &HttpStartStop) -> fmt::Result {
	write!(out, "{} {}", escaped(http.method.as_deref().unwrap_or("-")), escaped(&http.uri))?;
	if let Some(status) = http.status_code {
		write!(out, " status={status}")?;
	}
	if let Some(micros) = http.duration().and_then(|d| d.num_microseconds()) {
		#[allow(clippy::cast_precision_loss)]
		let millis = micros as f64 / 1000.0;
		write!(out, " duration={millis:.3}ms")?;
	}
	if let Some(peer) = http.peer_type {
		let peer = match peer {
			PeerType::Client => "Client",
			PeerType::Server => "Server",
		};
		write!(out, " peer={peer}")?;
	}
	if let Some(request_id) = http.request_id {
		write!(out, " request_id={request_id}")?;
	}
	Ok(())
}

fn write_error(out: &mut String, error: &ErrorEvent) -> fmt::Result {
	write!(out, "{} code={} {:?}", escaped(&error.source), error.code, error.message)
}

/// Control characters in free text would split the line, so they are written as escapes
fn escaped(text: &str) -> Cow<'_, str> {
	if !text.chars().any(char::is_control) {
		return Cow::Borrowed(text);
	}
	let mut out = String::with_capacity(text.len() + 8);
	for c in text.chars() {
		if c.is_control() {
			out.extend(c.escape_default());
		} else {
			out.push(c);
		}
	}
	Cow::Owned(out)
}
