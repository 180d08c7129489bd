use clap::Parser;
use firehose::{ClientConfig, ClientOptions};

#[derive(Parser, Debug, Clone)]
#[command(name = "nozzle")]
#[command(version, about = "Displays messages from the platform telemetry firehose", long_about = None)]
pub struct Config {
	/// Firehose (doppler) WebSocket endpoint, e.g. wss://doppler.example.com:443
	#[arg(long, env = "DOPPLER_ENDPOINT")]
	pub doppler_endpoint: String,

	/// OAuth access token, with or without the `bearer ` prefix
	#[arg(long, env = "CF_ACCESS_TOKEN", hide_env_values = true)]
	pub access_token: String,

	/// Debug output, including frames that could not be decoded
	#[arg(short, long)]
	pub debug: bool,

	/// Display all messages
	#[arg(short, long)]
	pub no_filter: bool,

	/// Only display this event type: LogMessage, ValueMetric, CounterEvent, HttpStartStop or Error
	#[arg(short, long, default_value = "")]
	pub filter: String,

	/// Share the stream with other nozzles using the same id
	#[arg(short, long, default_value = "")]
	pub subscription_id: String,

	/// Accept any TLS certificate from the endpoint
	#[arg(long, env = "SKIP_SSL_VALIDATION")]
	pub skip_ssl_validation: bool,

	/// Envelopes buffered between the connection and the terminal
	#[arg(long, env = "QUEUE_CAPACITY", default_value = "1024")]
	pub queue_capacity: usize,

	#[arg(long, env = "LOG_JSON")]
	pub log_json: bool,

	#[arg(long, env = "RUST_LOG", default_value = "warn")]
	pub rust_log: String,
}

impl Config {
	pub fn options(&self) -> ClientOptions {
		ClientOptions::default()
			.with_debug(self.debug)
			.with_no_filter(self.no_filter)
			.with_filter(self.filter.as_str())
			.with_subscription_id(self.subscription_id.as_str())
	}

	pub fn client_config(&self) -> ClientConfig {
		ClientConfig {
			queue_capacity: self.queue_capacity,
			skip_tls_verification: self.skip_ssl_validation,
			..ClientConfig::default()
		}
	}
}
