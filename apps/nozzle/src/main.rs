mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use firehose::{Client, WriterSink};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{filter::{Directive, EnvFilter}, fmt::format::JsonFields, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> ExitCode {
	dotenv::dotenv().ok();
	let config = Config::parse();

	if let Err(e) = init_tracing(&config) {
		eprintln!("FAILED\n{e:#}");
		return ExitCode::FAILURE;
	}

	match run(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("FAILED\n{e:#}");
			ExitCode::FAILURE
		}
	}
}

async fn run(config: Config) -> Result<()> {
	let client = Client::builder(&config.doppler_endpoint, &config.access_token)
		.options(config.options())
		.config(config.client_config())
		.build(WriterSink::stdout())
		.context("invalid nozzle configuration")?;

	if config.debug {
		info!(subscription_id = client.subscription_id(), "starting in debug mode");
	}

	let stop = client.stop_handle();
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => {
				info!("interrupt received, stopping");
				stop.stop().await;
			}
			Err(e) => warn!(error = %e, "unable to listen for ctrl-c"),
		}
	});

	client.start().await.context("error while streaming from the firehose")
}

/// `--debug` turns on debug output for the client on top of whatever `RUST_LOG` asks for
fn init_tracing(config: &Config) -> Result<()> {
	let mut filter = EnvFilter::try_new(&config.rust_log).context("invalid RUST_LOG")?;
	if config.debug {
		filter = filter.add_directive("firehose=debug".parse::<Directive>().context("invalid debug directive")?);
	}

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.with_writer(std::io::stderr)
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(filter))
		})
		.try_init()
		.context("tracing already initialized")
}
