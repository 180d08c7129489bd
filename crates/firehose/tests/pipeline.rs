mod common;

use common::{container_metric, counter, log, metric, seq_of, Attempt, RecordingSink, ScriptedTransport, Step};
use firehose::connection::{ConnectionError, ErrorClassification};
use firehose::{Client, ClientConfig, ClientOptions, ClientState, ConfigError, Filter, FirehoseError, RetryConfig};
use std::sync::Arc;
use std::time::Duration;

const RUN_DEADLINE: Duration = Duration::from_secs(5);

fn fast_config(queue_capacity: usize) -> ClientConfig {
	ClientConfig {
		queue_capacity,
		retry: RetryConfig {
			initial_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(10),
			backoff_multiplier: 2.0,
		},
		..ClientConfig::default()
	}
}

fn client(transport: &ScriptedTransport, options: ClientOptions, config: ClientConfig, sink: RecordingSink) -> Client<RecordingSink> {
	Client::builder("wss://doppler.test:443", "bearer test-token")
		.options(options)
		.config(config)
		.transport(Arc::new(transport.clone()))
		.build(sink)
		.unwrap()
}

#[tokio::test]
async fn filter_keeps_only_the_selected_type_in_order() {
	let transport = ScriptedTransport::single_session(vec![
		Step::Frame(log("hello")),
		Step::Frame(metric(1)),
		Step::Frame(counter("requests", 10)),
		Step::Frame(metric(2)),
	]);
	let sink = RecordingSink::default();
	let client = client(&transport, ClientOptions::default().with_filter("ValueMetric"), fast_config(16), sink.clone());
	let stop = client.stop_handle();
	let stats = client.stats();
	let run = tokio::spawn(client.start());

	sink.wait_for_lines(2).await;
	stop.stop().await;
	run.await.unwrap().unwrap();

	let lines = sink.lines();
	assert_eq!(lines.len(), 2);
	assert!(lines.iter().all(|line| line.contains(" ValueMetric ")));
	assert_eq!(lines.iter().map(|l| seq_of(l)).collect::<Vec<_>>(), vec![1, 2]);

	let snapshot = stats.snapshot();
	assert_eq!(snapshot.envelopes_decoded, 4);
	assert_eq!(snapshot.envelopes_filtered, 2);
	assert_eq!(snapshot.lines_written, 2);
}

#[tokio::test]
async fn lines_match_the_frame_order() {
	let frames = (0..200).map(|seq| Step::Frame(metric(seq))).collect();
	let transport = ScriptedTransport::single_session(frames);
	let sink = RecordingSink::default();
	let client = client(&transport, ClientOptions::default(), fast_config(8), sink.clone());
	let stop = client.stop_handle();
	let run = tokio::spawn(client.start());

	sink.wait_for_lines(200).await;
	stop.stop().await;
	run.await.unwrap().unwrap();

	let seqs: Vec<u32> = sink.lines().iter().map(|l| seq_of(l)).collect();
	assert_eq!(seqs, (0..200).collect::<Vec<_>>());
}

#[tokio::test]
async fn slow_sink_throttles_reads() {
	let capacity = 4;
	let frames = (0..20).map(|seq| Step::Frame(metric(seq))).collect();
	let transport = ScriptedTransport::single_session(frames);
	let (sink, gate) = RecordingSink::gated();
	let client = client(&transport, ClientOptions::default(), fast_config(capacity), sink.clone());
	let stop = client.stop_handle();
	let run = tokio::spawn(client.start());

	tokio::time::sleep(Duration::from_millis(100)).await;
	// One envelope in the sink, a full queue, one waiting for room
	assert!(transport.frames_served() <= capacity + 2, "read {} frames", transport.frames_served());
	assert_eq!(sink.len(), 0);

	gate.add_permits(1000);
	sink.wait_for_lines(20).await;
	stop.stop().await;
	run.await.unwrap().unwrap();

	let seqs: Vec<u32> = sink.lines().iter().map(|l| seq_of(l)).collect();
	assert_eq!(seqs, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn reconnects_after_a_dropped_session_without_duplicates() {
	let transport = ScriptedTransport::new(vec![
		Attempt::Session(vec![
			Step::Frame(metric(0)),
			Step::Frame(metric(1)),
			Step::Frame(metric(2)),
			Step::Fail(ConnectionError::Network("connection reset by peer".to_string())),
		]),
		Attempt::Refuse(ConnectionError::ServerError(503)),
		Attempt::Session(vec![Step::Frame(metric(3)), Step::Frame(metric(4))]),
	]);
	let sink = RecordingSink::default();
	let options = ClientOptions::default().with_subscription_id("shared-group");
	let client = client(&transport, options, fast_config(16), sink.clone());
	let stop = client.stop_handle();
	let state = client.state();
	let stats = client.stats();
	let run = tokio::spawn(client.start());

	sink.wait_for_lines(5).await;
	assert_eq!(*state.borrow(), ClientState::Streaming);
	stop.stop().await;
	run.await.unwrap().unwrap();

	let seqs: Vec<u32> = sink.lines().iter().map(|l| seq_of(l)).collect();
	assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
	assert_eq!(transport.connects(), 3);
	// The dropped session, then the second one on stop
	assert_eq!(transport.closes(), 2);
	assert_eq!(stats.snapshot().reconnects, 1);
	assert!(transport.handshakes().iter().all(|h| h.subscription_id == "shared-group"));
	assert_eq!(*state.borrow(), ClientState::Stopped);
}

#[tokio::test]
async fn hanging_connect_times_out_and_is_retried() {
	let transport = ScriptedTransport::new(vec![Attempt::Hang, Attempt::Session(vec![Step::Frame(metric(0))])]);
	let sink = RecordingSink::default();
	let config = ClientConfig {
		connect_timeout: Duration::from_millis(50),
		..fast_config(16)
	};
	let client = client(&transport, ClientOptions::default(), config, sink.clone());
	let stop = client.stop_handle();
	let run = tokio::spawn(client.start());

	sink.wait_for_lines(1).await;
	stop.stop().await;
	run.await.unwrap().unwrap();

	assert_eq!(transport.connects(), 2);
	assert_eq!(sink.lines().len(), 1);
}

#[tokio::test]
async fn ended_stream_is_reopened() {
	let transport = ScriptedTransport::new(vec![
		Attempt::Session(vec![Step::Frame(metric(0)), Step::End]),
		Attempt::Session(vec![Step::Frame(metric(1))]),
	]);
	let sink = RecordingSink::default();
	let client = client(&transport, ClientOptions::default(), fast_config(16), sink.clone());
	let stop = client.stop_handle();
	let run = tokio::spawn(client.start());

	sink.wait_for_lines(2).await;
	stop.stop().await;
	run.await.unwrap().unwrap();

	assert_eq!(transport.connects(), 2);
}

#[tokio::test]
async fn unauthorized_is_fatal_and_writes_nothing() {
	let transport = ScriptedTransport::new(vec![Attempt::Refuse(ConnectionError::Unauthorized { status: 401 })]);
	let sink = RecordingSink::default();
	let client = client(&transport, ClientOptions::default(), fast_config(16), sink.clone());
	let state = client.state();

	let result = tokio::time::timeout(RUN_DEADLINE, client.start()).await.unwrap();

	let err = result.unwrap_err();
	assert!(matches!(err, FirehoseError::Connection(ConnectionError::Unauthorized { status: 401 })));
	assert!(err.is_fatal_connection());
	assert_eq!(transport.connects(), 1);
	assert!(sink.lines().is_empty());
	assert_eq!(*state.borrow(), ClientState::Stopped);
}

#[tokio::test]
async fn token_rejected_on_reconnect_ends_the_run() {
	let transport = ScriptedTransport::new(vec![
		Attempt::Session(vec![Step::Frame(metric(0)), Step::Fail(ConnectionError::RemoteClosed("going away".to_string()))]),
		Attempt::Refuse(ConnectionError::Unauthorized { status: 403 }),
	]);
	let sink = RecordingSink::default();
	// Long enough for the consumer to drain the first session before the run ends
	let mut config = fast_config(16);
	config.retry.initial_delay = Duration::from_millis(100);
	config.retry.max_delay = Duration::from_millis(100);
	let client = client(&transport, ClientOptions::default(), config, sink.clone());

	let result = tokio::time::timeout(RUN_DEADLINE, client.start()).await.unwrap();

	assert!(matches!(result, Err(FirehoseError::Connection(ConnectionError::Unauthorized { status: 403 }))));
	assert_eq!(sink.lines().len(), 1);
	assert_eq!(transport.connects(), 2);
}

#[tokio::test]
async fn sink_failure_stops_the_run_and_closes_the_session_once() {
	let frames = (0..10).map(|seq| Step::Frame(metric(seq))).collect();
	let transport = ScriptedTransport::single_session(frames);
	let sink = RecordingSink::failing_after(1);
	let client = client(&transport, ClientOptions::default(), fast_config(16), sink.clone());

	let result = tokio::time::timeout(RUN_DEADLINE, client.start()).await.unwrap();

	assert!(matches!(result, Err(FirehoseError::Sink(firehose::SinkError::Closed))));
	assert_eq!(sink.lines().len(), 1);
	assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn undecodable_frames_are_skipped() {
	let transport = ScriptedTransport::single_session(vec![
		Step::Frame(metric(0)),
		Step::Frame(bytes::Bytes::from_static(&[0xff, 0xff, 0xff])),
		Step::Frame(container_metric()),
		Step::Frame(metric(1)),
	]);
	let sink = RecordingSink::default();
	let options = ClientOptions::default().with_debug(true);
	let client = client(&transport, options, fast_config(16), sink.clone());
	let stop = client.stop_handle();
	let stats = client.stats();
	let run = tokio::spawn(client.start());

	sink.wait_for_lines(2).await;
	stop.stop().await;
	run.await.unwrap().unwrap();

	let seqs: Vec<u32> = sink.lines().iter().map(|l| seq_of(l)).collect();
	assert_eq!(seqs, vec![0, 1]);
	let snapshot = stats.snapshot();
	assert_eq!(snapshot.frames_received, 4);
	assert_eq!(snapshot.frames_dropped, 2);
	assert_eq!(transport.connects(), 1);
}

#[tokio::test]
async fn stop_is_prompt_idempotent_and_final() {
	let frames = (0..3).map(|seq| Step::Frame(metric(seq))).collect();
	let transport = ScriptedTransport::single_session(frames);
	let sink = RecordingSink::default();
	let client = client(&transport, ClientOptions::default(), fast_config(16), sink.clone());
	let stop = client.stop_handle();
	let run = tokio::spawn(client.start());

	sink.wait_for_lines(3).await;
	tokio::time::timeout(Duration::from_secs(1), stop.stop()).await.unwrap();
	tokio::time::timeout(Duration::from_secs(1), stop.stop()).await.unwrap();
	assert!(stop.is_stopping());
	run.await.unwrap().unwrap();

	let written = sink.len();
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(sink.len(), written);
	assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn stop_unblocks_a_stalled_sink() {
	let frames = (0..10).map(|seq| Step::Frame(metric(seq))).collect();
	let transport = ScriptedTransport::single_session(frames);
	let (sink, _gate) = RecordingSink::gated();
	let client = client(&transport, ClientOptions::default(), fast_config(2), sink.clone());
	let stop = client.stop_handle();
	let run = tokio::spawn(client.start());

	tokio::time::sleep(Duration::from_millis(50)).await;
	tokio::time::timeout(Duration::from_secs(1), stop.stop()).await.unwrap();
	run.await.unwrap().unwrap();

	assert!(sink.lines().is_empty());
}

#[tokio::test]
async fn stop_before_start_never_connects() {
	let transport = ScriptedTransport::single_session(vec![Step::Frame(metric(0))]);
	let sink = RecordingSink::default();
	let client = client(&transport, ClientOptions::default(), fast_config(16), sink.clone());
	let stop = client.stop_handle();

	stop.stop().await;
	let result = tokio::time::timeout(RUN_DEADLINE, client.start()).await.unwrap();

	assert!(result.is_ok());
	assert_eq!(transport.connects(), 0);
	assert!(sink.lines().is_empty());
}

#[tokio::test]
async fn configuration_errors_surface_before_connecting() {
	let transport = ScriptedTransport::single_session(vec![]);
	let build = |endpoint: &str, token: &str, options: ClientOptions, config: ClientConfig| {
		Client::builder(endpoint, token)
			.options(options)
			.config(config)
			.transport(Arc::new(transport.clone()))
			.build(RecordingSink::default())
			.map(|_| ())
	};

	assert!(matches!(
		build("wss://doppler.test", "t", ClientOptions::default().with_filter("Bogus"), ClientConfig::default()),
		Err(ConfigError::UnknownFilter(_))
	));
	assert_eq!(
		build("wss://doppler.test", "", ClientOptions::default(), ClientConfig::default()),
		Err(ConfigError::Missing("auth token"))
	);
	assert_eq!(build("", "t", ClientOptions::default(), ClientConfig::default()), Err(ConfigError::Missing("endpoint")));
	assert!(matches!(
		build("wss://doppler.test", "t", ClientOptions::default().with_subscription_id("a/b"), ClientConfig::default()),
		Err(ConfigError::Invalid { field: "subscription_id", .. })
	));
	assert!(matches!(
		build("wss://doppler.test", "t", ClientOptions::default(), fast_config(0)),
		Err(ConfigError::Invalid { field: "queue_capacity", .. })
	));
	assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn no_filter_wins_and_subscription_ids_default_to_unique() {
	let transport = ScriptedTransport::single_session(vec![]);
	let options = ClientOptions::default().with_filter("ValueMetric").with_no_filter(true);
	let first = client(&transport, options, ClientConfig::default(), RecordingSink::default());
	let second = client(&transport, ClientOptions::default(), ClientConfig::default(), RecordingSink::default());

	assert_eq!(first.filter(), Filter::All);
	assert!(first.subscription_id().starts_with("nozzle-"));
	assert_ne!(first.subscription_id(), second.subscription_id());
}

#[test]
fn retryable_errors_are_not_fatal() {
	assert!(ConnectionError::ServerError(502).is_retryable());
	assert!(ConnectionError::Unauthorized { status: 401 }.is_fatal());
}
