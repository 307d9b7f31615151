// std
use std::{
	sync::Arc,
	time::{Duration, Instant},
};
// self
use parapet::{
	auth::{AssertionClaims, SignedAssertion, SubjectId},
	budget::AdmissionDecision,
	config::GateConfig,
	error::{Error, ErrorKind},
	gate::RequestGate,
	secret::{MapSource, SecretResolver, SecretValue},
	telemetry::{
		ConsumptionEvent, MemoryTelemetryStore, StoreError, StoreFuture, TelemetryAppender,
		TelemetryStore,
	},
	window::{Granularity, TimeWindow, window_for},
};

const CONFIG: &str = r#"{
	"granularity": "day",
	"budget": { "default_limit": 5, "subjects": { "batch": 2 } },
	"auth": {
		"assertion_key_ref": "assertion_key_ref",
		"tokens": [
			{ "token_ref": "alice_token_ref", "subject": "alice", "roles": ["reader"] },
			{ "token_ref": "batch_token_ref", "subject": "batch" }
		]
	},
	"secrets": { "headless": true },
	"telemetry": { "replay_timeout_ms": 200, "retry": { "base_delay_ms": 1, "max_delay_ms": 5 } }
}"#;
// 2025-11-10T12:00:00Z
const NOW_MS: i64 = 1_762_776_000_000;

struct Unreachable;
impl TelemetryStore for Unreachable {
	fn append(&self, _: ConsumptionEvent) -> StoreFuture<'_, ()> {
		Box::pin(async { Err(StoreError::Unavailable { message: "connection refused".into() }) })
	}

	fn load_rows(&self, _: TimeWindow) -> StoreFuture<'_, Vec<ConsumptionEvent>> {
		Box::pin(std::future::pending())
	}
}

// Replays an empty window, then either refuses or never finishes every append.
struct Degraded {
	stall_appends: bool,
}
impl TelemetryStore for Degraded {
	fn append(&self, _: ConsumptionEvent) -> StoreFuture<'_, ()> {
		if self.stall_appends {
			return Box::pin(std::future::pending());
		}

		Box::pin(async { Err(StoreError::Unavailable { message: "disk full".into() }) })
	}

	fn load_rows(&self, _: TimeWindow) -> StoreFuture<'_, Vec<ConsumptionEvent>> {
		Box::pin(async { Ok(Vec::new()) })
	}
}

fn secrets() -> SecretResolver {
	SecretResolver::new(true).with_source(
		MapSource::default()
			.with("alice_token_ref", "t-alice")
			.with("batch_token_ref", "t-batch")
			.with("assertion_key_ref", "k-assert"),
	)
}

fn subject(value: &str) -> SubjectId {
	SubjectId::new(value).expect("Subject fixture should be valid.")
}

fn event(who: &str, amount: u64, occurred_at_ms: i64) -> ConsumptionEvent {
	ConsumptionEvent {
		subject: subject(who),
		window_key: window_for(occurred_at_ms, Granularity::Day),
		amount,
		occurred_at_ms,
	}
}

fn config() -> GateConfig {
	GateConfig::from_json_str(CONFIG).expect("Fixture config should parse.")
}

async fn bootstrap_with(
	config: &GateConfig,
	store: Arc<dyn TelemetryStore>,
) -> (RequestGate, TelemetryAppender) {
	RequestGate::bootstrap_at(config, &secrets(), store, NOW_MS)
		.await
		.expect("Bootstrap should succeed.")
}

async fn bootstrap(store: Arc<MemoryTelemetryStore>) -> (RequestGate, TelemetryAppender) {
	bootstrap_with(&config(), store).await
}

#[tokio::test]
async fn bootstrap_replays_before_serving() -> color_eyre::Result<()> {
	let store = Arc::new(MemoryTelemetryStore::with_events([event("alice", 4, NOW_MS)]));
	let (gate, appender) = bootstrap(store.clone()).await;

	assert!(gate.is_ready());
	assert_eq!(
		gate.admit_at("t-alice", 2, NOW_MS)?,
		AdmissionDecision::rejected(ErrorKind::QuotaExceeded, 1)
	);
	assert_eq!(gate.admit_at("t-alice", 1, NOW_MS)?, AdmissionDecision::admitted(0));
	assert_eq!(gate.admit_at("t-batch", 3, NOW_MS)?.status_code(), 429);

	appender.close().await;

	Ok(())
}

#[tokio::test]
async fn admitted_consumption_reaches_the_store_in_order() {
	let store = Arc::new(MemoryTelemetryStore::default());
	let (gate, appender) = bootstrap(store.clone()).await;

	for amount in [1, 2, 1] {
		assert!(gate.admit_at("t-alice", amount, NOW_MS).expect("Limit should resolve.").allowed);
	}

	// Rejected: would exceed the limit of five.
	assert!(!gate.admit_at("t-alice", 2, NOW_MS).expect("Limit should resolve.").allowed);

	appender.close().await;

	let amounts = store.events().iter().map(|event| event.amount).collect::<Vec<_>>();

	assert_eq!(amounts, vec![1, 2, 1]);
}

#[tokio::test]
async fn unauthenticated_requests_leave_budgets_untouched() {
	let store = Arc::new(MemoryTelemetryStore::default());
	let (gate, appender) = bootstrap(store.clone()).await;

	gate.admit_at("t-alice", 1, NOW_MS).expect("Limit should resolve.");

	let before = gate.engine().snapshot();

	for credential in ["", "t-mallory", "not.an-assertion"] {
		let decision = gate.admit_at(credential, 1, NOW_MS).expect("No config error expected.");

		assert_eq!(decision, AdmissionDecision::rejected(ErrorKind::Unauthenticated, 0));
	}

	assert_eq!(gate.engine().snapshot(), before);

	appender.close().await;

	assert_eq!(store.events().len(), 1);
}

#[tokio::test]
async fn signed_assertions_are_budgeted_by_their_subject() {
	let (gate, appender) = bootstrap(Arc::new(MemoryTelemetryStore::default())).await;
	let signer = SignedAssertion::new(SecretValue::new("k-assert"));
	let claims = AssertionClaims {
		sub: "carol".into(),
		roles: vec!["writer".into()],
		exp: NOW_MS / 1_000 + 3_600,
	};
	let assertion = signer.sign(&claims).expect("Claims should encode.");

	assert_eq!(
		gate.admit_at(&assertion, 5, NOW_MS).expect("Default limit should resolve."),
		AdmissionDecision::admitted(0)
	);

	let forged = SignedAssertion::new(SecretValue::new("k-other"))
		.sign(&claims)
		.expect("Claims should encode.");

	assert_eq!(
		gate.admit_at(&forged, 1, NOW_MS).expect("No config error expected.").reason,
		Some(ErrorKind::Unauthenticated)
	);

	appender.close().await;
}

#[tokio::test]
async fn replay_timeout_prevents_the_gate_from_opening() {
	let err = RequestGate::bootstrap_at(&config(), &secrets(), Arc::new(Unreachable), NOW_MS)
		.await
		.expect_err("A store that never answers must fail startup.");

	assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
	assert!(matches!(err, Error::StoreUnavailable(StoreError::Timeout { .. })));
}

#[tokio::test]
async fn missing_secret_fails_bootstrap_with_a_config_error() {
	let err = RequestGate::bootstrap(
		&config(),
		&SecretResolver::new(true),
		Arc::new(MemoryTelemetryStore::default()),
	)
	.await
	.expect_err("Unresolvable token refs must fail startup.");

	assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn stalled_appends_never_hold_up_admission() {
	let mut config = config();

	config.telemetry.queue_capacity = 1;
	config.telemetry.append_timeout_ms = 60_000;

	let (gate, appender) = bootstrap_with(&config, Arc::new(Degraded { stall_appends: true })).await;
	let started = Instant::now();
	let remaining = (0..5)
		.map(|_| gate.admit_at("t-alice", 1, NOW_MS).expect("Limit should resolve."))
		.map(|decision| {
			assert!(decision.allowed);

			decision.remaining
		})
		.collect::<Vec<_>>();
	let sixth = gate.admit_at("t-alice", 1, NOW_MS).expect("Limit should resolve.");

	assert!(started.elapsed() < Duration::from_secs(1), "Admission must not wait on appends.");
	assert_eq!(remaining, vec![4, 3, 2, 1, 0]);
	assert_eq!(sixth, AdmissionDecision::rejected(ErrorKind::QuotaExceeded, 0));
	// At most one event fits in the queue and at most one more is held by the worker.
	assert!(appender.sink().stats().dropped() >= 3);

	// Closing would wait on the stalled append; dropping detaches the worker instead.
	drop(appender);
}

#[tokio::test]
async fn refused_appends_are_dropped_after_retries() {
	let (gate, appender) =
		bootstrap_with(&config(), Arc::new(Degraded { stall_appends: false })).await;

	for _ in 0..3 {
		assert!(gate.admit_at("t-alice", 1, NOW_MS).expect("Limit should resolve.").allowed);
	}

	let sink = appender.sink();

	appender.close().await;

	assert_eq!(sink.stats().appended(), 0);
	assert_eq!(sink.stats().dropped(), 3);
	assert!(sink.stats().retried() >= 3);
	assert_eq!(
		gate.engine().counter(&subject("alice"), NOW_MS).map(|counter| counter.consumed),
		Some(3)
	);
}
