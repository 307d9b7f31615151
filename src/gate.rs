//! Request gate: the single per-request entry point.
//!
//! A gate only exists after its [`BudgetEngine`] has replayed the current window from the
//! telemetry store, so no request is ever admitted against an empty cache.

// self
use crate::{
	_prelude::*,
	auth::{Authenticator, CallerContext},
	budget::{AdmissionDecision, BudgetEngine, BudgetLimits},
	config::GateConfig,
	obs::{self, AdmissionOutcome, GateSpan},
	secret::SecretResolver,
	telemetry::{TelemetryAppender, TelemetryStore},
	window::{datetime_from_ms, now_ms},
};

/// Authenticates callers and meters them against their budgets.
#[derive(Clone)]
pub struct RequestGate {
	authenticator: Arc<Authenticator>,
	engine: Arc<BudgetEngine>,
}
impl RequestGate {
	/// Replays the current window from `store` into `engine`, then returns a ready gate.
	///
	/// This is the startup barrier: it fails with [`Error::StoreUnavailable`] when the store
	/// errors or does not answer within `replay_timeout`, and no gate is produced.
	pub async fn open(
		authenticator: impl Into<Arc<Authenticator>>,
		engine: impl Into<Arc<BudgetEngine>>,
		store: &dyn TelemetryStore,
		replay_timeout: StdDuration,
	) -> Result<Self> {
		Self::open_at(authenticator, engine, store, replay_timeout, now_ms()).await
	}

	/// Same as [`RequestGate::open`], replaying the window that contains `now_ms`.
	pub async fn open_at(
		authenticator: impl Into<Arc<Authenticator>>,
		engine: impl Into<Arc<BudgetEngine>>,
		store: &dyn TelemetryStore,
		replay_timeout: StdDuration,
		now_ms: i64,
	) -> Result<Self> {
		let engine = engine.into();

		GateSpan::new("replay")
			.instrument(engine.recover(store, now_ms, replay_timeout))
			.await
			.inspect_err(|e| obs::log_gate_failure("replay", e))?;

		Ok(Self { authenticator: authenticator.into(), engine })
	}

	/// Builds every collaborator from `config`, spawns the telemetry appender, and replays.
	///
	/// The returned appender owns the background append worker; call
	/// [`TelemetryAppender::close`] on shutdown to drain it.
	pub async fn bootstrap(
		config: &GateConfig,
		secrets: &SecretResolver,
		store: Arc<dyn TelemetryStore>,
	) -> Result<(Self, TelemetryAppender)> {
		Self::bootstrap_at(config, secrets, store, now_ms()).await
	}

	/// Same as [`RequestGate::bootstrap`], replaying the window that contains `now_ms`.
	pub async fn bootstrap_at(
		config: &GateConfig,
		secrets: &SecretResolver,
		store: Arc<dyn TelemetryStore>,
		now_ms: i64,
	) -> Result<(Self, TelemetryAppender)> {
		let (authenticator, limits) = {
			let _guard = GateSpan::new("config").entered();

			build_collaborators(config, secrets)
				.map_err(Error::from)
				.inspect_err(|e| obs::log_gate_failure("config", e))?
		};
		let appender = TelemetryAppender::spawn(store.clone(), config.append_policy());
		let engine = BudgetEngine::new(limits, config.granularity).with_sink(appender.sink());
		let opened =
			Self::open_at(authenticator, engine, store.as_ref(), config.replay_timeout(), now_ms)
				.await;

		match opened {
			Ok(gate) => Ok((gate, appender)),
			Err(e) => {
				appender.close().await;

				Err(e)
			},
		}
	}

	/// Admits or rejects a request of `amount` units at the current wall-clock time.
	pub fn admit(&self, credential: &str, amount: u64) -> Result<AdmissionDecision> {
		self.admit_at(credential, amount, now_ms())
	}

	/// Admits or rejects a request as of `now_ms`.
	///
	/// Authentication failures and exhausted budgets are decisions, not errors. A rejected
	/// credential never touches budget state. The only error is a subject with no resolvable
	/// limit.
	pub fn admit_at(
		&self,
		credential: &str,
		amount: u64,
		now_ms: i64,
	) -> Result<AdmissionDecision> {
		let Some(caller) = self.authenticate(credential, now_ms) else {
			obs::record_admission(AdmissionOutcome::Unauthenticated);

			return Ok(AdmissionDecision::rejected(ErrorKind::Unauthenticated, 0));
		};
		let decision = self
			.engine
			.check_and_consume(&caller.subject, amount, now_ms)
			.map_err(Error::from)
			.inspect_err(|e| obs::log_gate_failure("admit", e))?;

		obs::record_admission(if decision.allowed {
			AdmissionOutcome::Admitted
		} else {
			AdmissionOutcome::QuotaExceeded
		});

		Ok(decision)
	}

	/// Returns `true` once startup replay has completed.
	pub fn is_ready(&self) -> bool {
		self.engine.is_recovered()
	}

	/// Engine backing this gate.
	pub fn engine(&self) -> &Arc<BudgetEngine> {
		&self.engine
	}

	/// Authenticator backing this gate.
	pub fn authenticator(&self) -> &Arc<Authenticator> {
		&self.authenticator
	}

	fn authenticate(&self, credential: &str, now_ms: i64) -> Option<CallerContext> {
		match self.authenticator.authenticate_at(credential, datetime_from_ms(now_ms)) {
			// Anonymous callers are only admitted when they have a budget of their own.
			Ok(caller) if caller.is_anonymous() && !self.engine.limits().admits_anonymous() => {
				obs::log_rejected_credential("anonymous access has no budget");

				None
			},
			Ok(caller) => Some(caller),
			Err(e) => {
				obs::log_rejected_credential(e.reason);

				None
			},
		}
	}
}
impl Debug for RequestGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestGate")
			.field("authenticator", &self.authenticator)
			.field("engine", &self.engine)
			.finish()
	}
}

fn build_collaborators(
	config: &GateConfig,
	secrets: &SecretResolver,
) -> Result<(Authenticator, BudgetLimits), ConfigError> {
	config.validate()?;

	Ok((config.authenticator(secrets)?, config.budget_limits()?))
}
