//! Generic polling engine for long-running remote operations.
//!
//! Every async remote operation the session drives (account provisioning,
//! build, deploy) is awaited through [`poll`]: fetch status, compare against
//! the operation's terminal sets, sleep, retry. Transient fetch failures are
//! retried up to a bounded budget; an exhausted time budget yields
//! [`PollOutcome::TimedOut`] without raising.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::shutdown::ShutdownSignal;

/// Fetches the current status of one remote operation.
#[async_trait]
pub trait StatusSource: Send + Sync {
	/// A returned error is a transport-level failure and counts against the
	/// poll's retry budget.
	async fn fetch(&self) -> Result<StatusReport>;
}

/// One status observation of a remote operation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
	pub status: String,
	pub detail: Value,
}

impl StatusReport {
	pub fn new(status: impl Into<String>, detail: Value) -> Self {
		Self { status: status.into(), detail }
	}
}

/// How one poll call behaves: terminal sets, pacing, and budgets.
///
/// Ephemeral; build one per operation.
#[derive(Debug, Clone)]
pub struct PollSpec<'a> {
	/// Operation label used in logs and timeout diagnostics.
	pub operation: &'a str,
	pub success: &'a [&'a str],
	pub failure: &'a [&'a str],
	pub interval: Duration,
	/// Multiplier applied to the interval after each wait; 1.0 is fixed.
	pub backoff: f64,
	pub max_interval: Duration,
	pub timeout: Duration,
	/// Consecutive transport failures tolerated before giving up.
	pub retry_budget: u32,
}

impl<'a> PollSpec<'a> {
	/// Fixed-interval spec with the default pacing and budgets.
	pub fn new(operation: &'a str, success: &'a [&'a str], failure: &'a [&'a str]) -> Self {
		Self {
			operation,
			success,
			failure,
			interval: Duration::from_secs(2),
			backoff: 1.0,
			max_interval: Duration::from_secs(30),
			timeout: Duration::from_secs(300),
			retry_budget: 3,
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	pub fn with_backoff(mut self, backoff: f64, max_interval: Duration) -> Self {
		self.backoff = backoff;
		self.max_interval = max_interval;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn with_retry_budget(mut self, budget: u32) -> Self {
		self.retry_budget = budget;
		self
	}
}

/// Why a poll ended with an error payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PollFailure {
	/// The operation reached a status in the terminal-error set.
	Terminal(StatusReport),
	/// Transport failures exhausted the retry budget.
	Transport { attempts: u32, message: String },
}

/// Exactly one of success, error, or timeout; never partially populated.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
	Success(StatusReport),
	Failure(PollFailure),
	TimedOut,
}

/// Polls `source` until a terminal status, the time budget, or shutdown.
///
/// A triggered shutdown lets the in-flight attempt finish and then returns;
/// a shutting-down caller discards the result.
pub async fn poll(spec: &PollSpec<'_>, source: &dyn StatusSource, shutdown: &ShutdownSignal) -> PollOutcome {
	let started = Instant::now();
	let mut interval = spec.interval;
	let mut consecutive_failures = 0u32;

	loop {
		match source.fetch().await {
			Ok(report) => {
				consecutive_failures = 0;
				if spec.success.contains(&report.status.as_str()) {
					debug!(target: "loft.poll", operation = spec.operation, status = %report.status, "terminal success");
					return PollOutcome::Success(report);
				}
				if spec.failure.contains(&report.status.as_str()) {
					debug!(target: "loft.poll", operation = spec.operation, status = %report.status, "terminal failure");
					return PollOutcome::Failure(PollFailure::Terminal(report));
				}
				trace!(target: "loft.poll", operation = spec.operation, status = %report.status, "not terminal yet");
			}
			Err(err) => {
				consecutive_failures += 1;
				if consecutive_failures >= spec.retry_budget {
					warn!(
						target: "loft.poll",
						operation = spec.operation,
						attempts = consecutive_failures,
						error = %err,
						"retry budget exhausted"
					);
					return PollOutcome::Failure(PollFailure::Transport {
						attempts: consecutive_failures,
						message: err.to_string(),
					});
				}
				warn!(
					target: "loft.poll",
					operation = spec.operation,
					attempt = consecutive_failures,
					error = %err,
					"status fetch failed; retrying"
				);
			}
		}

		if shutdown.is_triggered() {
			debug!(target: "loft.poll", operation = spec.operation, "shutdown requested; abandoning poll");
			return PollOutcome::TimedOut;
		}

		if started.elapsed() >= spec.timeout {
			debug!(target: "loft.poll", operation = spec.operation, "time budget exhausted");
			return PollOutcome::TimedOut;
		}

		tokio::select! {
			_ = tokio::time::sleep(interval) => {}
			_ = shutdown.triggered() => return PollOutcome::TimedOut,
		}

		if spec.backoff > 1.0 {
			interval = interval.mul_f64(spec.backoff).min(spec.max_interval);
		}
	}
}
