//! Error taxonomy and outcome classification for dev sessions.

use loft_protocol::{AccountClass, ComponentKind, SubtaskFailure};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoftError>;

/// Everything that can end a session early, classified so the host CLI can
/// pick an exit code without inspecting messages.
#[derive(Debug, Error)]
pub enum LoftError {
	/// The developer refused an irreversible confirmation. A deliberate
	/// no-op, not a failure.
	#[error("declined; no changes were made")]
	UserDeclined,

	#[error("account {account} cannot host {component} components")]
	CapabilityMismatch { account: String, component: ComponentKind },

	#[error("account {account} is not among the authenticated accounts")]
	UnknownAccount { account: String },

	#[error("failed to provision {class} account: {message}")]
	ProvisioningFailure { class: AccountClass, message: String },

	/// Another build owns the project right now. Never retried.
	#[error("project {project} is locked by a build running elsewhere")]
	ProjectLocked { project: String },

	#[error("build validation failed with {} failing sub-task(s)", failures.len())]
	BuildValidationFailure {
		build_id: Option<String>,
		failures: Vec<SubtaskFailure>,
	},

	/// Transport-level failure that survived the poller's retry budget.
	#[error("transport failure after {attempts} attempt(s): {message}")]
	Transport { attempts: u32, message: String },

	/// Distinct from `Transport`: the remote operation may still complete,
	/// this process just stopped waiting for it.
	#[error("timed out waiting for {operation}; the remote operation may still complete")]
	Timeout { operation: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl LoftError {
	/// Single-attempt transport failure, used by collaborators for request
	/// errors outside a poll loop.
	pub fn transport(message: impl Into<String>) -> Self {
		LoftError::Transport { attempts: 1, message: message.into() }
	}

	pub fn classify(&self) -> SessionOutcome {
		match self {
			LoftError::UserDeclined => SessionOutcome::CleanExit,
			_ => SessionOutcome::Fatal,
		}
	}
}

/// How a finished session should be reported to the host. Exit codes are the
/// host's business; this only names the categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
	Success,
	/// Deliberate early exit (declined confirmation); still a success.
	CleanExit,
	Fatal,
}

impl SessionOutcome {
	pub fn from_result<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => SessionOutcome::Success,
			Err(err) => err.classify(),
		}
	}
}
