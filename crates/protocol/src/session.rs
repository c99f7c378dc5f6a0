//! Session state shapes shared between the orchestrator and its clients.

use serde::{Deserialize, Serialize};

use crate::account::AccountCandidate;
use crate::component::ComponentDescriptor;

/// Lifecycle status of a dev session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
	Initializing,
	Provisioning,
	Uploading,
	Polling,
	Live,
	ShuttingDown,
	Failed,
}

impl SessionStatus {
	/// Whether the session has reached a state it can never leave.
	pub fn is_terminal(self) -> bool {
		matches!(self, SessionStatus::ShuttingDown | SessionStatus::Failed)
	}
}

/// Full state of a session as seen by a client at connect time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
	pub project: String,
	pub status: SessionStatus,
	pub target_account: AccountCandidate,
	pub testing_account: AccountCandidate,
	pub components: Vec<ComponentDescriptor>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub current_build_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub current_deploy_id: Option<String>,
	#[serde(default)]
	pub github_linked: bool,
	#[serde(default)]
	pub provisioned: bool,
}

/// One failing sub-task of a build or deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskFailure {
	pub subtask: String,
	pub message: String,
}

/// State-change event broadcast to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
	StatusChanged { status: SessionStatus },
	ComponentAdded { component: ComponentDescriptor },
	ComponentRestarted { component_id: String },
	BuildStarted { build_id: String },
	BuildSucceeded { build_id: String },
	BuildFailed {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		build_id: Option<String>,
		failures: Vec<SubtaskFailure>,
	},
	DeployStarted { deploy_id: String },
	DeploySucceeded { deploy_id: String },
	DeployFailed {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		deploy_id: Option<String>,
		message: String,
	},
	DriftDetected { detail: String },
	AccountNotice { message: String },
}
