//! Session aggregate, owned and mutated only by the orchestrator.

use loft_protocol::{AccountCandidate, ComponentDescriptor, SessionSnapshot, SessionStatus};
use tracing::warn;

use crate::account::Resolution;

/// Root aggregate for one dev session; lives for the process lifetime.
#[derive(Debug)]
pub struct Session {
	project: String,
	status: SessionStatus,
	target: AccountCandidate,
	testing: AccountCandidate,
	components: Vec<ComponentDescriptor>,
	current_build_id: Option<String>,
	current_deploy_id: Option<String>,
	github_linked: bool,
	provisioned: bool,
}

impl Session {
	pub fn new(project: impl Into<String>, resolution: Resolution, components: Vec<ComponentDescriptor>, github_linked: bool) -> Self {
		Self {
			project: project.into(),
			status: SessionStatus::Initializing,
			target: resolution.target,
			testing: resolution.testing,
			components,
			current_build_id: None,
			current_deploy_id: None,
			github_linked,
			provisioned: resolution.provisioned,
		}
	}

	pub fn status(&self) -> SessionStatus {
		self.status
	}

	pub fn target(&self) -> &AccountCandidate {
		&self.target
	}

	pub fn testing(&self) -> &AccountCandidate {
		&self.testing
	}

	pub fn provisioned(&self) -> bool {
		self.provisioned
	}

	pub fn github_linked(&self) -> bool {
		self.github_linked
	}

	/// Moves the status machine forward; disallowed transitions are refused
	/// and logged rather than applied.
	pub fn advance(&mut self, next: SessionStatus) {
		if !transition_allowed(self.status, next) {
			warn!(target: "loft.session", from = ?self.status, to = ?next, "refusing disallowed status transition");
			return;
		}
		self.status = next;
	}

	pub fn record_build(&mut self, build_id: String) {
		self.current_build_id = Some(build_id);
	}

	pub fn record_deploy(&mut self, deploy_id: String) {
		self.current_deploy_id = Some(deploy_id);
	}

	/// Replaces the component set after a translation pass; returns the
	/// components that were not present before.
	pub fn replace_components(&mut self, components: Vec<ComponentDescriptor>) -> Vec<ComponentDescriptor> {
		let added = components
			.iter()
			.filter(|component| !self.components.iter().any(|existing| existing.id == component.id))
			.cloned()
			.collect();
		self.components = components;
		added
	}

	pub fn snapshot(&self) -> SessionSnapshot {
		SessionSnapshot {
			project: self.project.clone(),
			status: self.status,
			target_account: self.target.clone(),
			testing_account: self.testing.clone(),
			components: self.components.clone(),
			current_build_id: self.current_build_id.clone(),
			current_deploy_id: self.current_deploy_id.clone(),
			github_linked: self.github_linked,
			provisioned: self.provisioned,
		}
	}
}

/// Status transitions are monotonic, with two exceptions for the redeploy
/// cycle: `Polling -> Uploading` and `Live -> Uploading`.
pub fn transition_allowed(from: SessionStatus, to: SessionStatus) -> bool {
	use SessionStatus::*;
	if from == to {
		return true;
	}
	match (from, to) {
		(Polling, Uploading) | (Live, Uploading) => true,
		(ShuttingDown, _) | (Failed, _) => false,
		(_, Failed) => true,
		_ => rank(to) > rank(from),
	}
}

fn rank(status: SessionStatus) -> u8 {
	use SessionStatus::*;
	match status {
		Initializing => 0,
		Provisioning => 1,
		Uploading => 2,
		Polling => 3,
		Live => 4,
		ShuttingDown => 5,
		Failed => 6,
	}
}
