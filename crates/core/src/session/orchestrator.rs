//! The coordinating state machine for one end-to-end dev session.

use std::time::Duration;

use loft_protocol::{SessionEvent, SessionStatus, SubtaskFailure};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::state::Session;
use crate::account::AccountResolver;
use crate::collaborators::Collaborators;
use crate::config::SessionConfig;
use crate::error::{LoftError, Result};
use crate::hub::{HubAction, SharedSnapshot, UpdateHub};
use crate::poll::{PollFailure, PollOutcome, PollSpec, poll};
use crate::shutdown::ShutdownSignal;

const BUILD_SUCCESS: &[&str] = &["success"];
const BUILD_FAILURE: &[&str] = &["failure", "cancelled", "locked"];
const DEPLOY_SUCCESS: &[&str] = &["success"];
const DEPLOY_FAILURE: &[&str] = &["failure", "cancelled"];

const BUILD_TIMEOUT: Duration = Duration::from_secs(600);
const DEPLOY_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs one dev session end to end; resolves once the session has fully
/// shut down. `stop` is triggering `shutdown` from the host's own signal
/// handler.
pub async fn start(config: SessionConfig, collaborators: Collaborators, shutdown: ShutdownSignal) -> Result<()> {
	SessionOrchestrator::new(config, collaborators, shutdown).run().await
}

/// Owns the [`Session`] aggregate and drives it through its lifecycle.
pub struct SessionOrchestrator {
	config: SessionConfig,
	collaborators: Collaborators,
	shutdown: ShutdownSignal,
}

/// Publishes state changes through the hub once one exists; before the hub
/// is up, updates are log-only.
struct Reporter<'a> {
	hub: Option<(&'a UpdateHub, &'a SharedSnapshot)>,
}

impl Reporter<'_> {
	fn silent() -> Self {
		Self { hub: None }
	}

	fn publish(&self, session: &Session, event: SessionEvent) {
		if let Some((hub, view)) = self.hub {
			view.update(session.snapshot());
			hub.broadcast(event);
		}
	}
}

impl SessionOrchestrator {
	pub fn new(config: SessionConfig, collaborators: Collaborators, shutdown: ShutdownSignal) -> Self {
		Self { config, collaborators, shutdown }
	}

	pub async fn run(self) -> Result<()> {
		info!(target: "loft.session", project = %self.config.project_name, "starting dev session");

		let components = self
			.collaborators
			.translator
			.discover_components(&self.config.project_dir)
			.await?;
		debug!(target: "loft.session", count = components.len(), "discovered project components");

		let resolution = AccountResolver::new(&self.config, &self.collaborators)
			.resolve(&components, &self.shutdown)
			.await?;
		if self.shutdown.is_triggered() {
			return Ok(());
		}

		let mut session = Session::new(&self.config.project_name, resolution, components, self.config.github_linked);
		if session.provisioned() {
			session.advance(SessionStatus::Provisioning);
		}

		let mut drift = None;
		if let Err(err) = self.startup(&mut session, &mut drift).await {
			if matches!(err, LoftError::UserDeclined) {
				info!(target: "loft.session", "session ended before any changes were made");
				return Err(err);
			}
			session.advance(SessionStatus::Failed);
			self.report_failure(&err);
			return Err(err);
		}
		if self.shutdown.is_triggered() {
			info!(target: "loft.session", "interrupted before going live");
			return Ok(());
		}

		session.advance(SessionStatus::Live);
		let view = SharedSnapshot::new(session.snapshot());
		let (hub, actions_rx) = UpdateHub::bind(self.config.hub_port, view.clone()).await?;
		info!(target: "loft.session", addr = %hub.local_addr(), "session live; update hub listening");
		if let Some(addr_tx) = &self.config.hub_addr_tx {
			let _ = addr_tx.send(hub.local_addr());
		}
		hub.broadcast(SessionEvent::StatusChanged { status: SessionStatus::Live });
		if let Some(detail) = drift.take() {
			hub.broadcast(SessionEvent::DriftDetected { detail });
		}

		self.live_loop(&mut session, &view, &hub, actions_rx).await;

		session.advance(SessionStatus::ShuttingDown);
		view.update(session.snapshot());
		hub.broadcast(SessionEvent::StatusChanged { status: SessionStatus::ShuttingDown });
		hub.close().await;

		if session.provisioned() && self.config.teardown_on_exit {
			info!(target: "loft.session", account = %session.testing().id, "tearing down provisioned account");
			if let Err(err) = self.collaborators.provisioner.teardown_account(session.testing()).await {
				warn!(target: "loft.session", error = %err, "account teardown failed");
			}
		}

		info!(target: "loft.session", "session shut down");
		Ok(())
	}

	/// Everything between account resolution and going live: project record,
	/// drift check, initial build and deploy.
	async fn startup(&self, session: &mut Session, drift: &mut Option<String>) -> Result<()> {
		let projects = &self.collaborators.projects;
		let name = &self.config.project_name;

		if projects.project_exists(session.target(), name).await? {
			let translated = self
				.collaborators
				.translator
				.translate(&self.config.project_dir, session.testing())
				.await?;
			if let Some(remote) = projects.deployed_fingerprint(session.target(), name).await? {
				if remote != translated.fingerprint {
					warn!(
						target: "loft.session",
						local = %translated.fingerprint,
						deployed = %remote,
						"local source differs from the last deployed build"
					);
					*drift = Some(format!(
						"local fingerprint {} differs from deployed {remote}",
						translated.fingerprint
					));
				}
			}
		} else {
			self.confirm(&format!("Project {name} does not exist in account {}. Create it?", session.target().name))
				.await?;
			projects.create_project(session.target(), name).await?;
			info!(target: "loft.session", project = %name, "created remote project");
		}

		if self.shutdown.is_triggered() {
			return Ok(());
		}

		self.build_and_deploy(session, &Reporter::silent()).await
	}

	/// One upload -> build poll -> deploy poll cycle. Used for the initial
	/// deploy and for every client-requested redeploy.
	async fn build_and_deploy(&self, session: &mut Session, reporter: &Reporter<'_>) -> Result<()> {
		let translated = self
			.collaborators
			.translator
			.translate(&self.config.project_dir, session.testing())
			.await?;
		for component in session.replace_components(translated.components) {
			reporter.publish(session, SessionEvent::ComponentAdded { component });
		}

		session.advance(SessionStatus::Uploading);
		reporter.publish(session, SessionEvent::StatusChanged { status: SessionStatus::Uploading });

		let operation = self
			.collaborators
			.projects
			.upload_build(session.target(), &self.config.project_name, translated.archive)
			.await?;
		let build_id = operation.id.clone();
		info!(target: "loft.session", build = %build_id, "build started");
		reporter.publish(session, SessionEvent::BuildStarted { build_id: build_id.clone() });

		session.advance(SessionStatus::Polling);
		reporter.publish(session, SessionEvent::StatusChanged { status: SessionStatus::Polling });

		let label = format!("build {build_id}");
		let spec = PollSpec::new(&label, BUILD_SUCCESS, BUILD_FAILURE).with_timeout(BUILD_TIMEOUT);
		let outcome = poll(&spec, operation.source.as_ref(), &self.shutdown).await;
		if self.shutdown.is_triggered() {
			return Ok(());
		}
		match outcome {
			PollOutcome::Success(_) => {
				session.record_build(build_id.clone());
				reporter.publish(session, SessionEvent::BuildSucceeded { build_id: build_id.clone() });
			}
			PollOutcome::Failure(PollFailure::Terminal(report)) => {
				if report.status == "locked" {
					return Err(LoftError::ProjectLocked { project: self.config.project_name.clone() });
				}
				let failures = subtask_failures(&report.detail);
				for failure in &failures {
					error!(
						target: "loft.session",
						subtask = %failure.subtask,
						message = %failure.message,
						"build sub-task failed"
					);
				}
				reporter.publish(
					session,
					SessionEvent::BuildFailed { build_id: Some(build_id.clone()), failures: failures.clone() },
				);
				return Err(LoftError::BuildValidationFailure { build_id: Some(build_id), failures });
			}
			PollOutcome::Failure(PollFailure::Transport { attempts, message }) => {
				return Err(LoftError::Transport { attempts, message });
			}
			PollOutcome::TimedOut => return Err(LoftError::Timeout { operation: label }),
		}

		let operation = self
			.collaborators
			.projects
			.deploy_build(session.target(), &build_id)
			.await?;
		let deploy_id = operation.id.clone();
		info!(target: "loft.session", deploy = %deploy_id, "deploy started");
		reporter.publish(session, SessionEvent::DeployStarted { deploy_id: deploy_id.clone() });

		let label = format!("deploy {deploy_id}");
		let spec = PollSpec::new(&label, DEPLOY_SUCCESS, DEPLOY_FAILURE).with_timeout(DEPLOY_TIMEOUT);
		let outcome = poll(&spec, operation.source.as_ref(), &self.shutdown).await;
		if self.shutdown.is_triggered() {
			return Ok(());
		}
		match outcome {
			PollOutcome::Success(_) => {
				session.record_deploy(deploy_id.clone());
				reporter.publish(session, SessionEvent::DeploySucceeded { deploy_id });
				Ok(())
			}
			PollOutcome::Failure(PollFailure::Terminal(report)) => {
				let failures = subtask_failures(&report.detail);
				for failure in &failures {
					error!(
						target: "loft.session",
						subtask = %failure.subtask,
						message = %failure.message,
						"deploy sub-task failed"
					);
				}
				reporter.publish(
					session,
					SessionEvent::DeployFailed {
						deploy_id: Some(deploy_id.clone()),
						message: format!("deploy ended with status {}", report.status),
					},
				);
				Err(LoftError::BuildValidationFailure { build_id: Some(build_id), failures })
			}
			PollOutcome::Failure(PollFailure::Transport { attempts, message }) => {
				Err(LoftError::Transport { attempts, message })
			}
			PollOutcome::TimedOut => Err(LoftError::Timeout { operation: label }),
		}
	}

	async fn live_loop(
		&self,
		session: &mut Session,
		view: &SharedSnapshot,
		hub: &UpdateHub,
		mut actions: mpsc::UnboundedReceiver<HubAction>,
	) {
		let reporter = Reporter { hub: Some((hub, view)) };
		loop {
			tokio::select! {
				_ = self.shutdown.triggered() => {
					debug!(target: "loft.session", "shutdown requested");
					break;
				}
				action = actions.recv() => {
					let Some(action) = action else { break };
					self.handle_action(session, &reporter, &mut actions, action).await;
					if self.shutdown.is_triggered() {
						break;
					}
				}
			}
		}
	}

	async fn handle_action(
		&self,
		session: &mut Session,
		reporter: &Reporter<'_>,
		actions: &mut mpsc::UnboundedReceiver<HubAction>,
		action: HubAction,
	) {
		match action {
			HubAction::RestartComponent { component_id } => {
				self.restart_component(session, reporter, &component_id).await;
			}
			HubAction::Redeploy => {
				if session.github_linked() {
					reporter.publish(
						session,
						SessionEvent::AccountNotice {
							message: "project is linked to GitHub; builds are created from pushes, not manual uploads".into(),
						},
					);
					return;
				}
				loop {
					self.redeploy(session, reporter).await;
					// Requests that arrived while the poll was active
					// coalesce into at most one more cycle.
					let mut pending = false;
					while let Ok(queued) = actions.try_recv() {
						match queued {
							HubAction::Redeploy => pending = true,
							HubAction::RestartComponent { component_id } => {
								self.restart_component(session, reporter, &component_id).await;
							}
						}
					}
					if !pending || self.shutdown.is_triggered() {
						break;
					}
					debug!(target: "loft.session", "running coalesced redeploy");
				}
			}
		}
	}

	/// A failing redeploy is reported through the hub and leaves the session
	/// live; only the host can end a live session.
	async fn redeploy(&self, session: &mut Session, reporter: &Reporter<'_>) {
		info!(target: "loft.session", "client requested redeploy");
		if let Err(err) = self.build_and_deploy(session, reporter).await {
			warn!(target: "loft.session", error = %err, "redeploy failed; session stays live");
			match &err {
				// Validation failures were already broadcast per sub-task.
				LoftError::BuildValidationFailure { .. } => {}
				other => {
					reporter.publish(session, SessionEvent::AccountNotice { message: other.to_string() });
				}
			}
		}
		if self.shutdown.is_triggered() {
			return;
		}
		session.advance(SessionStatus::Live);
		reporter.publish(session, SessionEvent::StatusChanged { status: SessionStatus::Live });
	}

	async fn restart_component(&self, session: &mut Session, reporter: &Reporter<'_>, component_id: &str) {
		match self.collaborators.projects.restart_component(session.testing(), component_id).await {
			Ok(()) => {
				info!(target: "loft.session", component = %component_id, "component restarted");
				reporter.publish(
					session,
					SessionEvent::ComponentRestarted { component_id: component_id.to_string() },
				);
			}
			Err(err) => {
				warn!(target: "loft.session", component = %component_id, error = %err, "component restart failed");
				reporter.publish(
					session,
					SessionEvent::AccountNotice { message: format!("failed to restart {component_id}: {err}") },
				);
			}
		}
	}

	async fn confirm(&self, question: &str) -> Result<()> {
		if self.config.assume_yes {
			debug!(target: "loft.session", question, "auto-confirmed (non-interactive)");
			return Ok(());
		}
		if self.collaborators.prompt.confirm(question).await? {
			Ok(())
		} else {
			Err(LoftError::UserDeclined)
		}
	}

	fn report_failure(&self, err: &LoftError) {
		error!(target: "loft.session", error = %err, "session failed");
	}
}

/// Extracts per-sub-task failures from a terminal status payload.
fn subtask_failures(detail: &Value) -> Vec<SubtaskFailure> {
	let Some(entries) = detail.get("failures").and_then(Value::as_array) else {
		let message = detail
			.get("message")
			.and_then(Value::as_str)
			.unwrap_or("no failure detail reported")
			.to_string();
		return vec![SubtaskFailure { subtask: "build".into(), message }];
	};
	entries
		.iter()
		.map(|entry| SubtaskFailure {
			subtask: entry.get("subtask").and_then(Value::as_str).unwrap_or("unknown").to_string(),
			message: entry.get("message").and_then(Value::as_str).unwrap_or("no detail").to_string(),
		})
		.collect()
}
