//! Immutable configuration for one dev session.

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::sync::mpsc;

/// Fully resolved configuration built once at startup and passed by
/// reference; consumers read only the fields they need.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Remote project name.
	pub project_name: String,
	/// Local project source tree.
	pub project_dir: PathBuf,
	/// Account id the developer asked for explicitly, if any.
	pub explicit_account: Option<String>,
	/// Local port for the update hub; 0 binds an ephemeral port.
	pub hub_port: u16,
	/// Non-interactive override: answer yes to every confirmation.
	pub assume_yes: bool,
	/// Tear down a session-provisioned account at exit.
	pub teardown_on_exit: bool,
	/// Project builds arrive via the GitHub integration; manual redeploys
	/// are rejected.
	pub github_linked: bool,
	/// Notified with the hub's bound address once it is listening; the only
	/// way to learn the port when `hub_port` is 0.
	pub hub_addr_tx: Option<mpsc::UnboundedSender<SocketAddr>>,
}

impl SessionConfig {
	pub fn new(project_name: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
		Self {
			project_name: project_name.into(),
			project_dir: project_dir.into(),
			explicit_account: None,
			hub_port: 0,
			assume_yes: false,
			teardown_on_exit: false,
			github_linked: false,
			hub_addr_tx: None,
		}
	}

	/// Sets the explicitly requested account.
	pub fn with_explicit_account(mut self, account: Option<String>) -> Self {
		self.explicit_account = account;
		self
	}

	/// Sets the hub listen port.
	pub fn with_hub_port(mut self, port: u16) -> Self {
		self.hub_port = port;
		self
	}

	/// Enables the non-interactive confirmation override.
	pub fn with_assume_yes(mut self, yes: bool) -> Self {
		self.assume_yes = yes;
		self
	}

	/// Opts in to tearing down a provisioned account at exit.
	pub fn with_teardown_on_exit(mut self, teardown: bool) -> Self {
		self.teardown_on_exit = teardown;
		self
	}

	/// Marks the project as GitHub-linked.
	pub fn with_github_linked(mut self, linked: bool) -> Self {
		self.github_linked = linked;
		self
	}

	/// Registers a channel notified with the hub's bound address.
	pub fn with_hub_addr_notify(mut self, tx: mpsc::UnboundedSender<SocketAddr>) -> Self {
		self.hub_addr_tx = Some(tx);
		self
	}
}
