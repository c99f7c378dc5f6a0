//! Executes the winning account rule: prompts, provisioning, persistence.

use loft_protocol::{AccountCandidate, ComponentDescriptor};
use tracing::{debug, info, warn};

use super::rules::{RuleDecision, RuleInput, capability_gap, decide};
use crate::collaborators::Collaborators;
use crate::config::SessionConfig;
use crate::error::{LoftError, Result};
use crate::poll::{PollFailure, PollOutcome, PollSpec, poll};
use crate::shutdown::ShutdownSignal;

const PROVISION_SUCCESS: &[&str] = &["ready", "active"];
const PROVISION_FAILURE: &[&str] = &["failed", "cancelled"];

/// Which accounts this session builds against and tests in.
#[derive(Debug, Clone)]
pub struct Resolution {
	pub target: AccountCandidate,
	pub testing: AccountCandidate,
	pub provisioned: bool,
}

/// Decides and acquires the accounts for one session.
pub struct AccountResolver<'a> {
	config: &'a SessionConfig,
	collaborators: &'a Collaborators,
}

impl<'a> AccountResolver<'a> {
	pub fn new(config: &'a SessionConfig, collaborators: &'a Collaborators) -> Self {
		Self { config, collaborators }
	}

	/// Resolves target and testing accounts for `components`.
	///
	/// May prompt, and may provision a disposable account; declining any
	/// confirmation returns [`LoftError::UserDeclined`] with no side effects.
	pub async fn resolve(&self, components: &[ComponentDescriptor], shutdown: &ShutdownSignal) -> Result<Resolution> {
		let authenticated = self.collaborators.directory.list_authenticated().await?;
		let default_account = self.collaborators.directory.default_account().await?;

		let input = RuleInput {
			explicit: self.config.explicit_account.as_deref(),
			components,
			default_account: default_account.as_ref(),
			authenticated: &authenticated,
		};

		match decide(&input)? {
			RuleDecision::UseExplicit(account) => {
				debug!(target: "loft.account", account = %account.id, "using explicitly requested account");
				Ok(same_account(account))
			}
			RuleDecision::ConfirmDefault(account) => {
				self.confirm(&format!("Use default account {} ({})?", account.name, account.class)).await?;
				info!(target: "loft.account", account = %account.id, "using default account");
				Ok(same_account(account))
			}
			RuleDecision::OfferExisting(matches) => {
				let account = self.pick_existing(&matches).await?;
				info!(target: "loft.account", account = %account.id, "reusing authenticated account");
				// The target must be able to host every component; an
				// incapable parent is never promoted.
				let target = account
					.parent_id
					.as_deref()
					.and_then(|parent| authenticated.iter().find(|candidate| candidate.id == parent))
					.filter(|parent| capability_gap(parent, components).is_none())
					.unwrap_or(account);
				Ok(Resolution { target: target.clone(), testing: account.clone(), provisioned: false })
			}
			RuleDecision::OfferProvision { parent, class } => {
				self.confirm(&format!("Create a new {class} account for this project?")).await?;
				let Some(parent) = parent else {
					return Err(LoftError::ProvisioningFailure {
						class,
						message: "no default account available to parent a disposable account".into(),
					});
				};
				self.provision(parent, class, components, shutdown).await
			}
		}
	}

	/// Picks one of the fitting authenticated accounts: a single match only
	/// needs confirmation, several go through a selection prompt.
	async fn pick_existing<'b>(&self, matches: &[&'b AccountCandidate]) -> Result<&'b AccountCandidate> {
		if let &[only] = matches {
			self.confirm(&format!("Reuse authenticated {} account {}?", only.class, only.name)).await?;
			return Ok(only);
		}
		if self.config.assume_yes {
			debug!(target: "loft.account", account = %matches[0].id, "auto-selected first matching account (non-interactive)");
			return Ok(matches[0]);
		}
		let options: Vec<String> = matches
			.iter()
			.map(|account| format!("{} ({})", account.name, account.class))
			.collect();
		let choice = self
			.collaborators
			.prompt
			.select("Several authenticated accounts fit this project; use which?", &options)
			.await?;
		choice
			.and_then(|index| matches.get(index).copied())
			.ok_or(LoftError::UserDeclined)
	}

	async fn provision(
		&self,
		parent: &AccountCandidate,
		class: loft_protocol::AccountClass,
		components: &[ComponentDescriptor],
		shutdown: &ShutdownSignal,
	) -> Result<Resolution> {
		info!(target: "loft.account", parent = %parent.id, %class, "provisioning disposable account");
		let ticket = self
			.collaborators
			.provisioner
			.create_disposable_account(parent, class)
			.await
			.map_err(|err| LoftError::ProvisioningFailure { class, message: err.to_string() })?;

		let spec = PollSpec::new("account provisioning", PROVISION_SUCCESS, PROVISION_FAILURE)
			.with_interval(std::time::Duration::from_secs(5))
			.with_timeout(std::time::Duration::from_secs(600));
		let outcome = poll(&spec, ticket.operation.source.as_ref(), shutdown).await;

		if shutdown.is_triggered() {
			// Interrupted mid-provisioning: exit cleanly, the platform keeps
			// the half-created account.
			warn!(target: "loft.account", account = %ticket.account.id, "interrupted while provisioning");
			return Err(LoftError::UserDeclined);
		}

		match outcome {
			PollOutcome::Success(_) => {
				self.collaborators.directory.persist_credential(&ticket.credential).await?;
				info!(target: "loft.account", account = %ticket.account.id, "disposable account ready");
				// Same constraint as reuse: a parent unable to host the
				// components cannot be the target.
				let target = if capability_gap(parent, components).is_none() {
					parent.clone()
				} else {
					debug!(
						target: "loft.account",
						parent = %parent.id,
						"parent cannot host every component; scoping the session to the new account"
					);
					ticket.account.clone()
				};
				Ok(Resolution { target, testing: ticket.account, provisioned: true })
			}
			PollOutcome::Failure(PollFailure::Terminal(report)) => Err(LoftError::ProvisioningFailure {
				class,
				message: format!("provisioning ended with status {}", report.status),
			}),
			PollOutcome::Failure(PollFailure::Transport { attempts, message }) => {
				Err(LoftError::Transport { attempts, message })
			}
			PollOutcome::TimedOut => Err(LoftError::Timeout { operation: "account provisioning".into() }),
		}
	}

	async fn confirm(&self, question: &str) -> Result<()> {
		if self.config.assume_yes {
			debug!(target: "loft.account", question, "auto-confirmed (non-interactive)");
			return Ok(());
		}
		if self.collaborators.prompt.confirm(question).await? {
			Ok(())
		} else {
			Err(LoftError::UserDeclined)
		}
	}
}

fn same_account(account: &AccountCandidate) -> Resolution {
	Resolution {
		target: account.clone(),
		testing: account.clone(),
		provisioned: false,
	}
}
