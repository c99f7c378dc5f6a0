//! Trait seams for the external platform services a session consumes.
//!
//! The REST client, credential storage, prompt rendering, and source
//! translation all live in the host tool; the session only depends on these
//! interfaces so tests can run against in-memory fakes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use loft_protocol::{AccountCandidate, AccountClass, ComponentDescriptor};

use crate::error::Result;
use crate::poll::StatusSource;

/// A remote operation handle plus the status source the poller drives.
pub struct RemoteOperation {
	pub id: String,
	pub source: Box<dyn StatusSource>,
}

/// Result of asking the platform for a new disposable account.
///
/// The account is not usable until its readiness operation reaches a
/// terminal-success status.
pub struct ProvisioningTicket {
	pub operation: RemoteOperation,
	pub account: AccountCandidate,
	pub credential: AccountCredential,
}

/// Credential material persisted through the account directory.
#[derive(Debug, Clone)]
pub struct AccountCredential {
	pub account_id: String,
	pub token: String,
}

/// Locally stored account knowledge: who is authenticated, who is default.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
	async fn list_authenticated(&self) -> Result<Vec<AccountCandidate>>;
	async fn default_account(&self) -> Result<Option<AccountCandidate>>;
	async fn persist_credential(&self, credential: &AccountCredential) -> Result<()>;
}

/// Creates and destroys disposable accounts.
#[async_trait]
pub trait Provisioner: Send + Sync {
	async fn create_disposable_account(
		&self,
		parent: &AccountCandidate,
		class: AccountClass,
	) -> Result<ProvisioningTicket>;

	async fn teardown_account(&self, account: &AccountCandidate) -> Result<()>;
}

/// Project record and build/deploy surface of the platform.
#[async_trait]
pub trait ProjectApi: Send + Sync {
	async fn project_exists(&self, account: &AccountCandidate, name: &str) -> Result<bool>;
	async fn create_project(&self, account: &AccountCandidate, name: &str) -> Result<()>;
	/// Fingerprint of the last deployed build, if the project ever deployed.
	async fn deployed_fingerprint(&self, account: &AccountCandidate, name: &str) -> Result<Option<String>>;
	async fn upload_build(&self, account: &AccountCandidate, name: &str, archive: Vec<u8>) -> Result<RemoteOperation>;
	async fn deploy_build(&self, account: &AccountCandidate, build_id: &str) -> Result<RemoteOperation>;
	async fn restart_component(&self, account: &AccountCandidate, component_id: &str) -> Result<()>;
}

/// Project source tree translated into a comparable build representation.
#[derive(Debug, Clone)]
pub struct TranslatedProject {
	/// Stable fingerprint over the translated state; compared against the
	/// remote deployed fingerprint for drift detection.
	pub fingerprint: String,
	pub archive: Vec<u8>,
	pub components: Vec<ComponentDescriptor>,
}

/// Converts a project source tree into its intermediate representation.
#[async_trait]
pub trait SourceTranslator: Send + Sync {
	/// Cheap component discovery, usable before an account is resolved.
	async fn discover_components(&self, project_dir: &Path) -> Result<Vec<ComponentDescriptor>>;
	async fn translate(&self, project_dir: &Path, account: &AccountCandidate) -> Result<TranslatedProject>;
}

/// Interactive confirmation/selection surface.
#[async_trait]
pub trait Prompt: Send + Sync {
	async fn confirm(&self, question: &str) -> Result<bool>;
	/// Returns the chosen index, or `None` when the developer backs out.
	async fn select(&self, question: &str, options: &[String]) -> Result<Option<usize>>;
}

/// Everything external a session needs, bundled for `start()`.
#[derive(Clone)]
pub struct Collaborators {
	pub directory: Arc<dyn AccountDirectory>,
	pub provisioner: Arc<dyn Provisioner>,
	pub projects: Arc<dyn ProjectApi>,
	pub translator: Arc<dyn SourceTranslator>,
	pub prompt: Arc<dyn Prompt>,
}
