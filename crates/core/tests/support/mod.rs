//! In-memory collaborators for driving sessions in tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use loft::Result;
use loft::collaborators::{
	AccountCredential, AccountDirectory, Collaborators, ProjectApi, Prompt, Provisioner, ProvisioningTicket,
	RemoteOperation, SourceTranslator, TranslatedProject,
};
use loft::poll::{StatusReport, StatusSource};
use loft_protocol::{AccountCandidate, AccountClass, AppDistribution, ComponentDescriptor, ComponentKind};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Semaphore;

pub fn account(id: &str, class: AccountClass, public: bool, private: bool) -> AccountCandidate {
	AccountCandidate {
		id: id.into(),
		name: format!("account {id}"),
		class,
		parent_id: None,
		supports_public_apps: public,
		supports_private_apps: private,
	}
}

pub fn function_component(id: &str) -> ComponentDescriptor {
	ComponentDescriptor { id: id.into(), kind: ComponentKind::Function, runnable: true, distribution: None }
}

pub fn public_app_component(id: &str) -> ComponentDescriptor {
	ComponentDescriptor {
		id: id.into(),
		kind: ComponentKind::AppManifest,
		runnable: false,
		distribution: Some(AppDistribution::Public),
	}
}

/// Status source that immediately reports a fixed terminal status.
pub struct InstantSource(pub &'static str);

#[async_trait]
impl StatusSource for InstantSource {
	async fn fetch(&self) -> Result<StatusReport> {
		Ok(StatusReport::new(self.0, json!({})))
	}
}

/// Status source that reports `pending` until the gate opens, then success.
pub struct GatedSource {
	gate: Arc<Semaphore>,
}

impl GatedSource {
	pub fn new() -> (Self, Arc<Semaphore>) {
		let gate = Arc::new(Semaphore::new(0));
		(Self { gate: Arc::clone(&gate) }, gate)
	}
}

#[async_trait]
impl StatusSource for GatedSource {
	async fn fetch(&self) -> Result<StatusReport> {
		let permit = self.gate.acquire().await.map_err(|_| loft::LoftError::transport("gate closed"))?;
		permit.forget();
		Ok(StatusReport::new("success", json!({})))
	}
}

/// Status source that never reaches a terminal status.
pub struct PendingForeverSource;

#[async_trait]
impl StatusSource for PendingForeverSource {
	async fn fetch(&self) -> Result<StatusReport> {
		Ok(StatusReport::new("pending", json!({})))
	}
}

pub struct FakeDirectory {
	pub accounts: Vec<AccountCandidate>,
	pub default: Option<AccountCandidate>,
	pub persisted: Mutex<Vec<String>>,
}

impl FakeDirectory {
	pub fn new(accounts: Vec<AccountCandidate>, default: Option<AccountCandidate>) -> Self {
		Self { accounts, default, persisted: Mutex::new(Vec::new()) }
	}
}

#[async_trait]
impl AccountDirectory for FakeDirectory {
	async fn list_authenticated(&self) -> Result<Vec<AccountCandidate>> {
		Ok(self.accounts.clone())
	}

	async fn default_account(&self) -> Result<Option<AccountCandidate>> {
		Ok(self.default.clone())
	}

	async fn persist_credential(&self, credential: &AccountCredential) -> Result<()> {
		self.persisted.lock().push(credential.account_id.clone());
		Ok(())
	}
}

pub struct FakeProvisioner {
	pub created: AtomicUsize,
	pub torn_down: Mutex<Vec<String>>,
	pub next_account: AccountCandidate,
}

impl FakeProvisioner {
	pub fn new(next_account: AccountCandidate) -> Self {
		Self { created: AtomicUsize::new(0), torn_down: Mutex::new(Vec::new()), next_account }
	}
}

#[async_trait]
impl Provisioner for FakeProvisioner {
	async fn create_disposable_account(
		&self,
		_parent: &AccountCandidate,
		_class: AccountClass,
	) -> Result<ProvisioningTicket> {
		self.created.fetch_add(1, Ordering::SeqCst);
		Ok(ProvisioningTicket {
			operation: RemoteOperation { id: "op-1".into(), source: Box::new(InstantSource("ready")) },
			account: self.next_account.clone(),
			credential: AccountCredential { account_id: self.next_account.id.clone(), token: "tok".into() },
		})
	}

	async fn teardown_account(&self, account: &AccountCandidate) -> Result<()> {
		self.torn_down.lock().push(account.id.clone());
		Ok(())
	}
}

pub struct FakeProjects {
	pub exists: bool,
	pub fingerprint: Option<String>,
	pub create_calls: AtomicUsize,
	pub upload_calls: AtomicUsize,
	pub deploy_calls: AtomicUsize,
	pub restarted: Mutex<Vec<String>>,
	/// Scripted status sources consumed per upload; instant success when empty.
	pub build_sources: Mutex<VecDeque<Box<dyn StatusSource>>>,
}

impl FakeProjects {
	pub fn new(exists: bool, fingerprint: Option<String>) -> Self {
		Self {
			exists,
			fingerprint,
			create_calls: AtomicUsize::new(0),
			upload_calls: AtomicUsize::new(0),
			deploy_calls: AtomicUsize::new(0),
			restarted: Mutex::new(Vec::new()),
			build_sources: Mutex::new(VecDeque::new()),
		}
	}

	pub fn push_build_source(&self, source: Box<dyn StatusSource>) {
		self.build_sources.lock().push_back(source);
	}
}

#[async_trait]
impl ProjectApi for FakeProjects {
	async fn project_exists(&self, _account: &AccountCandidate, _name: &str) -> Result<bool> {
		Ok(self.exists)
	}

	async fn create_project(&self, _account: &AccountCandidate, _name: &str) -> Result<()> {
		self.create_calls.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn deployed_fingerprint(&self, _account: &AccountCandidate, _name: &str) -> Result<Option<String>> {
		Ok(self.fingerprint.clone())
	}

	async fn upload_build(&self, _account: &AccountCandidate, _name: &str, _archive: Vec<u8>) -> Result<RemoteOperation> {
		let call = self.upload_calls.fetch_add(1, Ordering::SeqCst);
		let source = self
			.build_sources
			.lock()
			.pop_front()
			.unwrap_or_else(|| Box::new(InstantSource("success")));
		Ok(RemoteOperation { id: format!("b-{call}"), source })
	}

	async fn deploy_build(&self, _account: &AccountCandidate, build_id: &str) -> Result<RemoteOperation> {
		self.deploy_calls.fetch_add(1, Ordering::SeqCst);
		Ok(RemoteOperation { id: format!("d-{build_id}"), source: Box::new(InstantSource("success")) })
	}

	async fn restart_component(&self, _account: &AccountCandidate, component_id: &str) -> Result<()> {
		self.restarted.lock().push(component_id.to_string());
		Ok(())
	}
}

pub struct FakeTranslator {
	pub components: Vec<ComponentDescriptor>,
	pub fingerprint: String,
}

impl FakeTranslator {
	pub fn new(components: Vec<ComponentDescriptor>, fingerprint: &str) -> Self {
		Self { components, fingerprint: fingerprint.into() }
	}
}

#[async_trait]
impl SourceTranslator for FakeTranslator {
	async fn discover_components(&self, _project_dir: &Path) -> Result<Vec<ComponentDescriptor>> {
		Ok(self.components.clone())
	}

	async fn translate(&self, _project_dir: &Path, _account: &AccountCandidate) -> Result<TranslatedProject> {
		Ok(TranslatedProject {
			fingerprint: self.fingerprint.clone(),
			archive: vec![0u8; 4],
			components: self.components.clone(),
		})
	}
}

/// Prompt with pre-scripted answers; unscripted confirmations and
/// selections decline.
pub struct ScriptedPrompt {
	answers: Mutex<VecDeque<bool>>,
	selections: Mutex<VecDeque<Option<usize>>>,
	pub questions: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
	pub fn new(answers: &[bool]) -> Self {
		Self {
			answers: Mutex::new(answers.iter().copied().collect()),
			selections: Mutex::new(VecDeque::new()),
			questions: Mutex::new(Vec::new()),
		}
	}

	pub fn with_selections(self, selections: &[Option<usize>]) -> Self {
		*self.selections.lock() = selections.iter().copied().collect();
		self
	}
}

#[async_trait]
impl Prompt for ScriptedPrompt {
	async fn confirm(&self, question: &str) -> Result<bool> {
		self.questions.lock().push(question.to_string());
		Ok(self.answers.lock().pop_front().unwrap_or(false))
	}

	async fn select(&self, question: &str, _options: &[String]) -> Result<Option<usize>> {
		self.questions.lock().push(question.to_string());
		Ok(self.selections.lock().pop_front().flatten())
	}
}

/// Bundles the fakes and keeps them inspectable after `start` consumes the
/// trait objects.
pub struct World {
	pub directory: Arc<FakeDirectory>,
	pub provisioner: Arc<FakeProvisioner>,
	pub projects: Arc<FakeProjects>,
	pub translator: Arc<FakeTranslator>,
	pub prompt: Arc<ScriptedPrompt>,
}

impl World {
	pub fn new(
		directory: FakeDirectory,
		provisioner: FakeProvisioner,
		projects: FakeProjects,
		translator: FakeTranslator,
		prompt: ScriptedPrompt,
	) -> Self {
		Self {
			directory: Arc::new(directory),
			provisioner: Arc::new(provisioner),
			projects: Arc::new(projects),
			translator: Arc::new(translator),
			prompt: Arc::new(prompt),
		}
	}

	pub fn collaborators(&self) -> Collaborators {
		Collaborators {
			directory: Arc::clone(&self.directory) as _,
			provisioner: Arc::clone(&self.provisioner) as _,
			projects: Arc::clone(&self.projects) as _,
			translator: Arc::clone(&self.translator) as _,
			prompt: Arc::clone(&self.prompt) as _,
		}
	}
}
