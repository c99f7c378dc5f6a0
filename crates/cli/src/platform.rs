//! REST glue implementing the core collaborator traits against the Loft
//! platform API. Thin by design: request shaping and error mapping only.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use loft::collaborators::{
	AccountCredential, AccountDirectory, ProjectApi, Provisioner, ProvisioningTicket, RemoteOperation,
};
use loft::poll::{StatusReport, StatusSource};
use loft::{LoftError, Result};
use loft_protocol::{AccountCandidate, AccountClass};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

pub struct PlatformClient {
	http: reqwest::Client,
	base_url: String,
	token: String,
}

impl PlatformClient {
	pub fn from_env() -> anyhow::Result<Self> {
		let base_url = std::env::var("LOFT_API_BASE").unwrap_or_else(|_| "https://api.loft.dev".to_string());
		let token = std::env::var("LOFT_API_TOKEN").context("LOFT_API_TOKEN is not set; run `loft auth` first")?;
		Ok(Self { http: reqwest::Client::new(), base_url, token })
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url.trim_end_matches('/'))
	}

	async fn get(&self, path: &str) -> Result<reqwest::Response> {
		self.http
			.get(self.url(path))
			.bearer_auth(&self.token)
			.send()
			.await
			.map_err(|err| LoftError::transport(err.to_string()))
	}

	async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
		self.http
			.post(self.url(path))
			.bearer_auth(&self.token)
			.json(&body)
			.send()
			.await
			.map_err(|err| LoftError::transport(err.to_string()))
	}

	fn status_source(&self, path: String) -> Box<dyn StatusSource> {
		Box::new(HttpStatusSource {
			http: self.http.clone(),
			url: self.url(&path),
			token: self.token.clone(),
		})
	}

	fn credentials_path() -> Result<PathBuf> {
		let base = dirs::config_dir().ok_or_else(|| {
			std::io::Error::new(std::io::ErrorKind::NotFound, "no user configuration directory")
		})?;
		Ok(base.join("loft").join("credentials.json"))
	}
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}
	let body = response.text().await.unwrap_or_default();
	Err(LoftError::transport(format!("platform returned {status}: {body}")))
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
	response.json().await.map_err(|err| LoftError::transport(err.to_string()))
}

struct HttpStatusSource {
	http: reqwest::Client,
	url: String,
	token: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
	status: String,
	#[serde(default)]
	detail: serde_json::Value,
}

#[async_trait]
impl StatusSource for HttpStatusSource {
	async fn fetch(&self) -> Result<StatusReport> {
		let response = self
			.http
			.get(&self.url)
			.bearer_auth(&self.token)
			.send()
			.await
			.map_err(|err| LoftError::transport(err.to_string()))?;
		let payload: StatusPayload = parse_json(expect_success(response).await?).await?;
		Ok(StatusReport::new(payload.status, payload.detail))
	}
}

#[async_trait]
impl AccountDirectory for PlatformClient {
	async fn list_authenticated(&self) -> Result<Vec<AccountCandidate>> {
		parse_json(expect_success(self.get("/v1/accounts").await?).await?).await
	}

	async fn default_account(&self) -> Result<Option<AccountCandidate>> {
		let response = self.get("/v1/accounts/default").await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		Ok(Some(parse_json(expect_success(response).await?).await?))
	}

	async fn persist_credential(&self, credential: &AccountCredential) -> Result<()> {
		let path = Self::credentials_path()?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let mut credentials: BTreeMap<String, String> = match std::fs::read(&path) {
			Ok(bytes) => serde_json::from_slice(&bytes)?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
			Err(err) => return Err(err.into()),
		};
		credentials.insert(credential.account_id.clone(), credential.token.clone());
		std::fs::write(&path, serde_json::to_vec_pretty(&credentials)?)?;
		debug!(target: "loft.platform", account = %credential.account_id, "credential persisted");
		Ok(())
	}
}

#[derive(Debug, Deserialize)]
struct ProvisionResponse {
	operation_id: String,
	account: AccountCandidate,
	token: String,
}

#[async_trait]
impl Provisioner for PlatformClient {
	async fn create_disposable_account(
		&self,
		parent: &AccountCandidate,
		class: AccountClass,
	) -> Result<ProvisioningTicket> {
		let body = serde_json::json!({ "parent_id": parent.id, "class": class });
		let response: ProvisionResponse =
			parse_json(expect_success(self.post("/v1/accounts", body).await?).await?).await?;
		let source = self.status_source(format!("/v1/operations/{}", response.operation_id));
		Ok(ProvisioningTicket {
			operation: RemoteOperation { id: response.operation_id, source },
			credential: AccountCredential {
				account_id: response.account.id.clone(),
				token: response.token,
			},
			account: response.account,
		})
	}

	async fn teardown_account(&self, account: &AccountCandidate) -> Result<()> {
		let response = self
			.http
			.delete(self.url(&format!("/v1/accounts/{}", account.id)))
			.bearer_auth(&self.token)
			.send()
			.await
			.map_err(|err| LoftError::transport(err.to_string()))?;
		expect_success(response).await?;
		Ok(())
	}
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
	build_id: String,
}

#[derive(Debug, Deserialize)]
struct DeployResponse {
	deploy_id: String,
}

#[derive(Debug, Deserialize)]
struct DeployedBuild {
	#[serde(default)]
	fingerprint: Option<String>,
}

#[async_trait]
impl ProjectApi for PlatformClient {
	async fn project_exists(&self, account: &AccountCandidate, name: &str) -> Result<bool> {
		let response = self.get(&format!("/v1/accounts/{}/projects/{name}", account.id)).await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(false);
		}
		expect_success(response).await?;
		Ok(true)
	}

	async fn create_project(&self, account: &AccountCandidate, name: &str) -> Result<()> {
		let body = serde_json::json!({ "name": name });
		expect_success(self.post(&format!("/v1/accounts/{}/projects", account.id), body).await?).await?;
		Ok(())
	}

	async fn deployed_fingerprint(&self, account: &AccountCandidate, name: &str) -> Result<Option<String>> {
		let response = self
			.get(&format!("/v1/accounts/{}/projects/{name}/deploys/current", account.id))
			.await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let deployed: DeployedBuild = parse_json(expect_success(response).await?).await?;
		Ok(deployed.fingerprint)
	}

	async fn upload_build(&self, account: &AccountCandidate, name: &str, archive: Vec<u8>) -> Result<RemoteOperation> {
		let response = self
			.http
			.post(self.url(&format!("/v1/accounts/{}/projects/{name}/builds", account.id)))
			.bearer_auth(&self.token)
			.header(reqwest::header::CONTENT_TYPE, "application/gzip")
			.body(archive)
			.send()
			.await
			.map_err(|err| LoftError::transport(err.to_string()))?;
		if response.status() == StatusCode::CONFLICT {
			return Err(LoftError::ProjectLocked { project: name.to_string() });
		}
		let upload: UploadResponse = parse_json(expect_success(response).await?).await?;
		let source = self.status_source(format!(
			"/v1/accounts/{}/projects/{name}/builds/{}/status",
			account.id, upload.build_id
		));
		Ok(RemoteOperation { id: upload.build_id, source })
	}

	async fn deploy_build(&self, account: &AccountCandidate, build_id: &str) -> Result<RemoteOperation> {
		let body = serde_json::json!({ "build_id": build_id });
		let response = self.post(&format!("/v1/accounts/{}/deploys", account.id), body).await?;
		let deploy: DeployResponse = parse_json(expect_success(response).await?).await?;
		let source = self.status_source(format!("/v1/accounts/{}/deploys/{}/status", account.id, deploy.deploy_id));
		Ok(RemoteOperation { id: deploy.deploy_id, source })
	}

	async fn restart_component(&self, account: &AccountCandidate, component_id: &str) -> Result<()> {
		let body = serde_json::json!({});
		let path = format!("/v1/accounts/{}/components/{component_id}/restart", account.id);
		expect_success(self.post(&path, body).await?).await?;
		Ok(())
	}
}
