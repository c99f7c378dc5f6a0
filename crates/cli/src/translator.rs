//! Local source translation: component discovery and build archives.
//!
//! Scans `components/*/loft.json` manifests for descriptors, packs the
//! project tree into a tar.gz build archive, and fingerprints the tree for
//! drift comparison against the last deployed build.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use loft::Result;
use loft::collaborators::{SourceTranslator, TranslatedProject};
use loft_protocol::{AccountCandidate, AppDistribution, ComponentDescriptor, ComponentKind};
use serde::Deserialize;
use tracing::debug;

const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", ".git"];

#[derive(Debug, Deserialize)]
struct ComponentManifest {
	name: String,
	kind: ComponentKind,
	#[serde(default)]
	runnable: bool,
	#[serde(default)]
	distribution: Option<AppDistribution>,
}

pub struct LocalTranslator;

impl LocalTranslator {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl SourceTranslator for LocalTranslator {
	async fn discover_components(&self, project_dir: &Path) -> Result<Vec<ComponentDescriptor>> {
		let project_dir = project_dir.to_path_buf();
		tokio::task::spawn_blocking(move || discover(&project_dir))
			.await
			.map_err(|err| std::io::Error::other(err))?
	}

	async fn translate(&self, project_dir: &Path, account: &AccountCandidate) -> Result<TranslatedProject> {
		let project_dir = project_dir.to_path_buf();
		let account_id = account.id.clone();
		tokio::task::spawn_blocking(move || translate(&project_dir, &account_id))
			.await
			.map_err(|err| std::io::Error::other(err))?
	}
}

fn discover(project_dir: &Path) -> Result<Vec<ComponentDescriptor>> {
	let components_dir = project_dir.join("components");
	let mut components = Vec::new();
	let Ok(entries) = std::fs::read_dir(&components_dir) else {
		return Ok(components);
	};
	let mut dirs: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
	dirs.sort();
	for dir in dirs {
		let manifest_path = dir.join("loft.json");
		if !manifest_path.is_file() {
			continue;
		}
		let manifest: ComponentManifest = serde_json::from_slice(&std::fs::read(&manifest_path)?)?;
		components.push(ComponentDescriptor {
			id: manifest.name,
			kind: manifest.kind,
			runnable: manifest.runnable,
			distribution: manifest.distribution,
		});
	}
	debug!(target: "loft.translator", count = components.len(), "discovered components");
	Ok(components)
}

fn translate(project_dir: &Path, account_id: &str) -> Result<TranslatedProject> {
	let components = discover(project_dir)?;

	let mut files = Vec::new();
	collect_files(project_dir, project_dir, &mut files)?;
	files.sort();

	let mut hasher = DefaultHasher::new();
	account_id.hash(&mut hasher);
	for path in &files {
		path.hash(&mut hasher);
		std::fs::read(project_dir.join(path))?.hash(&mut hasher);
	}
	let fingerprint = format!("{:016x}", hasher.finish());

	let encoder = GzEncoder::new(Vec::new(), Compression::default());
	let mut builder = tar::Builder::new(encoder);
	for path in &files {
		builder.append_path_with_name(project_dir.join(path), path)?;
	}
	let archive = builder.into_inner()?.finish()?;

	Ok(TranslatedProject { fingerprint, archive, components })
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		let name = entry.file_name();
		let name = name.to_string_lossy();
		if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
			continue;
		}
		if path.is_dir() {
			collect_files(root, &path, files)?;
		} else if let Ok(relative) = path.strip_prefix(root) {
			files.push(relative.to_path_buf());
		}
	}
	Ok(())
}
