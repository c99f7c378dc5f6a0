//! Deployable component descriptors.

use serde::{Deserialize, Serialize};

/// Kind of a deployable unit within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
	Function,
	Surface,
	AppManifest,
}

impl ComponentKind {
	/// Human-readable label used in diagnostics.
	pub fn label(self) -> &'static str {
		match self {
			ComponentKind::Function => "function",
			ComponentKind::Surface => "surface",
			ComponentKind::AppManifest => "app manifest",
		}
	}
}

impl std::fmt::Display for ComponentKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.label())
	}
}

/// Distribution model an app component is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppDistribution {
	Public,
	Private,
}

/// One deployable unit of a project; used by the hub to address messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
	pub id: String,
	pub kind: ComponentKind,
	#[serde(default)]
	pub runnable: bool,
	/// Present only for app components; drives account capability checks.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub distribution: Option<AppDistribution>,
}

impl ComponentDescriptor {
	pub fn requires_public_apps(&self) -> bool {
		self.distribution == Some(AppDistribution::Public)
	}

	pub fn requires_private_apps(&self) -> bool {
		self.distribution == Some(AppDistribution::Private)
	}
}
