//! Account classes and candidate account shapes.

use serde::{Deserialize, Serialize};

/// Class of a backend account, ordered roughly from most to least permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountClass {
	Standard,
	Sandbox,
	DeveloperTest,
	AppDeveloper,
}

impl AccountClass {
	/// Human-readable label used in prompts and diagnostics.
	pub fn label(self) -> &'static str {
		match self {
			AccountClass::Standard => "standard",
			AccountClass::Sandbox => "sandbox",
			AccountClass::DeveloperTest => "developer test",
			AccountClass::AppDeveloper => "app developer",
		}
	}

	/// Whether accounts of this class are disposable dev/test accounts.
	pub fn is_disposable(self) -> bool {
		matches!(self, AccountClass::DeveloperTest | AccountClass::AppDeveloper)
	}
}

impl std::fmt::Display for AccountClass {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.label())
	}
}

/// A resolved backend account a session can build against or test in.
///
/// Read-only once resolved; capability flags describe what the account can
/// host, not what the current project needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCandidate {
	pub id: String,
	pub name: String,
	pub class: AccountClass,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent_id: Option<String>,
	#[serde(default)]
	pub supports_public_apps: bool,
	#[serde(default)]
	pub supports_private_apps: bool,
}

impl AccountCandidate {
	/// Whether `other` is this account or a descendant in its account family.
	pub fn is_family_of(&self, other: &AccountCandidate) -> bool {
		other.id == self.id || other.parent_id.as_deref() == Some(self.id.as_str())
	}
}
