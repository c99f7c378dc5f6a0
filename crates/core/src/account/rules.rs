//! Ordered account-selection rules, evaluated top-down; first match wins.
//!
//! Each rule is a pure function of [`RuleInput`], so every branch of the
//! decision tree is testable without prompts or network.

use loft_protocol::{AccountCandidate, AccountClass, ComponentDescriptor, ComponentKind};

use crate::error::{LoftError, Result};

/// Everything the rules may look at. Gathered once by the resolver.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
	pub explicit: Option<&'a str>,
	pub components: &'a [ComponentDescriptor],
	pub default_account: Option<&'a AccountCandidate>,
	pub authenticated: &'a [AccountCandidate],
}

/// What the winning rule wants done. Side effects happen in the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleDecision<'a> {
	/// Explicit account validated; use it without further prompting.
	UseExplicit(&'a AccountCandidate),
	/// Default account fits; confirm before using it.
	ConfirmDefault(&'a AccountCandidate),
	/// Already-authenticated accounts fit, in directory order; offer reuse.
	OfferExisting(Vec<&'a AccountCandidate>),
	/// Nothing fits; offer provisioning a new disposable account.
	OfferProvision {
		parent: Option<&'a AccountCandidate>,
		class: AccountClass,
	},
}

/// Account class recommended for this component mix.
pub fn recommended_class(components: &[ComponentDescriptor]) -> AccountClass {
	if components.iter().any(ComponentDescriptor::requires_public_apps) {
		AccountClass::AppDeveloper
	} else {
		AccountClass::DeveloperTest
	}
}

/// First component kind `account` cannot host, if any.
pub fn capability_gap(account: &AccountCandidate, components: &[ComponentDescriptor]) -> Option<ComponentKind> {
	components
		.iter()
		.find(|component| {
			(component.requires_public_apps() && !account.supports_public_apps)
				|| (component.requires_private_apps() && !account.supports_private_apps)
		})
		.map(|component| component.kind)
}

fn fits(account: &AccountCandidate, class: AccountClass, components: &[ComponentDescriptor]) -> bool {
	account.class == class && capability_gap(account, components).is_none()
}

/// Rule 1: an explicitly supplied account is validated, never substituted.
pub fn rule_explicit<'a>(input: &RuleInput<'a>) -> Option<Result<RuleDecision<'a>>> {
	let wanted = input.explicit?;
	let Some(account) = input.authenticated.iter().find(|account| account.id == wanted) else {
		return Some(Err(LoftError::UnknownAccount { account: wanted.to_string() }));
	};
	match capability_gap(account, input.components) {
		Some(component) => Some(Err(LoftError::CapabilityMismatch {
			account: account.id.clone(),
			component,
		})),
		None => Some(Ok(RuleDecision::UseExplicit(account))),
	}
}

/// Rule 2: the configured default already matches the recommended class.
pub fn rule_default<'a>(input: &RuleInput<'a>) -> Option<RuleDecision<'a>> {
	let default = input.default_account?;
	fits(default, recommended_class(input.components), input.components)
		.then_some(RuleDecision::ConfirmDefault(default))
}

/// Rule 3: already-authenticated accounts matching the recommended class.
pub fn rule_existing<'a>(input: &RuleInput<'a>) -> Option<RuleDecision<'a>> {
	let class = recommended_class(input.components);
	let matches: Vec<&AccountCandidate> = input
		.authenticated
		.iter()
		.filter(|account| fits(account, class, input.components))
		.collect();
	(!matches.is_empty()).then_some(RuleDecision::OfferExisting(matches))
}

/// Rule 4: offer provisioning under the current default as parent.
pub fn rule_provision<'a>(input: &RuleInput<'a>) -> RuleDecision<'a> {
	RuleDecision::OfferProvision {
		parent: input.default_account,
		class: recommended_class(input.components),
	}
}

/// Evaluates the rules in priority order.
pub fn decide<'a>(input: &RuleInput<'a>) -> Result<RuleDecision<'a>> {
	if let Some(decision) = rule_explicit(input) {
		return decision;
	}
	if let Some(decision) = rule_default(input) {
		return Ok(decision);
	}
	if let Some(decision) = rule_existing(input) {
		return Ok(decision);
	}
	Ok(rule_provision(input))
}
