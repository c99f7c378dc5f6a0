//! `loft dev` command wiring: config, collaborators, signals, exit mapping.

use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use loft::collaborators::Collaborators;
use loft::{SessionConfig, SessionOutcome, shutdown_channel};
use tracing::info;

use crate::cli::DevArgs;
use crate::platform::PlatformClient;
use crate::prompt::StdinPrompt;
use crate::translator::LocalTranslator;

pub async fn run(args: DevArgs) -> anyhow::Result<SessionOutcome> {
	let project_dir = args
		.dir
		.canonicalize()
		.with_context(|| format!("project directory {} not found", args.dir.display()))?;
	let project_name = match args.project {
		Some(name) => name,
		None => project_dir
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.context("cannot derive a project name from the directory; pass --project")?,
	};

	let (hub_addr_tx, mut hub_addr_rx) = tokio::sync::mpsc::unbounded_channel();
	let config = SessionConfig::new(project_name, project_dir)
		.with_explicit_account(args.account)
		.with_hub_port(args.port)
		.with_assume_yes(args.yes)
		.with_teardown_on_exit(args.teardown_on_exit)
		.with_github_linked(args.github_linked)
		.with_hub_addr_notify(hub_addr_tx);
	tokio::spawn(async move {
		if let Some(addr) = hub_addr_rx.recv().await {
			eprintln!("{} update hub listening on {addr}", "live:".green().bold());
		}
	});

	let platform = Arc::new(PlatformClient::from_env()?);
	let collaborators = Collaborators {
		directory: Arc::clone(&platform) as _,
		provisioner: Arc::clone(&platform) as _,
		projects: platform as _,
		translator: Arc::new(LocalTranslator::new()),
		prompt: Arc::new(StdinPrompt),
	};

	let (handle, signal) = shutdown_channel();
	tokio::spawn({
		let handle = handle.clone();
		async move {
			// First interrupt asks for a graceful stop, a second escalates.
			if tokio::signal::ctrl_c().await.is_ok() {
				info!(target: "loft.cli", "interrupt received; shutting down");
				handle.trigger(true);
			}
			if tokio::signal::ctrl_c().await.is_ok() {
				handle.trigger(false);
			}
		}
	});

	let result = loft::start(config, collaborators, signal).await;
	let outcome = SessionOutcome::from_result(&result);
	if let Err(err) = result {
		match outcome {
			SessionOutcome::CleanExit => eprintln!("{err}"),
			_ => eprintln!("{} {err}", "session failed:".red().bold()),
		}
	}
	Ok(outcome)
}
