//! Command-line surface for `loft`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "loft", about = "Loft platform developer CLI", version)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
	/// Iteratively build and preview a project against a live account.
	Dev(DevArgs),
}

#[derive(Debug, Args)]
pub struct DevArgs {
	/// Project name; defaults to the project directory's name.
	#[arg(long)]
	pub project: Option<String>,

	/// Project directory.
	#[arg(long, default_value = ".")]
	pub dir: PathBuf,

	/// Build against a specific account id instead of resolving one.
	#[arg(long)]
	pub account: Option<String>,

	/// Local port for the update hub; 0 picks a free port.
	#[arg(long, default_value_t = 0)]
	pub port: u16,

	/// Answer yes to every confirmation (non-interactive use).
	#[arg(long, short = 'y')]
	pub yes: bool,

	/// Tear down a session-provisioned account when the session ends.
	#[arg(long)]
	pub teardown_on_exit: bool,

	/// The project builds from GitHub pushes; disable manual redeploys.
	#[arg(long)]
	pub github_linked: bool,
}
