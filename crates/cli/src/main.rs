use clap::Parser;
use colored::Colorize;
use loft::SessionOutcome;

mod cli;
mod commands;
mod platform;
mod prompt;
mod translator;

#[tokio::main]
async fn main() {
	init_tracing();

	let cli = cli::Cli::parse();
	let code = match commands::dispatch(cli).await {
		Ok(SessionOutcome::Success | SessionOutcome::CleanExit) => 0,
		Ok(SessionOutcome::Fatal) => 1,
		Err(err) => {
			eprintln!("{} {err:#}", "error:".red().bold());
			1
		}
	};
	std::process::exit(code);
}

fn init_tracing() {
	use tracing_subscriber::EnvFilter;

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loft=info")))
		.with_writer(std::io::stderr)
		.init();
}
