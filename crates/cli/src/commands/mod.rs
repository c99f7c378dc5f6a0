mod dev;

use loft::SessionOutcome;

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> anyhow::Result<SessionOutcome> {
	match cli.command {
		Commands::Dev(args) => dev::run(args).await,
	}
}
