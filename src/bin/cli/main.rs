use clap::Parser;
use command::{Cli, Command};
use mizuki::context::Error;
use mizuki::logs::init_tracing;

mod command;
mod commands;
mod context;

#[tokio::main]
async fn main() -> Result<(), Error> {
	init_tracing();

	let cli = Cli::parse();
	match cli.command {
		Command::Archive(args) => {
			commands::archive::run(args).await?;
		}
		Command::Whatif(args) => {
			commands::whatif::run(args).await?;
		}
	}

	Ok(())
}
