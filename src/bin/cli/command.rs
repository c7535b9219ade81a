#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
	/// Commit today's archive of every linked player
	Archive(crate::commands::archive::Args),

	/// Compute the total pp of a player after setting some new plays
	Whatif(crate::commands::whatif::Args),
}
