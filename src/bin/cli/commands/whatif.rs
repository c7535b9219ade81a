use crate::context::CliContext;
use mizuki::commands::discord::MessageContext;
use mizuki::commands::whatif::whatif_impl;
use mizuki::context::{Error, UserContext};

#[derive(clap::Args)]
pub struct Args {
	/// Player, then either a pp value or <count> <pp> pairs. Flags like
	/// -std_rx and -server work the same as on discord.
	#[arg(allow_hyphen_values = true, trailing_var_arg = true)]
	args: Vec<String>,
}

pub async fn run(args: Args) -> Result<(), Error> {
	let mut ctx = CliContext::new(UserContext::new()?)?;
	let servers = ctx.data.servers.clone();

	let res = whatif_impl(&mut ctx, &servers, &args.args.join(" ")).await;
	ctx.handle_error(res).await?;

	Ok(())
}
