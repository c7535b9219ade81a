use crate::context::{Error, PoiseContext, TaggedError};
use crate::osu::mode::Variant;
use crate::servers::GameServer;

use discord::MessageContext;

pub mod args;
pub mod discord;
pub mod link;
pub mod recent;
pub mod show;
pub mod whatif;

// {{{ Help
/// Show this help menu
#[poise::command(prefix_command, track_edits, slash_command)]
pub async fn help(
	ctx: PoiseContext<'_>,
	#[description = "Specific command to show help about"]
	#[autocomplete = "poise::builtins::autocomplete_command"]
	command: Option<String>,
) -> Result<(), Error> {
	poise::builtins::help(
		ctx,
		command.as_deref(),
		poise::builtins::HelpConfiguration {
			extra_text_at_bottom: "Most commands accept flags like -std_rx or -server <name>",
			show_subcommands: true,
			..Default::default()
		},
	)
	.await?;
	Ok(())
}
// }}}
// {{{ Servers
async fn servers_impl(ctx: &mut impl MessageContext) -> Result<(), TaggedError> {
	let mut lines = vec!["Available servers:".to_string()];
	for server in ctx.data().servers.iter() {
		let variants = [(Variant::Relax, "relax"), (Variant::Autopilot, "autopilot")]
			.into_iter()
			.filter(|(variant, _)| server.supports(*variant))
			.map(|(_, name)| name)
			.collect::<Vec<_>>();

		if variants.is_empty() {
			lines.push(format!("- **{}**", server.name()));
		} else {
			lines.push(format!("- **{}** ({})", server.name(), variants.join(", ")));
		}
	}

	ctx.reply(&lines.join("\n")).await?;
	Ok(())
}

/// List the servers players can be looked up on
#[poise::command(prefix_command, slash_command)]
pub async fn servers(mut ctx: PoiseContext<'_>) -> Result<(), Error> {
	let res = servers_impl(&mut ctx).await;
	ctx.handle_error(res).await?;

	Ok(())
}

#[cfg(test)]
mod servers_tests {
	use super::*;
	use crate::context::testing::get_mock_context;

	#[tokio::test]
	async fn configured_servers_are_listed() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;
		servers_impl(&mut ctx).await?;

		assert_eq!(
			ctx.last_text(),
			Some("Available servers:\n- **akatsuki** (relax, autopilot)")
		);

		Ok(())
	}
}
// }}}
