// {{{ Imports
use anyhow::anyhow;

use crate::context::{Error, ErrorKind, PoiseContext, TagError, TaggedError};
use crate::osu::mode::{game_mode_list, game_mode_shorthand, parse_game_mode};
use crate::servers::{GameServer, PlayerIdentity, ServerLookup};
use crate::user::User;

use super::discord::MessageContext;
// }}}

// {{{ Link
async fn link_impl(
	ctx: &mut impl MessageContext,
	servers: &impl ServerLookup,
	username: &str,
	server_name: &str,
) -> Result<User, TaggedError> {
	let server = servers.lookup(server_name)?;
	let identity = username
		.parse::<PlayerIdentity>()
		.map_err(|e| e.tag(ErrorKind::InvalidInput))?;
	let info = server.find_user(&identity).await?;

	let user = User::link(ctx.data(), ctx.author_id(), server.name(), info.player.id)?;
	ctx.reply(&format!(
		"Linked {} ({}) on {}!",
		info.player.username,
		info.player.id,
		server.name()
	))
	.await?;

	Ok(user)
}

/// Link your discord account to a player on a server
#[poise::command(prefix_command, slash_command)]
pub async fn link(
	mut ctx: PoiseContext<'_>,
	#[description = "Your username or id on the server"] username: String,
	#[description = "The server to link to"] server: String,
) -> Result<(), Error> {
	let servers = &poise::Context::data(ctx).servers;
	let res = link_impl(&mut ctx, servers, &username, &server).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
// {{{ Default mode
async fn defaultmode_impl(ctx: &mut impl MessageContext, mode: &str) -> Result<User, TaggedError> {
	let (mode, variant) = parse_game_mode(mode).ok_or_else(|| {
		anyhow!("Unknown mode! Available modes: {}", game_mode_list()).tag(ErrorKind::InvalidInput)
	})?;

	let mut user = User::from_context(ctx)?;
	user.set_default_mode(ctx.data(), mode, variant)?;
	ctx.reply(&format!(
		"Set default mode to {}!",
		game_mode_shorthand(mode, variant)
	))
	.await?;

	Ok(user)
}

/// Pick the mode your commands default to
#[poise::command(prefix_command, slash_command)]
pub async fn defaultmode(
	mut ctx: PoiseContext<'_>,
	#[description = "One of std, std_rx, std_ap, taiko, taiko_rx, ctb, ctb_rx or mania"] mode: String,
) -> Result<(), Error> {
	let res = defaultmode_impl(&mut ctx, &mode).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
// {{{ Default server
async fn defaultserver_impl(
	ctx: &mut impl MessageContext,
	servers: &impl ServerLookup,
	server_name: &str,
) -> Result<User, TaggedError> {
	let server = servers.lookup(server_name)?;

	let mut user = User::from_context(ctx)?;
	user.set_default_server(ctx.data(), server.name())?;
	ctx.reply(&format!("Set default server to {}!", server.name()))
		.await?;

	Ok(user)
}

/// Pick the server your commands default to
#[poise::command(prefix_command, slash_command)]
pub async fn defaultserver(
	mut ctx: PoiseContext<'_>,
	#[description = "A server you are linked on"] server: String,
) -> Result<(), Error> {
	let servers = &poise::Context::data(ctx).servers;
	let res = defaultserver_impl(&mut ctx, servers, &server).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
