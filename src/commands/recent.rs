// {{{ Imports
use anyhow::anyhow;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};

use crate::context::{Error, ErrorKind, PoiseContext, TagError, TaggedError};
use crate::osu::beatmap::{BeatmapMeta, BeatmapStore};
use crate::osu::play::Play;
use crate::servers::{GameServer, ServerLookup};
use crate::stats::snapshot::group_digits;

use super::args::{resolve_target, ParsedArgs};
use super::discord::MessageContext;
use super::whatif::describe_mods;
// }}}

// {{{ Implementation
/// The latest play of a player, next to what it could have been worth.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentPlay {
	pub play: Play,
	pub beatmap: BeatmapMeta,

	/// How many plays in a row were set on the same beatmap.
	pub retries: usize,
	pub full_combo_pp: Option<f64>,
	pub perfect_pp: Option<f64>,
}

#[inline]
fn display_pp(pp: Option<f64>) -> String {
	pp.map_or_else(|| "?".to_string(), |pp| format!("{pp:.2}"))
}

pub async fn recent_impl(
	ctx: &mut impl MessageContext,
	servers: &impl ServerLookup,
	args: &str,
) -> Result<RecentPlay, TaggedError> {
	let args = ParsedArgs::parse(args, &ParsedArgs::switches(servers));
	let target = resolve_target(ctx, servers, &args, args.positional.first().map(|s| s.as_str()))?;

	let info = target.server.find_user(&target.identity).await?;
	let recent = target
		.server
		.get_user_recent(info.player.id, target.mode, target.variant)
		.await?;

	let Some(play) = recent.first().cloned() else {
		return Err(anyhow!(
			"No recent plays found for {} on {}.",
			info.player.username,
			target.server.name()
		)
		.tag(ErrorKind::NotFound));
	};

	let retries = recent
		.iter()
		.take_while(|p| p.beatmap_id == play.beatmap_id)
		.count();

	let data = ctx.data();
	let beatmap = data.beatmaps.get(play.beatmap_id)?;
	let (full_combo_pp, perfect_pp) = match data.formulas.by_version(&play.formula_version) {
		Some(formula) => (
			formula.calculate(&play, &beatmap, true),
			formula.simulate(&beatmap, play.mode, play.mods),
		),
		None => (None, None),
	};

	let play_info = format!(
		"**Stats**: {}{} {}\n**PP**: {:.2}/{} (SS: {})",
		play.display_stats(Some(beatmap.max_combo)),
		describe_mods(play.mods),
		group_digits(play.score as i64),
		play.pp,
		display_pp(full_combo_pp),
		display_pp(perfect_pp)
	);

	let embed = CreateEmbed::default()
		.title(format!(
			"Recent play for {} on {}",
			info.player.username,
			target.server.name()
		))
		.description(format!(
			"**[{}]({})**\nStar rating: {:.2}",
			beatmap.display_title(),
			beatmap.url(),
			beatmap.star_rating
		))
		.field("Play info", play_info, false)
		.thumbnail(format!("https://b.ppy.sh/thumb/{}l.jpg", beatmap.set_id))
		.footer(CreateEmbedFooter::new(format!(
			"Try #{retries}, Play ID: {}",
			play.id
		)));

	ctx.send_embed(embed).await?;

	Ok(RecentPlay {
		play,
		beatmap,
		retries,
		full_combo_pp,
		perfect_pp,
	})
}
// }}}
// {{{ Discord wrapper
/// Show the latest play of a player
#[poise::command(prefix_command, slash_command, user_cooldown = 1)]
pub async fn recent(
	mut ctx: PoiseContext<'_>,
	#[rest]
	#[description = "Player, followed by flags like -std_rx or -server"]
	args: Option<String>,
) -> Result<(), Error> {
	let servers = &poise::Context::data(ctx).servers;
	let res = recent_impl(&mut ctx, servers, args.as_deref().unwrap_or_default()).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
