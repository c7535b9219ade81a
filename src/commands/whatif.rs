// {{{ Imports
use anyhow::anyhow;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};

use crate::context::{Error, ErrorKind, PoiseContext, TagError, TaggedError};
use crate::osu::beatmap::BeatmapStore;
use crate::osu::mods::Mods;
use crate::osu::play::Play;
use crate::osu::recalc::{BonusPp, Hypothesis, Recalculation, RecalculationEngine, WEIGHTED_PLAY_LIMIT};
use crate::servers::{GameServer, ServerLookup, UserInfo};
use crate::stats::snapshot::group_decimal;

use super::args::{resolve_target, ParsedArgs, Target};
use super::discord::MessageContext;
// }}}

// {{{ Shared helpers
/// How many unchoked plays are listed.
const SHOWN_CHOKES: usize = 5;

/// The current total and best plays of a target.
async fn fetch_ranking<S: GameServer>(
	target: &Target<'_, S>,
) -> Result<(UserInfo, f64, Vec<Play>), TaggedError> {
	let info = target.server.find_user(&target.identity).await?;
	let total = info
		.stats_for(target.mode, target.variant)
		.and_then(|stats| stats.fields.pp)
		.ok_or_else(|| {
			anyhow!(
				"{} has no pp for this mode on {}!",
				info.player.username,
				target.server.name()
			)
			.tag(ErrorKind::NotFound)
		})?;

	let best = target
		.server
		.get_user_best(info.player.id, target.mode, target.variant)
		.await?;

	if best.is_empty() {
		return Err(anyhow!("No plays found on {}!", target.server.name()).tag(ErrorKind::NotFound));
	}

	Ok((info, total, best))
}

fn gain_description(result: &Recalculation, gain: f64) -> String {
	format!(
		"They would gain about **{gain:.2}pp**\ntotal pp would become **{}pp**.",
		group_decimal(result.new_total, 2)
	)
}

fn bonus_footer(bonus: BonusPp) -> CreateEmbedFooter {
	let mut text = format!("Bonus PP status: {:.0}%", bonus.percentage_filled());
	if bonus.is_inconsistent() {
		text.push_str(" (the reported total is lower than the top plays add up to)");
	}

	CreateEmbedFooter::new(text)
}
// }}}
// {{{ Whatif
// {{{ Value parsing
fn parse_pp(raw: &str) -> Result<f64, TaggedError> {
	raw.parse::<f64>()
		.ok()
		.filter(|v| v.is_finite() && *v >= 0.0)
		.ok_or_else(|| anyhow!("`{raw}` is not a valid pp value.").tag(ErrorKind::InvalidInput))
}

/// Values are written with digits, names like `inf` or `1e3` are players.
fn looks_like_value(token: &str) -> bool {
	token.chars().any(|c| c.is_ascii_digit()) && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// A single value is inserted once. Longer lists are read as
/// `<count> <pp>` pairs, with a trailing value inserted once.
pub fn parse_hypothesis_values(tokens: &[String]) -> Result<Vec<f64>, TaggedError> {
	if let [single] = tokens {
		return Ok(vec![parse_pp(single)?]);
	}

	let mut values = Vec::new();
	for chunk in tokens.chunks(2) {
		match chunk {
			[count, pp] => {
				let count = count.parse::<usize>().map_err(|_| {
					anyhow!("`{count}` is not a valid amount of plays.").tag(ErrorKind::InvalidInput)
				})?;

				// Values past the top plays don't count towards the total
				let count = count.min(WEIGHTED_PLAY_LIMIT);
				values.extend(std::iter::repeat(parse_pp(pp)?).take(count));
			}
			rest => {
				for pp in rest {
					values.push(parse_pp(pp)?);
				}
			}
		}
	}

	Ok(values)
}
// }}}
// {{{ Implementation
pub async fn whatif_impl(
	ctx: &mut impl MessageContext,
	servers: &impl ServerLookup,
	args: &str,
) -> Result<Recalculation, TaggedError> {
	let args = ParsedArgs::parse(args, &ParsedArgs::switches(servers));

	let (player, values) = match args.positional.split_first() {
		Some((first, rest)) if !looks_like_value(first) => (Some(first.as_str()), rest),
		_ => (None, args.positional.as_slice()),
	};

	if values.is_empty() {
		return Err(
			anyhow!("Usage: whatif [player] <pp> or whatif [player] <count> <pp> ...")
				.tag(ErrorKind::InvalidInput),
		);
	}

	let values = parse_hypothesis_values(values)?;
	let target = resolve_target(ctx, servers, &args, player)?;
	let (info, total, best) = fetch_ranking(&target).await?;

	let data = ctx.data();
	let result = RecalculationEngine::new(&data.formulas, &data.beatmaps).recalculate(
		&best,
		total,
		&Hypothesis::Insert(values.clone()),
	)?;

	let Some(gain) = result.gain else {
		ctx.reply("You wouldn't gain pp.").await?;
		return Ok(result);
	};

	let title = match values.as_slice() {
		[value] => format!("What if {} set a {value}pp play?", info.player.username),
		_ => format!("What if {} set a lot of plays?", info.player.username),
	};

	let mut description = String::new();
	if let Some(position) = result.rank_position.filter(|p| *p <= WEIGHTED_PLAY_LIMIT) {
		description.push_str(&format!("It would be their #{position} top play.\n"));
	}
	description.push_str(&gain_description(&result, gain));

	let embed = CreateEmbed::default()
		.title(title)
		.description(description)
		.thumbnail(target.server.avatar_url(info.player.id))
		.footer(bonus_footer(result.bonus));

	ctx.send_embed(embed).await?;

	Ok(result)
}
// }}}
// {{{ Discord wrapper
/// Compute the total pp of a player after setting some new plays
#[poise::command(prefix_command, slash_command, user_cooldown = 1)]
pub async fn whatif(
	mut ctx: PoiseContext<'_>,
	#[rest]
	#[description = "Player, then either a pp value or <count> <pp> pairs"]
	args: String,
) -> Result<(), Error> {
	let servers = &poise::Context::data(ctx).servers;
	let res = whatif_impl(&mut ctx, servers, &args).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
// }}}
// {{{ Nochoke
// {{{ Implementation
pub(super) fn describe_mods(mods: Mods) -> String {
	if mods == Mods::NONE {
		String::new()
	} else {
		format!(" +{mods}")
	}
}

pub async fn nochoke_impl(
	ctx: &mut impl MessageContext,
	servers: &impl ServerLookup,
	args: &str,
) -> Result<Recalculation, TaggedError> {
	let args = ParsedArgs::parse(args, &ParsedArgs::switches(servers));
	let target = resolve_target(ctx, servers, &args, args.positional.first().map(|s| s.as_str()))?;
	let (info, total, best) = fetch_ranking(&target).await?;

	let data = ctx.data();
	let result = RecalculationEngine::new(&data.formulas, &data.beatmaps).remove_chokes(&best, total)?;

	let Some(gain) = result.gain else {
		ctx.reply("Every top play is already a full combo!").await?;
		return Ok(result);
	};

	let mut unchoked = result.unchoked.iter().collect::<Vec<_>>();
	unchoked.sort_by(|a, b| b.gain().total_cmp(&a.gain()));

	let mut embed = CreateEmbed::default()
		.title(format!(
			"What if {} full comboed every play?",
			info.player.username
		))
		.description(gain_description(&result, gain))
		.thumbnail(target.server.avatar_url(info.player.id))
		.footer(bonus_footer(result.bonus));

	for choke in unchoked.into_iter().take(SHOWN_CHOKES) {
		let beatmap = ctx.data().beatmaps.get(choke.play.beatmap_id)?;
		embed = embed.field(
			format!(
				"#{} {}{}",
				choke.index + 1,
				beatmap.display_title(),
				describe_mods(choke.play.mods)
			),
			format!(
				"[{:.2}pp -> **{:.2}pp**]({}) (+{:.2}pp)\n{}",
				choke.previous_pp,
				choke.play.pp,
				beatmap.url(),
				choke.gain(),
				choke.play.display_stats(Some(beatmap.max_combo))
			),
			false,
		);
	}

	ctx.send_embed(embed).await?;

	Ok(result)
}
// }}}
// {{{ Tests
#[cfg(test)]
mod nochoke_tests {
	use super::*;
	use crate::context::testing::get_mock_context;
	use crate::osu::mode::{Mode, Variant};
	use crate::osu::play::play_tests::{beatmap, choked_play};
	use crate::servers::mock::MockServer;
	use crate::servers::ModeStats;
	use crate::stats::snapshot::StatFields;
	use crate::user::User;

	#[tokio::test]
	async fn chokes_are_listed_by_gain() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;
		for id in 1..=3 {
			ctx.data.beatmaps.remember(&beatmap(id, 1400))?;
		}

		let mut fc = choked_play(1, 300.0);
		fc.full_combo = true;
		fc.judgements.count_miss = 0;

		let server = MockServer::new(StatFields {
			pp: Some(900.0),
			..Default::default()
		})
		.with_best(
			Mode::Standard,
			Variant::Vanilla,
			vec![fc, choked_play(2, 250.0), choked_play(3, 200.0)],
		);

		let result = nochoke_impl(&mut ctx, &server, "cookiezi").await?;
		assert_eq!(result.unchoked.len(), 2);
		assert!(result.new_total > result.previous_total);

		let embed = ctx.last_embed().unwrap();
		assert_eq!(embed["title"], "What if cookiezi full comboed every play?");

		let fields = embed["fields"].as_array().unwrap();
		assert_eq!(fields.len(), 2);
		assert_eq!(fields[0]["name"], "#2 artist - map 2 [Insane] +HD");
		assert_eq!(fields[1]["name"], "#3 artist - map 3 [Insane] +HD");

		Ok(())
	}

	#[tokio::test]
	async fn relax_rankings_can_be_unchoked() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;
		ctx.data.beatmaps.remember(&beatmap(2, 1400))?;
		User::link(&ctx.data, 666, "akatsuki", 1001)?;

		// Plays are tagged the way the configured server tags them
		let tags = ctx.data.config.servers[0].formulas.clone();
		let mut play = choked_play(2, 250.0);
		play.formula_version = tags.for_variant(Variant::Relax).to_string();

		let server = MockServer::new(StatFields::default())
			.with_best(Mode::Standard, Variant::Relax, vec![play]);
		server.stats.lock().unwrap().push(ModeStats {
			mode: Mode::Standard,
			variant: Variant::Relax,
			fields: StatFields {
				pp: Some(260.0),
				..Default::default()
			},
		});

		let result = nochoke_impl(&mut ctx, &server, "-std_rx").await?;
		assert_eq!(result.unchoked.len(), 1);
		assert!(result.gain.unwrap() > 0.0);
		assert!(result.new_total > result.previous_total);

		Ok(())
	}

	#[tokio::test]
	async fn full_combos_need_no_fixing() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;

		let mut fc = choked_play(1, 300.0);
		fc.full_combo = true;
		fc.judgements.count_miss = 0;

		let server = MockServer::new(StatFields {
			pp: Some(700.0),
			..Default::default()
		})
		.with_best(Mode::Standard, Variant::Vanilla, vec![fc]);

		let result = nochoke_impl(&mut ctx, &server, "cookiezi").await?;
		assert_eq!(result.gain, None);
		assert_eq!(ctx.last_text(), Some("Every top play is already a full combo!"));

		Ok(())
	}

	#[tokio::test]
	async fn unknown_beatmaps_abort_the_recalculation() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;
		let server = MockServer::new(StatFields {
			pp: Some(700.0),
			..Default::default()
		})
		.with_best(Mode::Standard, Variant::Vanilla, vec![choked_play(7, 250.0)]);

		let err = nochoke_impl(&mut ctx, &server, "cookiezi").await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);
		assert!(ctx.messages.is_empty());

		Ok(())
	}
}
// }}}
// {{{ Discord wrapper
/// Compute the total pp of a player if none of their top plays had chokes
#[poise::command(prefix_command, slash_command, user_cooldown = 1)]
pub async fn nochoke(
	mut ctx: PoiseContext<'_>,
	#[rest]
	#[description = "Player, followed by flags like -std_rx or -server"]
	args: Option<String>,
) -> Result<(), Error> {
	let servers = &poise::Context::data(ctx).servers;
	let res = nochoke_impl(&mut ctx, servers, args.as_deref().unwrap_or_default()).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
// }}}
