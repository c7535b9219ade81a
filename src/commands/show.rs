// {{{ Imports
use anyhow::anyhow;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};

use crate::context::{Error, ErrorKind, PoiseContext, TagError, TaggedError};
use crate::osu::mode::game_mode_shorthand;
use crate::servers::{GameServer, ServerLookup};
use crate::stats::cache::SnapshotComparison;
use crate::stats::snapshot::{CheckpointKey, SnapshotKey};
use crate::user::User;

use super::args::{resolve_target, ParsedArgs};
use super::discord::MessageContext;
// }}}

// {{{ Show
// {{{ Implementation
fn parse_date(args: &ParsedArgs) -> Result<Option<NaiveDate>, TaggedError> {
	if !args.has("compare_to") {
		return Ok(None);
	}

	args.value("compare_to")
		.and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
		.map(Some)
		.ok_or_else(|| anyhow!("Invalid date format! Use YYYY-MM-DD!").tag(ErrorKind::InvalidInput))
}

pub async fn show_impl(
	ctx: &mut impl MessageContext,
	servers: &impl ServerLookup,
	args: &str,
	now: NaiveDateTime,
) -> Result<SnapshotComparison, TaggedError> {
	let args = ParsedArgs::parse(args, &ParsedArgs::switches(servers));
	let date = parse_date(&args)?;
	let target = resolve_target(ctx, servers, &args, args.positional.first().map(|s| s.as_str()))?;

	let info = target.server.find_user(&target.identity).await?;
	let key = SnapshotKey {
		server: target.server.name().to_string(),
		player_id: info.player.id,
		mode: target.mode,
		variant: target.variant,
	};

	let snapshots = &ctx.data().snapshots;
	let comparison = match date {
		Some(date) => {
			snapshots
				.compare_with_archive(&key, date, target.server, now)
				.await?
		}
		None => {
			let key = CheckpointKey {
				target: key,
				viewer_id: ctx.author_id(),
			};

			snapshots.compute_delta(&key, target.server, now).await?
		}
	};

	let footer = match date {
		Some(date) => format!("Compared to {date}"),
		None => format!(
			"Compared to {} UTC",
			comparison.baseline.captured_at.format("%Y-%m-%d %H:%M")
		),
	};

	let mut embed = CreateEmbed::default()
		.title(format!(
			"Stats for {} on {}",
			info.player.username,
			target.server.name()
		))
		.description(format!(
			"Mode: `{}`",
			game_mode_shorthand(target.mode, target.variant)
		))
		.thumbnail(target.server.avatar_url(info.player.id))
		.footer(CreateEmbedFooter::new(footer));

	for delta in comparison.deltas() {
		embed = embed.field(delta.descriptor.label, delta.render(), true);
	}

	ctx.send_embed(embed).await?;

	Ok(comparison)
}
// }}}
// {{{ Tests
#[cfg(test)]
mod show_tests {
	use chrono::TimeDelta;

	use super::*;
	use crate::commands::discord::mock::MockContext;
	use crate::context::testing::get_mock_context;
	use crate::servers::mock::MockServer;
	use crate::stats::snapshot::StatFields;

	fn fields(pp: f64, play_count: i64) -> StatFields {
		StatFields {
			pp: Some(pp),
			play_count: Some(play_count),
			global_rank: Some(1200),
			..Default::default()
		}
	}

	fn start() -> NaiveDateTime {
		NaiveDate::from_ymd_opt(2024, 3, 1)
			.unwrap()
			.and_hms_opt(12, 0, 0)
			.unwrap()
	}

	fn field_value<'a>(ctx: &'a MockContext, label: &str) -> &'a str {
		ctx.last_embed().unwrap()["fields"]
			.as_array()
			.unwrap()
			.iter()
			.find(|f| f["name"] == label)
			.and_then(|f| f["value"].as_str())
			.unwrap()
	}

	#[tokio::test]
	async fn progress_is_shown_once_the_window_passes() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;
		let server = MockServer::new(fields(8000.0, 500));

		show_impl(&mut ctx, &server, "cookiezi", start()).await?;
		let embed = ctx.last_embed().unwrap();
		assert_eq!(embed["title"], "Stats for cookiezi on akatsuki");
		assert_eq!(field_value(&ctx, "Performance points"), "8000pp");

		server.set_fields(fields(8100.0, 520));

		// Within the freshness window the baseline is reused
		let within = show_impl(&mut ctx, &server, "cookiezi", start() + TimeDelta::minutes(2)).await?;
		assert_eq!(within.current, within.baseline);
		assert_eq!(field_value(&ctx, "Performance points"), "8000pp");

		let later = start() + TimeDelta::minutes(30);
		let after = show_impl(&mut ctx, &server, "cookiezi", later).await?;
		assert_eq!(after.baseline.captured_at, start());
		assert_eq!(after.current.captured_at, later);
		assert_eq!(field_value(&ctx, "Performance points"), "8100pp\n(+100)");
		assert_eq!(field_value(&ctx, "Play count"), "520\n(+20)");

		Ok(())
	}

	#[tokio::test]
	async fn archives_must_exist() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;
		let server = MockServer::new(fields(8000.0, 500));

		let err = show_impl(&mut ctx, &server, "cookiezi -compare_to 2024-02-30", start())
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::InvalidInput);

		let err = show_impl(&mut ctx, &server, "cookiezi -compare_to 2024-02-01", start())
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);

		let key = SnapshotKey {
			server: "akatsuki".to_string(),
			player_id: 1001,
			mode: crate::osu::mode::Mode::Standard,
			variant: crate::osu::mode::Variant::Vanilla,
		};
		let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
		ctx.data.snapshots.commit_archive(&key, date, &fields(7500.0, 400))?;

		show_impl(&mut ctx, &server, "cookiezi -compare_to 2024-02-01", start()).await?;
		assert_eq!(field_value(&ctx, "Performance points"), "8000pp\n(+500)");
		assert_eq!(ctx.last_embed().unwrap()["footer"]["text"], "Compared to 2024-02-01");

		Ok(())
	}

	#[tokio::test]
	async fn unknown_players_are_not_found() -> Result<(), TaggedError> {
		let (mut ctx, _guard) = get_mock_context()?;
		let server = MockServer::new(fields(8000.0, 500));

		let err = show_impl(&mut ctx, &server, "peppy", start()).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);

		let res = show_impl(&mut ctx, &server, "peppy", start()).await;
		ctx.handle_error(res).await?;
		assert_eq!(ctx.last_text(), Some("User peppy not found on akatsuki!"));

		Ok(())
	}
}
// }}}
// {{{ Discord wrapper
/// Show the stats of a player, and how they changed since you last looked
#[poise::command(prefix_command, slash_command, user_cooldown = 1)]
pub async fn show(
	mut ctx: PoiseContext<'_>,
	#[rest]
	#[description = "Player, followed by flags like -std_rx, -server or -compare_to YYYY-MM-DD"]
	args: Option<String>,
) -> Result<(), Error> {
	let servers = &poise::Context::data(ctx).servers;
	let now = Utc::now().naive_utc();
	let res = show_impl(&mut ctx, servers, args.as_deref().unwrap_or_default(), now).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
// }}}
// {{{ Reset
async fn reset_impl(ctx: &mut impl MessageContext) -> Result<usize, TaggedError> {
	let user = User::from_context(ctx)?;
	let deleted = ctx.data().snapshots.reset(user.discord_id)?;
	ctx.reply("Stats reset!").await?;

	Ok(deleted)
}


/// Forget every baseline you have captured, starting your progress over
#[poise::command(prefix_command, slash_command)]
pub async fn reset(mut ctx: PoiseContext<'_>) -> Result<(), Error> {
	let res = reset_impl(&mut ctx).await;
	ctx.handle_error(res).await?;

	Ok(())
}
// }}}
