//! The daily archive of every linked player.

// {{{ Imports
use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::context::{ErrorKind, TaggedError, UserContext};
use crate::servers::{GameServer, PlayerIdentity};
use crate::user::UserLink;

use super::cache::SnapshotCache;
use super::snapshot::SnapshotKey;
// }}}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveReport {
	pub players: usize,
	pub snapshots: usize,
	pub skipped: usize,
}

/// Archives every ranking a server reports for a single player.
/// Returns the amount of snapshots written.
pub async fn archive_player(
	cache: &SnapshotCache,
	server: &impl GameServer,
	player_id: u64,
	date: NaiveDate,
) -> Result<usize, TaggedError> {
	let info = server.find_user(&PlayerIdentity::Id(player_id)).await?;

	for stats in &info.stats {
		let key = SnapshotKey {
			server: server.name().to_string(),
			player_id,
			mode: stats.mode,
			variant: stats.variant,
		};

		cache.commit_archive(&key, date, &stats.fields)?;
	}

	Ok(info.stats.len())
}

/// Archives every player linked to a discord account. Players which can't
/// be looked up are skipped.
pub async fn archive_linked_players(
	ctx: &UserContext,
	date: NaiveDate,
) -> Result<ArchiveReport, TaggedError> {
	let players = UserLink::all(ctx)?
		.into_iter()
		.map(|link| (link.server, link.player_id))
		.collect::<BTreeSet<_>>();

	let mut report = ArchiveReport::default();

	for (server_name, player_id) in players {
		let result = match ctx.servers.by_name(&server_name) {
			Ok(server) => archive_player(&ctx.snapshots, server, player_id, date).await,
			Err(error) => Err(error),
		};

		match result {
			Ok(snapshots) => {
				report.players += 1;
				report.snapshots += snapshots;
			}
			Err(error) if error.kind == ErrorKind::Internal => return Err(error),
			Err(error) => {
				warn!(server = %server_name, player_id, error = %error.error, "Skipping archive");
				report.skipped += 1;
			}
		}
	}

	info!(?report, %date, "Archived linked players");
	Ok(report)
}

// }}}
