//! Rolling checkpoints and daily archives of player statistics.
//!
//! Every viewer gets their own checkpoint per player ranking. The first
//! lookup captures a baseline, later lookups compare the live value against
//! it. Checkpoints expire lazily, whenever their key is looked up again.

// {{{ Imports
use anyhow::anyhow;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rusqlite::{params, Row};
use tracing::{debug, info};

use crate::context::config::SnapshotConfig;
use crate::context::db::SqlitePool;
use crate::context::{Error, ErrorKind, TagError, TaggedError};
use crate::servers::{GameServer, PlayerIdentity};

use super::snapshot::{
	compute_deltas, CheckpointKey, FieldDelta, PerformanceSnapshot, SnapshotKey, StatFields,
};
// }}}

// {{{ Policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
	/// Baselines younger than this are returned as the current value too.
	pub freshness_window: TimeDelta,

	/// Checkpoints older than this are purged.
	pub retention_horizon: TimeDelta,
}

impl Default for CachePolicy {
	fn default() -> Self {
		Self {
			freshness_window: TimeDelta::minutes(5),
			retention_horizon: TimeDelta::hours(24),
		}
	}
}

impl TryFrom<&SnapshotConfig> for CachePolicy {
	type Error = Error;

	fn try_from(config: &SnapshotConfig) -> Result<Self, Self::Error> {
		let freshness_window = TimeDelta::try_minutes(config.freshness_minutes)
			.filter(|window| *window >= TimeDelta::zero())
			.ok_or_else(|| {
				anyhow!("Invalid freshness window of {} minutes", config.freshness_minutes)
			})?;

		let retention_horizon = TimeDelta::try_hours(config.retention_hours)
			.filter(|horizon| *horizon >= TimeDelta::zero())
			.ok_or_else(|| {
				anyhow!("Invalid retention horizon of {} hours", config.retention_hours)
			})?;

		Ok(Self {
			freshness_window,
			retention_horizon,
		})
	}
}

impl CachePolicy {
	/// Checkpoints captured before this instant are expired.
	#[inline]
	fn expiry_cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
		now.checked_sub_signed(self.retention_horizon)
			.unwrap_or(NaiveDateTime::MIN)
	}
}
// }}}
// {{{ Stats source
/// Where live statistics come from.
pub trait StatsSource {
	async fn fetch_stats(&self, key: &SnapshotKey) -> Result<StatFields, TaggedError>;
}

impl<S: GameServer> StatsSource for S {
	async fn fetch_stats(&self, key: &SnapshotKey) -> Result<StatFields, TaggedError> {
		let info = self.find_user(&PlayerIdentity::Id(key.player_id)).await?;
		let stats = info.stats_for(key.mode, key.variant).ok_or_else(|| {
			anyhow!(
				"{} has no stats for this mode on {}!",
				info.player.username,
				self.name()
			)
			.tag(ErrorKind::NotFound)
		})?;

		Ok(stats.fields.clone())
	}
}
// }}}
// {{{ Comparison
/// A live snapshot next to the one it's compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotComparison {
	pub current: PerformanceSnapshot,
	pub baseline: PerformanceSnapshot,
}

impl SnapshotComparison {
	#[inline]
	pub fn deltas(&self) -> Vec<FieldDelta> {
		compute_deltas(&self.current.fields, &self.baseline.fields)
	}
}
// }}}
// {{{ Cache
const FIELD_COLUMNS: &str = "
  ranked_score, total_score, total_hits, play_count, play_time,
  replays_watched, level, accuracy, max_combo, global_rank,
  country_rank, pp, global_score_rank, country_score_rank, first_places
";

const FIELD_UPDATES: &str = "
  ranked_score=excluded.ranked_score,
  total_score=excluded.total_score,
  total_hits=excluded.total_hits,
  play_count=excluded.play_count,
  play_time=excluded.play_time,
  replays_watched=excluded.replays_watched,
  level=excluded.level,
  accuracy=excluded.accuracy,
  max_combo=excluded.max_combo,
  global_rank=excluded.global_rank,
  country_rank=excluded.country_rank,
  pp=excluded.pp,
  global_score_rank=excluded.global_score_rank,
  country_score_rank=excluded.country_score_rank,
  first_places=excluded.first_places
";

#[derive(Clone)]
pub struct SnapshotCache {
	db: SqlitePool,
	policy: CachePolicy,
}

impl SnapshotCache {
	#[inline]
	pub fn new(db: SqlitePool, policy: CachePolicy) -> Self {
		Self { db, policy }
	}

	// {{{ Checkpoint storage
	fn checkpoint_from_row(key: &CheckpointKey, row: &Row) -> Result<PerformanceSnapshot, rusqlite::Error> {
		Ok(PerformanceSnapshot {
			key: key.target.clone(),
			captured_at: row.get("captured_at")?,
			fields: StatFields::from_row(row)?,
		})
	}

	/// The oldest checkpoint still inside the retention horizon.
	fn stored_baseline(
		&self,
		key: &CheckpointKey,
		now: NaiveDateTime,
	) -> Result<Option<PerformanceSnapshot>, TaggedError> {
		let target = &key.target;
		let snapshot = self
			.db
			.get()?
			.prepare_cached(
				"
          SELECT * FROM checkpoints
          WHERE server=$1 AND player_id=$2 AND mode=$3 AND variant=$4 AND viewer_id=$5
          AND captured_at >= $6
          ORDER BY captured_at ASC
          LIMIT 1
        ",
			)?
			.query_map(
				params![
					target.server,
					target.player_id,
					target.mode,
					target.variant,
					key.viewer_id,
					self.policy.expiry_cutoff(now)
				],
				|row| Self::checkpoint_from_row(key, row),
			)?
			.next()
			.transpose()?;

		Ok(snapshot)
	}

	/// Concurrent writers for the same key overwrite each other.
	fn store_checkpoint(
		&self,
		key: &CheckpointKey,
		snapshot: &PerformanceSnapshot,
	) -> Result<(), TaggedError> {
		let target = &key.target;
		let f = &snapshot.fields;

		self.db
			.get()?
			.prepare_cached(&format!(
				"
          INSERT INTO checkpoints(
            server, player_id, mode, variant, viewer_id, captured_at,
            {FIELD_COLUMNS}
          )
          VALUES (
            $1, $2, $3, $4, $5, $6,
            $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
          )
          ON CONFLICT(server, player_id, mode, variant, viewer_id) DO UPDATE SET
            captured_at=excluded.captured_at,
            {FIELD_UPDATES}
        "
			))?
			.execute(params![
				target.server,
				target.player_id,
				target.mode,
				target.variant,
				key.viewer_id,
				snapshot.captured_at,
				f.ranked_score,
				f.total_score,
				f.total_hits,
				f.play_count,
				f.play_time,
				f.replays_watched,
				f.level,
				f.accuracy,
				f.max_combo,
				f.global_rank,
				f.country_rank,
				f.pp,
				f.global_score_rank,
				f.country_score_rank,
				f.first_places,
			])?;

		Ok(())
	}
	// }}}
	// {{{ Rolling checkpoints
	/// Deletes the checkpoints of a key older than the retention horizon.
	pub fn purge_expired(&self, key: &CheckpointKey, now: NaiveDateTime) -> Result<usize, TaggedError> {
		let target = &key.target;
		let purged = self
			.db
			.get()?
			.prepare_cached(
				"
          DELETE FROM checkpoints
          WHERE server=$1 AND player_id=$2 AND mode=$3 AND variant=$4 AND viewer_id=$5
          AND captured_at < $6
        ",
			)?
			.execute(params![
				target.server,
				target.player_id,
				target.mode,
				target.variant,
				key.viewer_id,
				self.policy.expiry_cutoff(now)
			])?;

		if purged > 0 {
			debug!(?key, purged, "Purged expired checkpoints");
		}

		Ok(purged)
	}

	/// Returns the stored baseline of a key, capturing a new one when none
	/// exists. Nothing is written when the capture fails.
	pub async fn get_baseline(
		&self,
		key: &CheckpointKey,
		source: &impl StatsSource,
		now: NaiveDateTime,
	) -> Result<PerformanceSnapshot, TaggedError> {
		self.purge_expired(key, now)?;

		if let Some(snapshot) = self.stored_baseline(key, now)? {
			return Ok(snapshot);
		}

		let fields = source.fetch_stats(&key.target).await?;
		let snapshot = PerformanceSnapshot {
			key: key.target.clone(),
			captured_at: now,
			fields,
		};

		self.store_checkpoint(key, &snapshot)?;
		info!(?key, "Captured new baseline");

		Ok(snapshot)
	}

	/// Fetches a current value once the baseline is older than the
	/// freshness window. The baseline itself is never modified.
	pub async fn refresh_if_stale(
		&self,
		baseline: PerformanceSnapshot,
		source: &impl StatsSource,
		freshness_window: TimeDelta,
		now: NaiveDateTime,
	) -> Result<SnapshotComparison, TaggedError> {
		if now - baseline.captured_at <= freshness_window {
			return Ok(SnapshotComparison {
				current: baseline.clone(),
				baseline,
			});
		}

		let fields = source.fetch_stats(&baseline.key).await?;
		let current = PerformanceSnapshot {
			key: baseline.key.clone(),
			captured_at: now,
			fields,
		};

		Ok(SnapshotComparison { current, baseline })
	}

	/// Progress of a player since the viewer's baseline.
	pub async fn compute_delta(
		&self,
		key: &CheckpointKey,
		source: &impl StatsSource,
		now: NaiveDateTime,
	) -> Result<SnapshotComparison, TaggedError> {
		let baseline = self.get_baseline(key, source, now).await?;
		self.refresh_if_stale(baseline, source, self.policy.freshness_window, now)
			.await
	}

	/// Forgets every baseline a viewer has captured.
	pub fn reset(&self, viewer_id: u64) -> Result<usize, TaggedError> {
		let deleted = self
			.db
			.get()?
			.prepare_cached("DELETE FROM checkpoints WHERE viewer_id=?")?
			.execute([viewer_id])?;

		info!(viewer_id, deleted, "Reset checkpoints");
		Ok(deleted)
	}
	// }}}
	// {{{ Archives
	/// The snapshot archived for a key on a given day.
	pub fn compare_to_date(
		&self,
		key: &SnapshotKey,
		date: NaiveDate,
	) -> Result<PerformanceSnapshot, TaggedError> {
		let snapshot = self
			.db
			.get()?
			.prepare_cached(
				"
          SELECT * FROM archives
          WHERE server=$1 AND player_id=$2 AND mode=$3 AND variant=$4 AND date=$5
        ",
			)?
			.query_map(
				params![key.server, key.player_id, key.mode, key.variant, date],
				|row| {
					Ok(PerformanceSnapshot {
						key: key.clone(),
						captured_at: date.and_time(NaiveTime::MIN),
						fields: StatFields::from_row(row)?,
					})
				},
			)?
			.next()
			.ok_or_else(|| anyhow!("No stats found for {date}!").tag(ErrorKind::NotFound))??;

		Ok(snapshot)
	}

	/// Progress of a player since a given day.
	pub async fn compare_with_archive(
		&self,
		key: &SnapshotKey,
		date: NaiveDate,
		source: &impl StatsSource,
		now: NaiveDateTime,
	) -> Result<SnapshotComparison, TaggedError> {
		let archived = self.compare_to_date(key, date)?;
		self.refresh_if_stale(archived, source, self.policy.freshness_window, now)
			.await
	}

	/// Writes the archive of a key for a given day, replacing any previous
	/// archive of the same day.
	pub fn commit_archive(
		&self,
		key: &SnapshotKey,
		date: NaiveDate,
		fields: &StatFields,
	) -> Result<(), TaggedError> {
		let f = fields;
		self.db
			.get()?
			.prepare_cached(&format!(
				"
          INSERT INTO archives(
            server, player_id, mode, variant, date,
            {FIELD_COLUMNS}
          )
          VALUES (
            $1, $2, $3, $4, $5,
            $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
          )
          ON CONFLICT(server, player_id, mode, variant, date) DO UPDATE SET
            {FIELD_UPDATES}
        "
			))?
			.execute(params![
				key.server,
				key.player_id,
				key.mode,
				key.variant,
				date,
				f.ranked_score,
				f.total_score,
				f.total_hits,
				f.play_count,
				f.play_time,
				f.replays_watched,
				f.level,
				f.accuracy,
				f.max_combo,
				f.global_rank,
				f.country_rank,
				f.pp,
				f.global_score_rank,
				f.country_score_rank,
				f.first_places,
			])?;

		Ok(())
	}
	// }}}
}
// }}}
// {{{ Tests
#[cfg(test)]
mod cache_tests {
	use chrono::NaiveDate;

	use super::*;
	use crate::context::testing::open_test_db;
	use crate::osu::mode::{Mode, Variant};
	use crate::servers::mock::MockServer;
	use crate::stats::snapshot::StatValue;

	fn start() -> NaiveDateTime {
		NaiveDate::from_ymd_opt(2024, 3, 1)
			.unwrap()
			.and_hms_opt(12, 0, 0)
			.unwrap()
	}

	fn fields(pp: f64, rank: i64) -> StatFields {
		StatFields {
			pp: Some(pp),
			global_rank: Some(rank),
			play_count: Some(1000),
			..Default::default()
		}
	}

	fn key() -> CheckpointKey {
		CheckpointKey {
			target: SnapshotKey {
				server: "akatsuki".to_string(),
				player_id: 1001,
				mode: Mode::Standard,
				variant: Variant::Vanilla,
			},
			viewer_id: 666,
		}
	}

	fn setup() -> Result<(SnapshotCache, MockServer, tempfile::TempDir), Error> {
		let (db, guard) = open_test_db()?;
		let cache = SnapshotCache::new(db, CachePolicy::default());
		Ok((cache, MockServer::new(fields(8000.0, 100)), guard))
	}

	#[tokio::test]
	async fn baseline_is_reused_inside_the_window() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;

		let first = cache.compute_delta(&key(), &server, start()).await?;
		server.set_fields(fields(8100.0, 90));
		let second = cache
			.compute_delta(&key(), &server, start() + TimeDelta::minutes(3))
			.await?;

		assert_eq!(first.baseline, second.baseline);
		assert_eq!(second.current, second.baseline);
		assert_eq!(server.info_requests(), 1);

		Ok(())
	}

	#[tokio::test]
	async fn baselines_exactly_at_the_window_are_still_fresh() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;

		cache.compute_delta(&key(), &server, start()).await?;
		server.set_fields(fields(8100.0, 90));

		let edge = start() + TimeDelta::minutes(5);
		let comparison = cache.compute_delta(&key(), &server, edge).await?;
		assert_eq!(comparison.current, comparison.baseline);
		assert_eq!(server.info_requests(), 1);

		let past_edge = edge + TimeDelta::seconds(1);
		let comparison = cache.compute_delta(&key(), &server, past_edge).await?;
		assert_eq!(comparison.current.fields.pp, Some(8100.0));
		assert_eq!(server.info_requests(), 2);

		Ok(())
	}

	#[tokio::test]
	async fn stale_baselines_are_compared_to_fresh_values() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;

		cache.compute_delta(&key(), &server, start()).await?;
		server.set_fields(fields(8100.0, 90));

		let later = start() + TimeDelta::minutes(6);
		let comparison = cache.compute_delta(&key(), &server, later).await?;

		assert_eq!(comparison.baseline.captured_at, start());
		assert_eq!(comparison.baseline.fields.pp, Some(8000.0));
		assert_eq!(comparison.current.fields.pp, Some(8100.0));
		assert_eq!(comparison.current.captured_at, later);

		let deltas = comparison.deltas();
		let rank = deltas.iter().find(|d| d.descriptor.id == "global_rank").unwrap();
		assert_eq!(rank.delta, Some(StatValue::Integer(10)));

		// The baseline survives the refresh
		let again = cache
			.compute_delta(&key(), &server, later + TimeDelta::minutes(1))
			.await?;
		assert_eq!(again.baseline.captured_at, start());

		Ok(())
	}

	#[tokio::test]
	async fn expired_baselines_are_replaced() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;

		cache.get_baseline(&key(), &server, start()).await?;
		server.set_fields(fields(9000.0, 50));

		let next_day = start() + TimeDelta::hours(25);
		let baseline = cache.get_baseline(&key(), &server, next_day).await?;

		assert_eq!(baseline.captured_at, next_day);
		assert_eq!(baseline.fields.pp, Some(9000.0));
		assert_eq!(cache.purge_expired(&key(), next_day)?, 0);

		Ok(())
	}

	#[tokio::test]
	async fn baselines_exactly_at_the_horizon_are_kept() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;
		cache.get_baseline(&key(), &server, start()).await?;

		let edge = start() + TimeDelta::hours(24);
		assert_eq!(cache.purge_expired(&key(), edge)?, 0);

		let baseline = cache.get_baseline(&key(), &server, edge).await?;
		assert_eq!(baseline.captured_at, start());
		assert_eq!(server.info_requests(), 1);

		assert_eq!(cache.purge_expired(&key(), edge + TimeDelta::seconds(1))?, 1);

		Ok(())
	}

	#[test]
	fn out_of_range_policies_are_rejected() {
		let huge = SnapshotConfig {
			retention_hours: i64::MAX / 4,
			..Default::default()
		};
		assert!(CachePolicy::try_from(&huge).is_err());

		let negative = SnapshotConfig {
			freshness_minutes: -1,
			..Default::default()
		};
		assert!(CachePolicy::try_from(&negative).is_err());

		let policy = CachePolicy::try_from(&SnapshotConfig::default()).unwrap();
		assert_eq!(policy, CachePolicy::default());
	}

	#[test]
	fn long_horizons_never_underflow() -> Result<(), TaggedError> {
		let (db, _guard) = open_test_db()?;
		let cache = SnapshotCache::new(
			db,
			CachePolicy {
				retention_horizon: TimeDelta::MAX,
				..Default::default()
			},
		);

		assert_eq!(cache.purge_expired(&key(), start())?, 0);
		assert!(cache.stored_baseline(&key(), start())?.is_none());

		Ok(())
	}

	#[tokio::test]
	async fn failed_captures_write_nothing() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;

		server.set_available(false);
		let err = cache.get_baseline(&key(), &server, start()).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
		assert!(cache.stored_baseline(&key(), start())?.is_none());

		server.set_available(true);
		let baseline = cache.get_baseline(&key(), &server, start()).await?;
		assert_eq!(baseline.fields.pp, Some(8000.0));

		Ok(())
	}

	#[tokio::test]
	async fn viewers_have_separate_baselines() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;
		let other_viewer = CheckpointKey {
			viewer_id: 777,
			..key()
		};

		cache.get_baseline(&key(), &server, start()).await?;
		server.set_fields(fields(8100.0, 90));
		let other = cache.get_baseline(&other_viewer, &server, start()).await?;
		assert_eq!(other.fields.pp, Some(8100.0));

		assert_eq!(cache.reset(666)?, 1);
		assert!(cache.stored_baseline(&key(), start())?.is_none());
		assert!(cache.stored_baseline(&other_viewer, start())?.is_some());

		Ok(())
	}

	#[tokio::test]
	async fn missing_modes_are_not_found() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;
		let mania = CheckpointKey {
			target: SnapshotKey {
				mode: Mode::Mania,
				..key().target
			},
			..key()
		};

		let err = cache.get_baseline(&mania, &server, start()).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);

		Ok(())
	}

	#[test]
	fn archives_are_never_fabricated() -> Result<(), TaggedError> {
		let (cache, _server, _guard) = setup()?;
		let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

		let err = cache.compare_to_date(&key().target, date).unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);

		Ok(())
	}

	#[test]
	fn archives_are_overwritten_per_day() -> Result<(), TaggedError> {
		let (cache, _server, _guard) = setup()?;
		let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
		let target = key().target;

		cache.commit_archive(&target, date, &fields(7000.0, 200))?;
		cache.commit_archive(&target, date, &fields(7050.0, 190))?;

		let archived = cache.compare_to_date(&target, date)?;
		assert_eq!(archived.fields, fields(7050.0, 190));
		assert_eq!(archived.captured_at, date.and_time(NaiveTime::MIN));

		let next_day = date.succ_opt().unwrap();
		assert!(cache.compare_to_date(&target, next_day).is_err());

		Ok(())
	}

	#[tokio::test]
	async fn archives_are_compared_to_live_values() -> Result<(), TaggedError> {
		let (cache, server, _guard) = setup()?;
		let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
		let target = key().target;

		cache.commit_archive(&target, date, &fields(7000.0, 200))?;
		let comparison = cache
			.compare_with_archive(&target, date, &server, start())
			.await?;

		assert_eq!(comparison.baseline.fields.pp, Some(7000.0));
		assert_eq!(comparison.current.fields.pp, Some(8000.0));

		Ok(())
	}
}
// }}}
