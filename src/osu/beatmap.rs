// {{{ Imports
use std::collections::HashMap;

use anyhow::anyhow;
use rusqlite::Row;

use crate::context::db::SqlitePool;
use crate::context::{Error, ErrorKind, TagError, TaggedError};
// }}}

// {{{ Beatmap metadata
#[derive(Debug, Clone, PartialEq)]
pub struct BeatmapMeta {
	pub id: u32,
	pub set_id: u32,
	pub artist: String,
	pub title: String,
	pub version: String,
	pub max_combo: u32,
	pub star_rating: f64,
}

impl BeatmapMeta {
	#[inline]
	fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
		Ok(Self {
			id: row.get("id")?,
			set_id: row.get("set_id")?,
			artist: row.get("artist")?,
			title: row.get("title")?,
			version: row.get("version")?,
			max_combo: row.get("max_combo")?,
			star_rating: row.get("star_rating")?,
		})
	}

	#[inline]
	pub fn display_title(&self) -> String {
		format!("{} - {} [{}]", self.artist, self.title, self.version)
	}

	#[inline]
	pub fn url(&self) -> String {
		format!("https://osu.ppy.sh/b/{}", self.id)
	}
}
// }}}
// {{{ Store trait
/// Read access to beatmap metadata.
pub trait BeatmapStore {
	fn get(&self, beatmap_id: u32) -> Result<BeatmapMeta, TaggedError>;
}

#[inline]
fn beatmap_not_found(beatmap_id: u32) -> TaggedError {
	anyhow!("Beatmap {beatmap_id} not found").tag(ErrorKind::NotFound)
}

impl BeatmapStore for HashMap<u32, BeatmapMeta> {
	fn get(&self, beatmap_id: u32) -> Result<BeatmapMeta, TaggedError> {
		HashMap::get(self, &beatmap_id)
			.cloned()
			.ok_or_else(|| beatmap_not_found(beatmap_id))
	}
}
// }}}
// {{{ Sqlite cache
/// Beatmap metadata remembered from previous server responses.
#[derive(Clone)]
pub struct BeatmapCache {
	db: SqlitePool,
}

impl BeatmapCache {
	#[inline]
	pub fn new(db: SqlitePool) -> Self {
		Self { db }
	}

	pub fn remember(&self, beatmap: &BeatmapMeta) -> Result<(), Error> {
		self.db
			.get()?
			.prepare_cached(
				"
          INSERT INTO beatmaps(id, set_id, artist, title, version, max_combo, star_rating)
          VALUES ($1, $2, $3, $4, $5, $6, $7)
          ON CONFLICT(id) DO UPDATE SET
            set_id=$2, artist=$3, title=$4, version=$5,
            max_combo=$6, star_rating=$7
        ",
			)?
			.execute((
				beatmap.id,
				beatmap.set_id,
				&beatmap.artist,
				&beatmap.title,
				&beatmap.version,
				beatmap.max_combo,
				beatmap.star_rating,
			))?;

		Ok(())
	}
}

impl BeatmapStore for BeatmapCache {
	fn get(&self, beatmap_id: u32) -> Result<BeatmapMeta, TaggedError> {
		let beatmap = self
			.db
			.get()?
			.prepare_cached("SELECT * FROM beatmaps WHERE id = ?")?
			.query_map([beatmap_id], BeatmapMeta::from_row)?
			.next()
			.ok_or_else(|| beatmap_not_found(beatmap_id))??;

		Ok(beatmap)
	}
}
// }}}
// {{{ Tests
#[cfg(test)]
mod beatmap_tests {
	use super::*;
	use crate::context::testing::open_test_db;

	fn sample() -> BeatmapMeta {
		BeatmapMeta {
			id: 129891,
			set_id: 39804,
			artist: "xi".to_string(),
			title: "FREEDOM DiVE".to_string(),
			version: "FOUR DIMENSIONS".to_string(),
			max_combo: 2385,
			star_rating: 7.07,
		}
	}

	#[test]
	fn remembered_beatmaps_can_be_read_back() -> Result<(), Error> {
		let (db, _guard) = open_test_db()?;
		let cache = BeatmapCache::new(db);

		cache.remember(&sample())?;
		let mut updated = sample();
		updated.star_rating = 7.2;
		cache.remember(&updated)?;

		let found = cache.get(129891).map_err(|e| e.error)?;
		assert_eq!(found, updated);
		assert_eq!(found.display_title(), "xi - FREEDOM DiVE [FOUR DIMENSIONS]");

		Ok(())
	}

	#[test]
	fn unknown_beatmaps_are_not_found() -> Result<(), Error> {
		let (db, _guard) = open_test_db()?;
		let cache = BeatmapCache::new(db);

		let err = cache.get(1).unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);

		Ok(())
	}
}
// }}}
