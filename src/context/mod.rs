// {{{ Imports
use std::time::Duration;

use db::{connect_db, SqlitePool};

use crate::context::config::Config;
use crate::context::paths::MizukiPaths;
use crate::osu::beatmap::BeatmapCache;
use crate::osu::performance::FormulaRegistry;
use crate::servers::ServerRegistry;
use crate::stats::cache::{CachePolicy, SnapshotCache};
use crate::timed;
// }}}

pub mod config;
pub mod db;
pub mod paths;

// {{{ Common types
pub type Error = anyhow::Error;
pub type PoiseContext<'a> = poise::Context<'a, UserContext, Error>;
// }}}
// {{{ Error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// A player, beatmap, archive or account link doesn't exist.
	NotFound,

	/// A game server couldn't be reached, or returned garbage.
	UpstreamUnavailable,

	/// The user asked for something that makes no sense.
	InvalidInput,

	Internal,
}

impl ErrorKind {
	/// Whether errors of this kind should be shown to the user.
	#[inline]
	pub fn is_user_facing(self) -> bool {
		!matches!(self, Self::Internal)
	}
}

#[derive(Debug)]
pub struct TaggedError {
	pub kind: ErrorKind,
	pub error: Error,
}

impl TaggedError {
	#[inline]
	pub fn new(kind: ErrorKind, error: Error) -> Self {
		Self { kind, error }
	}
}

#[macro_export]
macro_rules! get_user_error {
	($err:expr) => {{
		if $err.kind.is_user_facing() {
			$err.error
		} else {
			Err($err.error)?
		}
	}};
}

impl<E: Into<Error>> From<E> for TaggedError {
	fn from(value: E) -> Self {
		Self::new(ErrorKind::Internal, value.into())
	}
}

pub trait TagError {
	fn tag(self, tag: ErrorKind) -> TaggedError;
}

impl TagError for Error {
	fn tag(self, tag: ErrorKind) -> TaggedError {
		TaggedError::new(tag, self)
	}
}
// }}}
// {{{ UserContext
/// Custom user data passed to all command functions
#[derive(Clone)]
pub struct UserContext {
	pub db: SqlitePool,
	pub config: Config,
	pub servers: ServerRegistry,
	pub formulas: FormulaRegistry,
	pub beatmaps: BeatmapCache,
	pub snapshots: SnapshotCache,
}

impl UserContext {
	#[inline]
	pub fn new() -> Result<Self, Error> {
		timed!("create_context", {
			let paths = MizukiPaths::new()?;
			let config = Config::load(&paths.config_path())?;
			let db = connect_db(&paths.db_path())?;

			Self::with_config(db, config)
		})
	}

	/// Builds every service on top of an already open database.
	pub fn with_config(db: SqlitePool, config: Config) -> Result<Self, Error> {
		let http_client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.http_timeout_secs))
			.build()?;

		let beatmaps = BeatmapCache::new(db.clone());
		let servers = ServerRegistry::from_config(&config, &http_client, &beatmaps);
		let policy = CachePolicy::try_from(&config.snapshots)?;
		let snapshots = SnapshotCache::new(db.clone(), policy);

		Ok(Self {
			db,
			config,
			servers,
			formulas: FormulaRegistry::with_builtins(),
			beatmaps,
			snapshots,
		})
	}
}
// }}}
