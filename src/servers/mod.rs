//! Game servers the bot can look players up on.

// {{{ Imports
use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;

use crate::context::config::Config;
use crate::context::{Error, ErrorKind, TagError, TaggedError};
use crate::osu::beatmap::BeatmapCache;
use crate::osu::mode::{Mode, Variant};
use crate::osu::play::Play;
use crate::stats::snapshot::StatFields;

use ripple::RippleServer;
// }}}

pub mod ripple;

// {{{ Players
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
	pub id: u64,
	pub username: String,
	pub country: Option<String>,
}

/// The ways a player can be referred to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerIdentity {
	Id(u64),
	Name(String),
}

impl FromStr for PlayerIdentity {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(anyhow!("Player names cannot be empty"));
		}

		if s.chars().all(|c| c.is_ascii_digit()) {
			if let Ok(id) = s.parse() {
				return Ok(Self::Id(id));
			}
		}

		Ok(Self::Name(s.to_string()))
	}
}

impl Display for PlayerIdentity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Id(id) => write!(f, "{id}"),
			Self::Name(name) => write!(f, "{name}"),
		}
	}
}

/// The statistics of a player in a single ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeStats {
	pub mode: Mode,
	pub variant: Variant,
	pub fields: StatFields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
	pub player: Player,

	/// Every ranking the server reports for the player.
	pub stats: Vec<ModeStats>,
}

impl UserInfo {
	#[inline]
	pub fn stats_for(&self, mode: Mode, variant: Variant) -> Option<&ModeStats> {
		self.stats
			.iter()
			.find(|s| s.mode == mode && s.variant == variant)
	}
}
// }}}
// {{{ Server trait
pub trait GameServer {
	fn name(&self) -> &str;
	fn supports(&self, variant: Variant) -> bool;
	fn avatar_url(&self, player_id: u64) -> String;

	/// Returns [None] when the player doesn't exist.
	async fn get_user_info(&self, identity: &PlayerIdentity)
		-> Result<Option<UserInfo>, TaggedError>;

	/// The best plays of a player, best first.
	async fn get_user_best(
		&self,
		player_id: u64,
		mode: Mode,
		variant: Variant,
	) -> Result<Vec<Play>, TaggedError>;

	/// The latest plays of a player, newest first.
	async fn get_user_recent(
		&self,
		player_id: u64,
		mode: Mode,
		variant: Variant,
	) -> Result<Vec<Play>, TaggedError>;

	/// Like [Self::get_user_info], except missing players are errors.
	async fn find_user(&self, identity: &PlayerIdentity) -> Result<UserInfo, TaggedError> {
		self.get_user_info(identity).await?.ok_or_else(|| {
			anyhow!("User {identity} not found on {}!", self.name()).tag(ErrorKind::NotFound)
		})
	}
}

/// Converts failures talking to a server into [ErrorKind::UpstreamUnavailable].
pub(crate) trait UpstreamContext<T> {
	fn upstream_context(self, message: impl FnOnce() -> String) -> Result<T, TaggedError>;
}

impl<T, E: Into<Error>> UpstreamContext<T> for Result<T, E> {
	fn upstream_context(self, message: impl FnOnce() -> String) -> Result<T, TaggedError> {
		self.map_err(|e| {
			e.into()
				.context(message())
				.tag(ErrorKind::UpstreamUnavailable)
		})
	}
}
// }}}
// {{{ Registry
/// Finds servers by the name users refer to them with.
pub trait ServerLookup {
	type Server: GameServer;

	fn lookup(&self, name: &str) -> Result<&Self::Server, TaggedError>;
	fn names(&self) -> Vec<&str>;
}

#[derive(Clone)]
pub struct ServerRegistry {
	servers: Vec<RippleServer>,
}

impl ServerRegistry {
	pub fn from_config(
		config: &Config,
		http_client: &reqwest::Client,
		beatmaps: &BeatmapCache,
	) -> Self {
		let servers = config
			.servers
			.iter()
			.map(|server| RippleServer::new(server.clone(), http_client.clone(), beatmaps.clone()))
			.collect();

		Self { servers }
	}

	pub fn by_name(&self, name: &str) -> Result<&RippleServer, TaggedError> {
		self.servers
			.iter()
			.find(|s| s.name().eq_ignore_ascii_case(name))
			.ok_or_else(|| {
				anyhow!("Unknown server `{name}`! Use `servers` to see available servers.")
					.tag(ErrorKind::InvalidInput)
			})
	}

	#[inline]
	pub fn iter(&self) -> impl Iterator<Item = &RippleServer> {
		self.servers.iter()
	}
}

impl ServerLookup for ServerRegistry {
	type Server = RippleServer;

	#[inline]
	fn lookup(&self, name: &str) -> Result<&Self::Server, TaggedError> {
		self.by_name(name)
	}

	fn names(&self) -> Vec<&str> {
		self.servers.iter().map(|s| s.name()).collect()
	}
}
// }}}
