//! Client for servers speaking the Ripple v1 api (Akatsuki and friends).

// {{{ Imports
use std::collections::HashMap;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::context::config::ServerConfig;
use crate::context::{ErrorKind, TagError, TaggedError};
use crate::osu::beatmap::{BeatmapCache, BeatmapMeta};
use crate::osu::mode::{Mode, Variant};
use crate::osu::mods::Mods;
use crate::osu::play::Play;
use crate::osu::score::{Grade, Judgements};
use crate::stats::snapshot::StatFields;

use super::{GameServer, ModeStats, Player, PlayerIdentity, UpstreamContext, UserInfo};
// }}}

// {{{ Response types
#[derive(Deserialize)]
struct ResponseCode {
	#[serde(default)]
	code: Option<u16>,
	#[serde(default)]
	message: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawModeStats {
	#[serde(default)]
	ranked_score: Option<i64>,
	#[serde(default)]
	total_score: Option<i64>,
	#[serde(default)]
	playcount: Option<i64>,
	#[serde(default)]
	playtime: Option<i64>,
	#[serde(default)]
	replays_watched: Option<i64>,
	#[serde(default)]
	total_hits: Option<i64>,
	#[serde(default)]
	level: Option<f64>,
	#[serde(default)]
	accuracy: Option<f64>,
	#[serde(default)]
	pp: Option<f64>,
	#[serde(default)]
	global_leaderboard_rank: Option<i64>,
	#[serde(default)]
	country_leaderboard_rank: Option<i64>,
	#[serde(default)]
	max_combo: Option<i64>,
}

impl RawModeStats {
	fn into_fields(self) -> StatFields {
		StatFields {
			ranked_score: self.ranked_score,
			total_score: self.total_score,
			total_hits: self.total_hits,
			play_count: self.playcount,
			play_time: self.playtime,
			replays_watched: self.replays_watched,
			level: self.level,
			accuracy: self.accuracy,
			max_combo: self.max_combo,
			global_rank: self.global_leaderboard_rank,
			country_rank: self.country_leaderboard_rank,
			pp: self.pp,
			..Default::default()
		}
	}
}

#[derive(Deserialize)]
struct RawUser {
	id: u64,
	username: String,
	#[serde(default)]
	country: Option<String>,

	/// One entry per variant, keyed by mode name. Only sent by servers
	/// which implement relax rankings.
	#[serde(default)]
	stats: Option<Vec<HashMap<String, RawModeStats>>>,

	// Vanilla-only servers send the stats at the top level instead.
	#[serde(default)]
	std: Option<RawModeStats>,
	#[serde(default)]
	taiko: Option<RawModeStats>,
	#[serde(default)]
	ctb: Option<RawModeStats>,
	#[serde(default)]
	mania: Option<RawModeStats>,
}

#[derive(Deserialize)]
struct RawBeatmap {
	beatmap_id: u32,
	beatmapset_id: u32,
	song_name: String,
	#[serde(default)]
	difficulty: f64,
	#[serde(default)]
	max_combo: u32,
}

#[derive(Deserialize)]
struct RawScore {
	#[serde(default)]
	id: u64,
	score: u64,
	max_combo: u32,
	full_combo: bool,
	mods: u32,
	count_300: u32,
	count_100: u32,
	count_50: u32,
	#[serde(default)]
	count_geki: u32,
	#[serde(default)]
	count_katu: u32,
	count_miss: u32,
	#[serde(default)]
	time: Option<String>,
	play_mode: i64,
	accuracy: f64,
	pp: f64,
	#[serde(default)]
	rank: String,
	beatmap: RawBeatmap,
}

#[derive(Deserialize)]
struct RawScores {
	#[serde(default)]
	scores: Option<Vec<RawScore>>,
}
// }}}
// {{{ Conversions
/// Splits a `Artist - Title [Version]` song name into its components.
fn split_song_name(song_name: &str) -> (String, String, String) {
	let (rest, version) = match song_name.rfind(" [") {
		Some(index) if song_name.ends_with(']') => (
			&song_name[..index],
			&song_name[index + 2..song_name.len() - 1],
		),
		_ => (song_name, ""),
	};

	let (artist, title) = rest.split_once(" - ").unwrap_or(("", rest));
	(artist.to_string(), title.to_string(), version.to_string())
}

fn parse_timestamp(time: &str) -> Option<NaiveDateTime> {
	DateTime::parse_from_rfc3339(time)
		.ok()
		.map(|t| t.naive_utc())
}

impl RawScore {
	fn beatmap_meta(&self) -> BeatmapMeta {
		let (artist, title, version) = split_song_name(&self.beatmap.song_name);
		BeatmapMeta {
			id: self.beatmap.beatmap_id,
			set_id: self.beatmap.beatmapset_id,
			artist,
			title,
			version,
			max_combo: self.beatmap.max_combo,
			star_rating: self.beatmap.difficulty,
		}
	}

	fn into_play(self, requested_mode: Mode, formula_version: &str) -> Play {
		let mods = Mods(self.mods);
		let grade = self
			.rank
			.parse()
			.unwrap_or_else(|_| Grade::from_accuracy(self.accuracy, mods));

		Play {
			id: self.id,
			beatmap_id: self.beatmap.beatmap_id,
			mode: Mode::from_index(self.play_mode).unwrap_or(requested_mode),
			mods,
			judgements: Judgements {
				count_300: self.count_300,
				count_100: self.count_100,
				count_50: self.count_50,
				count_miss: self.count_miss,
				count_geki: self.count_geki,
				count_katu: self.count_katu,
			},
			max_combo: self.max_combo,
			accuracy: self.accuracy,
			grade,
			score: self.score,
			pp: self.pp,
			full_combo: self.full_combo,
			formula_version: formula_version.to_string(),
			created_at: self.time.as_deref().and_then(parse_timestamp),
		}
	}
}

impl RawUser {
	fn into_user_info(self) -> UserInfo {
		let mut stats = Vec::new();
		let mut push = |variant: Variant, by_mode: &mut HashMap<String, RawModeStats>| {
			for mode in Mode::MODES {
				if let Some(raw) = by_mode.remove(Mode::MODE_STRINGS[mode.to_index()]) {
					stats.push(ModeStats {
						mode,
						variant,
						fields: raw.into_fields(),
					});
				}
			}
		};

		match self.stats {
			Some(per_variant) => {
				for (variant, mut by_mode) in Variant::VARIANTS.into_iter().zip(per_variant) {
					push(variant, &mut by_mode);
				}
			}
			None => {
				let mut by_mode = [
					("std", self.std),
					("taiko", self.taiko),
					("ctb", self.ctb),
					("mania", self.mania),
				]
				.into_iter()
				.filter_map(|(name, raw)| Some((name.to_string(), raw?)))
				.collect();
				push(Variant::Vanilla, &mut by_mode);
			}
		}

		UserInfo {
			player: Player {
				id: self.id,
				username: self.username,
				country: self.country,
			},
			stats,
		}
	}
}
// }}}
// {{{ Server
#[derive(Clone)]
pub struct RippleServer {
	config: ServerConfig,
	http_client: reqwest::Client,
	beatmaps: BeatmapCache,
}

impl RippleServer {
	pub fn new(config: ServerConfig, http_client: reqwest::Client, beatmaps: BeatmapCache) -> Self {
		Self {
			config,
			http_client,
			beatmaps,
		}
	}

	/// Performs a GET request against the api, returning [None] when
	/// the server says the resource doesn't exist.
	async fn request<T: DeserializeOwned>(
		&self,
		endpoint: &str,
		query: &[(&str, String)],
	) -> Result<Option<T>, TaggedError> {
		let url = format!("{}/{endpoint}", self.config.api_url);
		debug!(%url, ?query, "Sending request");

		let response = self
			.http_client
			.get(&url)
			.query(query)
			.send()
			.await
			.upstream_context(|| format!("Failed to reach {}", self.config.name))?;

		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let bytes = response
			.error_for_status()
			.upstream_context(|| format!("{} returned a non-ok status", self.config.name))?
			.bytes()
			.await
			.upstream_context(|| format!("Failed to read the response of {}", self.config.name))?;

		let code = serde_json::from_slice::<ResponseCode>(&bytes)
			.upstream_context(|| format!("{} returned an invalid response", self.config.name))?;

		match code.code {
			Some(404) => return Ok(None),
			Some(status) if status != 200 => {
				let message = code_message(status, code.message);
				return Err(anyhow!("{} returned an error ({message})", self.config.name)
					.tag(ErrorKind::UpstreamUnavailable));
			}
			_ => {}
		}

		let decoded = serde_json::from_slice(&bytes)
			.upstream_context(|| format!("Failed to decode the response of {}", self.config.name))?;

		Ok(Some(decoded))
	}

	/// Fetches a page of scores, remembering the beatmaps they were set on.
	async fn get_scores(
		&self,
		endpoint: &str,
		player_id: u64,
		mode: Mode,
		variant: Variant,
		limit: usize,
	) -> Result<Vec<Play>, TaggedError> {
		let query = [
			("id", player_id.to_string()),
			("mode", mode.to_index().to_string()),
			("rx", variant.to_index().to_string()),
			("p", "1".to_string()),
			("l", limit.to_string()),
		];

		let Some(scores) = self.request::<RawScores>(endpoint, &query).await? else {
			return Ok(Vec::new());
		};

		let formula_version = self.config.formulas.for_variant(variant);
		let plays = scores
			.scores
			.unwrap_or_default()
			.into_iter()
			.map(|score| {
				if let Err(error) = self.beatmaps.remember(&score.beatmap_meta()) {
					warn!(beatmap = score.beatmap.beatmap_id, %error, "Could not cache beatmap");
				}

				score.into_play(mode, formula_version)
			})
			.collect();

		Ok(plays)
	}
}

#[inline]
fn code_message(code: u16, message: Option<String>) -> String {
	match message {
		Some(message) => format!("code {code}: {message}"),
		None => format!("code {code}"),
	}
}

impl GameServer for RippleServer {
	fn name(&self) -> &str {
		&self.config.name
	}

	fn supports(&self, variant: Variant) -> bool {
		match variant {
			Variant::Vanilla => true,
			Variant::Relax => self.config.supports_relax,
			Variant::Autopilot => self.config.supports_autopilot,
		}
	}

	fn avatar_url(&self, player_id: u64) -> String {
		format!("{}/{player_id}", self.config.avatar_url)
	}

	async fn get_user_info(
		&self,
		identity: &PlayerIdentity,
	) -> Result<Option<UserInfo>, TaggedError> {
		let query = match identity {
			PlayerIdentity::Id(id) => [("id", id.to_string())],
			PlayerIdentity::Name(name) => [("name", name.clone())],
		};

		let user = self.request::<RawUser>("users/full", &query).await?;
		Ok(user.map(RawUser::into_user_info))
	}

	async fn get_user_best(
		&self,
		player_id: u64,
		mode: Mode,
		variant: Variant,
	) -> Result<Vec<Play>, TaggedError> {
		self.get_scores("users/scores/best", player_id, mode, variant, 100)
			.await
	}

	async fn get_user_recent(
		&self,
		player_id: u64,
		mode: Mode,
		variant: Variant,
	) -> Result<Vec<Play>, TaggedError> {
		self.get_scores("users/scores/recent", player_id, mode, variant, 10)
			.await
	}
}
// }}}
