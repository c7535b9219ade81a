//! Runtime configuration, read from an optional `config.toml`.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::osu::mode::Variant;
use crate::osu::performance::ComboScalingEstimate;

// {{{ Snapshot policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
	/// How long a baseline is reused as the current value.
	pub freshness_minutes: i64,

	/// How long a baseline lives before being replaced.
	pub retention_hours: i64,
}

impl Default for SnapshotConfig {
	fn default() -> Self {
		Self {
			freshness_minutes: 5,
			retention_hours: 24,
		}
	}
}
// }}}
// {{{ Servers
/// Tags of the performance formulas a server ranks each variant with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormulaTags {
	pub vanilla: String,
	pub relax: String,
	pub autopilot: String,
}

impl Default for FormulaTags {
	fn default() -> Self {
		Self {
			vanilla: ComboScalingEstimate::VERSION.to_string(),
			relax: ComboScalingEstimate::RELAX_VERSION.to_string(),
			autopilot: ComboScalingEstimate::AUTOPILOT_VERSION.to_string(),
		}
	}
}

impl FormulaTags {
	#[inline]
	pub fn for_variant(&self, variant: Variant) -> &str {
		match variant {
			Variant::Vanilla => &self.vanilla,
			Variant::Relax => &self.relax,
			Variant::Autopilot => &self.autopilot,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	pub name: String,

	/// Base url of the v1 api, without a trailing slash.
	pub api_url: String,

	/// Base url avatars are served under.
	pub avatar_url: String,

	#[serde(default)]
	pub supports_relax: bool,

	#[serde(default)]
	pub supports_autopilot: bool,

	#[serde(default)]
	pub formulas: FormulaTags,
}
// }}}
// {{{ Config
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Server used when neither the command nor the account link pick one.
	pub default_server: String,

	pub http_timeout_secs: u64,
	pub snapshots: SnapshotConfig,
	pub servers: Vec<ServerConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			default_server: "akatsuki".to_string(),
			http_timeout_secs: 10,
			snapshots: SnapshotConfig::default(),
			servers: vec![ServerConfig {
				name: "akatsuki".to_string(),
				api_url: "https://akatsuki.gg/api/v1".to_string(),
				avatar_url: "https://a.akatsuki.gg".to_string(),
				supports_relax: true,
				supports_autopilot: true,
				formulas: FormulaTags::default(),
			}],
		}
	}
}

impl Config {
	/// Reads the config at the given path, falling back to the defaults
	/// when the file doesn't exist.
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		if !path.exists() {
			info!(?path, "No config file found, using defaults");
			return Ok(Self::default());
		}

		let contents = std::fs::read_to_string(path)
			.with_context(|| format!("Could not read config file at {path:?}"))?;

		Self::parse(&contents).with_context(|| format!("Invalid config file at {path:?}"))
	}

	#[inline]
	pub fn parse(contents: &str) -> anyhow::Result<Self> {
		Ok(toml::from_str(contents)?)
	}
}
// }}}
