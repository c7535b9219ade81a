//! This module provides helpers for working with environment
//! variables and paths, together with a struct
//! that keeps track of all the runtime-relevant paths.

use anyhow::Context;
use std::{path::PathBuf, str::FromStr};

/// Wrapper around [std::env::var] which adds [anyhow] context around errors.
pub fn get_var(name: &str) -> anyhow::Result<String> {
	std::env::var(name).with_context(|| format!("Missing ${name} environment variable"))
}

/// Reads an environment variable containing a directory path,
/// creating the directory if it doesn't exist.
pub fn get_env_dir_path(name: &str, default_to: Option<&str>) -> anyhow::Result<PathBuf> {
	let var = get_var(name);
	let var = match default_to {
		None => var?,
		Some(other) => var.or_else(|_| get_var(other))?,
	};

	let path = PathBuf::from_str(&var).with_context(|| format!("${name} is not a valid path"))?;

	if !path.exists() {
		std::fs::create_dir_all(&path).with_context(|| format!("Could not create ${name}"))?;
	}

	Ok(path)
}

#[derive(Clone, Debug)]
pub struct MizukiPaths {
	/// This directory contains files that are entirely managed
	/// by the runtime of the app, like the database.
	data_dir: PathBuf,

	/// This directory contains the (optional) config file.
	config_dir: PathBuf,
}

impl MizukiPaths {
	/// Gets all the standard paths from the environment,
	/// creating every involved directory in the process.
	pub fn new() -> anyhow::Result<Self> {
		let res = Self {
			data_dir: get_env_dir_path("MIZUKI_DATA_DIR", Some("STATE_DIRECTORY"))?,
			config_dir: get_env_dir_path("MIZUKI_CONFIG_DIR", Some("CONFIGURATION_DIRECTORY"))?,
		};

		Ok(res)
	}

	pub fn data_dir(&self) -> &PathBuf {
		&self.data_dir
	}

	pub fn config_dir(&self) -> &PathBuf {
		&self.config_dir
	}

	pub fn db_path(&self) -> PathBuf {
		self.data_dir.join("db.sqlite")
	}

	pub fn config_path(&self) -> PathBuf {
		self.config_dir.join("config.toml")
	}
}
