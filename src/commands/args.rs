//! Parsing of `-flag value` style command arguments, and resolution of
//! the player a command is about.

// {{{ Imports
use anyhow::anyhow;

use crate::context::{ErrorKind, TagError, TaggedError};
use crate::osu::mode::{game_mode_list, parse_game_mode, Mode, Variant, GAME_MODES};
use crate::servers::{GameServer, PlayerIdentity, ServerLookup};
use crate::user::{not_linked, User};

use super::discord::MessageContext;
// }}}

// {{{ Parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
	pub positional: Vec<String>,
	flags: Vec<(String, Option<String>)>,
}

#[inline]
fn is_flag(token: &str) -> bool {
	token.len() > 1
		&& token.starts_with('-')
		&& token[1..].parse::<f64>().is_err()
}

impl ParsedArgs {
	/// Splits the input on whitespace. Every flag takes the token following
	/// it as a value, unless that token is a flag itself or the flag is one
	/// of the given switches.
	pub fn parse(input: &str, switches: &[&str]) -> Self {
		let mut result = Self::default();
		let mut pending: Option<String> = None;

		for token in input.split_whitespace() {
			if is_flag(token) {
				if let Some(previous) = pending.take() {
					result.flags.push((previous, None));
				}

				let name = token[1..].to_string();
				if switches.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
					result.flags.push((name, None));
				} else {
					pending = Some(name);
				}
			} else if let Some(name) = pending.take() {
				result.flags.push((name, Some(token.to_string())));
			} else {
				result.positional.push(token.to_string());
			}
		}

		if let Some(previous) = pending {
			result.flags.push((previous, None));
		}

		result
	}

	/// The argument switches a command reacts to: every server and game mode.
	pub fn switches(servers: &impl ServerLookup) -> Vec<&str> {
		let mut switches = servers.names();
		switches.extend(GAME_MODES.iter().map(|(name, _, _)| *name));
		switches
	}

	#[inline]
	pub fn has(&self, name: &str) -> bool {
		self.flags.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
	}

	#[inline]
	pub fn value(&self, name: &str) -> Option<&str> {
		self.flags
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.and_then(|(_, v)| v.as_deref())
	}

	/// The server picked either through `-server <name>` or `-<name>`.
	pub fn server<'a>(&'a self, names: &[&'a str]) -> Option<&'a str> {
		self.value("server")
			.or_else(|| names.iter().copied().find(|name| self.has(name)))
	}

	/// The game mode picked either through `-mode <mode>` or `-<mode>`.
	pub fn game_mode(&self) -> Result<Option<(Mode, Variant)>, TaggedError> {
		if let Some(name) = self.value("mode") {
			return parse_game_mode(name).map(Some).ok_or_else(|| {
				anyhow!("Unknown mode `{name}`! Available modes: {}", game_mode_list())
					.tag(ErrorKind::InvalidInput)
			});
		}

		Ok(GAME_MODES
			.iter()
			.find(|(name, _, _)| self.has(name))
			.map(|(_, mode, variant)| (*mode, *variant)))
	}
}
// }}}
// {{{ Targets
/// The player ranking a command is about.
pub struct Target<'a, S> {
	pub server: &'a S,
	pub identity: PlayerIdentity,
	pub mode: Mode,
	pub variant: Variant,
}

/// Works out which player a command refers to, filling in whatever the
/// arguments leave out from the author's account link.
pub fn resolve_target<'a, L: ServerLookup>(
	ctx: &impl MessageContext,
	servers: &'a L,
	args: &ParsedArgs,
	player: Option<&str>,
) -> Result<Target<'a, L::Server>, TaggedError> {
	let user = User::maybe_from_context(ctx)?;

	let names = servers.names();
	let server_name = args
		.server(&names)
		.map(|s| s.to_string())
		.or_else(|| user.as_ref().and_then(|u| u.default_server.clone()))
		.unwrap_or_else(|| ctx.data().config.default_server.clone());
	let server = servers.lookup(&server_name)?;

	let identity = match player {
		Some(player) => player
			.parse::<PlayerIdentity>()
			.map_err(|e| e.tag(ErrorKind::InvalidInput))?,
		None => {
			let user = user.as_ref().ok_or_else(not_linked)?;
			let player_id = user.player_on(ctx.data(), server.name())?.ok_or_else(|| {
				anyhow!("You are not linked on {}!", server.name()).tag(ErrorKind::NotFound)
			})?;

			PlayerIdentity::Id(player_id)
		}
	};

	let (mode, variant) = match args.game_mode()? {
		Some(game_mode) => game_mode,
		None => user
			.as_ref()
			.map(|u| (u.default_mode, u.default_variant))
			.unwrap_or((Mode::Standard, Variant::Vanilla)),
	};

	let variant = if server.supports(variant) {
		variant
	} else {
		Variant::Vanilla
	};

	Ok(Target {
		server,
		identity,
		mode,
		variant,
	})
}
// }}}
