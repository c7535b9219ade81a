// {{{ Imports
use anyhow::anyhow;
use rusqlite::Row;

use crate::commands::discord::MessageContext;
use crate::context::{ErrorKind, TagError, TaggedError, UserContext};
use crate::osu::mode::{Mode, Variant};
// }}}

// {{{ Links
/// A discord user's account on a game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLink {
	pub discord_id: u64,
	pub server: String,
	pub player_id: u64,
}

impl UserLink {
	#[inline]
	fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
		Ok(Self {
			discord_id: row.get("discord_id")?,
			server: row.get("server")?,
			player_id: row.get("player_id")?,
		})
	}

	/// Every link of every user.
	pub fn all(ctx: &UserContext) -> Result<Vec<Self>, TaggedError> {
		let links = ctx
			.db
			.get()?
			.prepare_cached("SELECT * FROM user_links ORDER BY server, player_id")?
			.query_map((), Self::from_row)?
			.collect::<Result<Vec<_>, _>>()?;

		Ok(links)
	}
}
// }}}
// {{{ User
#[inline]
pub fn not_linked() -> TaggedError {
	anyhow!("This command requires a link! Use `link <username> <server>` to link your account.")
		.tag(ErrorKind::NotFound)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
	pub discord_id: u64,
	pub default_server: Option<String>,
	pub default_mode: Mode,
	pub default_variant: Variant,
}

impl User {
	#[inline]
	fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
		Ok(Self {
			discord_id: row.get("discord_id")?,
			default_server: row.get("default_server")?,
			default_mode: row.get("default_mode")?,
			default_variant: row.get("default_variant")?,
		})
	}

	pub fn by_discord_id(ctx: &UserContext, discord_id: u64) -> Result<Self, TaggedError> {
		let user = ctx
			.db
			.get()?
			.prepare_cached("SELECT * FROM users WHERE discord_id = ?")?
			.query_map([discord_id], Self::from_row)?
			.next()
			.ok_or_else(not_linked)??;

		Ok(user)
	}

	#[inline]
	pub fn from_context(ctx: &impl MessageContext) -> Result<Self, TaggedError> {
		Self::by_discord_id(ctx.data(), ctx.author_id())
	}

	/// Like [Self::from_context], except users without links are not errors.
	pub fn maybe_from_context(ctx: &impl MessageContext) -> Result<Option<Self>, TaggedError> {
		match Self::from_context(ctx) {
			Ok(user) => Ok(Some(user)),
			Err(error) if error.kind == ErrorKind::NotFound => Ok(None),
			Err(error) => Err(error),
		}
	}

	/// Links a discord user to an account. Users linking for the first time
	/// get the server as their default.
	pub fn link(
		ctx: &UserContext,
		discord_id: u64,
		server: &str,
		player_id: u64,
	) -> Result<Self, TaggedError> {
		let mut conn = ctx.db.get()?;
		let transaction = conn.transaction()?;

		transaction
			.prepare_cached(
				"
          INSERT INTO users(discord_id, default_server)
          VALUES ($1, $2)
          ON CONFLICT(discord_id) DO NOTHING
        ",
			)?
			.execute((discord_id, server))?;

		transaction
			.prepare_cached(
				"
          INSERT INTO user_links(discord_id, server, player_id)
          VALUES ($1, $2, $3)
          ON CONFLICT(discord_id, server) DO UPDATE SET player_id=$3
        ",
			)?
			.execute((discord_id, server, player_id))?;

		transaction.commit()?;
		Self::by_discord_id(ctx, discord_id)
	}

	/// The account this user has linked on a server.
	pub fn player_on(&self, ctx: &UserContext, server: &str) -> Result<Option<u64>, TaggedError> {
		let player_id = ctx
			.db
			.get()?
			.prepare_cached("SELECT player_id FROM user_links WHERE discord_id=? AND server=?")?
			.query_map((self.discord_id, server), |row| row.get(0))?
			.next()
			.transpose()?;

		Ok(player_id)
	}

	pub fn set_default_mode(
		&mut self,
		ctx: &UserContext,
		mode: Mode,
		variant: Variant,
	) -> Result<(), TaggedError> {
		ctx.db
			.get()?
			.prepare_cached("UPDATE users SET default_mode=?, default_variant=? WHERE discord_id=?")?
			.execute((mode, variant, self.discord_id))?;

		self.default_mode = mode;
		self.default_variant = variant;
		Ok(())
	}

	pub fn set_default_server(&mut self, ctx: &UserContext, server: &str) -> Result<(), TaggedError> {
		if self.player_on(ctx, server)?.is_none() {
			return Err(anyhow!("You are not linked on {server}!").tag(ErrorKind::InvalidInput));
		}

		ctx.db
			.get()?
			.prepare_cached("UPDATE users SET default_server=? WHERE discord_id=?")?
			.execute((server, self.discord_id))?;

		self.default_server = Some(server.to_string());
		Ok(())
	}
}
// }}}
