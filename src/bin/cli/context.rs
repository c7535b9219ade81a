// {{{ Imports
use mizuki::commands::discord::MessageContext;
use mizuki::context::paths::get_var;
use mizuki::context::{Error, UserContext};
use poise::serenity_prelude::CreateEmbed;
// }}}

/// Similar in scope to the mock context used by tests, except replies
/// are printed to the standard output. Embeds are printed as JSON.
pub struct CliContext {
	pub user_id: u64,
	pub data: UserContext,
}

impl CliContext {
	/// Commands run as the discord user in `$MIZUKI_DISCORD_USER_ID`, if set.
	pub fn new(data: UserContext) -> Result<Self, Error> {
		let user_id = match get_var("MIZUKI_DISCORD_USER_ID") {
			Ok(id) => id.parse()?,
			Err(_) => 0,
		};

		Ok(Self { data, user_id })
	}
}

impl MessageContext for CliContext {
	fn author_id(&self) -> u64 {
		self.user_id
	}

	fn data(&self) -> &UserContext {
		&self.data
	}

	async fn reply(&mut self, text: &str) -> Result<(), Error> {
		println!("[Reply] {text}");
		Ok(())
	}

	async fn send_embed(&mut self, embed: CreateEmbed) -> Result<(), Error> {
		println!("\n========== Embed ==========");
		println!("{}", serde_json::to_string_pretty(&embed)?);
		Ok(())
	}
}
