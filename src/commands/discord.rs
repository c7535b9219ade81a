use poise::serenity_prelude::CreateEmbed;
use poise::CreateReply;

use crate::context::{Error, TaggedError, UserContext};
use crate::get_user_error;

// {{{ Trait
pub trait MessageContext {
	/// Get the user context held by the message
	fn data(&self) -> &UserContext;
	fn author_id(&self) -> u64;

	/// Reply to the current message
	async fn reply(&mut self, text: &str) -> Result<(), Error>;

	/// Reply to the current message with an embed
	async fn send_embed(&mut self, embed: CreateEmbed) -> Result<(), Error>;

	/// Replies with the contents of user facing errors, and propagates the
	/// rest of them.
	async fn handle_error<V>(&mut self, res: Result<V, TaggedError>) -> Result<Option<V>, Error> {
		match res {
			Ok(v) => Ok(Some(v)),
			Err(e) => {
				let error = get_user_error!(e);
				self.reply(&format!("{error}")).await?;
				Ok(None)
			}
		}
	}
}
// }}}
// {{{ Poise implementation
impl<'a> MessageContext for poise::Context<'a, UserContext, Error> {
	fn data(&self) -> &UserContext {
		Self::data(*self)
	}

	fn author_id(&self) -> u64 {
		self.author().id.get()
	}

	async fn reply(&mut self, text: &str) -> Result<(), Error> {
		Self::reply(*self, text).await?;
		Ok(())
	}

	async fn send_embed(&mut self, embed: CreateEmbed) -> Result<(), Error> {
		Self::send(*self, CreateReply::default().reply(true).embed(embed)).await?;
		Ok(())
	}
}
// }}}
// {{{ Testing context
#[cfg(test)]
pub mod mock {
	use serde_json::Value;

	use super::*;

	#[derive(Debug, Clone, PartialEq)]
	pub enum MockMessage {
		Text(String),

		/// Embeds are kept in their serialized form, which is what
		/// would end up being sent to discord.
		Embed(Value),
	}

	pub struct MockContext {
		pub user_id: u64,
		pub data: UserContext,
		pub messages: Vec<MockMessage>,
	}

	impl MockContext {
		pub fn new(data: UserContext) -> Self {
			Self {
				data,
				user_id: 666,
				messages: vec![],
			}
		}

		/// The text of the last plain reply.
		pub fn last_text(&self) -> Option<&str> {
			self.messages.iter().rev().find_map(|m| match m {
				MockMessage::Text(text) => Some(text.as_str()),
				_ => None,
			})
		}

		pub fn last_embed(&self) -> Option<&Value> {
			self.messages.iter().rev().find_map(|m| match m {
				MockMessage::Embed(embed) => Some(embed),
				_ => None,
			})
		}
	}

	impl MessageContext for MockContext {
		fn author_id(&self) -> u64 {
			self.user_id
		}

		fn data(&self) -> &UserContext {
			&self.data
		}

		async fn reply(&mut self, text: &str) -> Result<(), Error> {
			self.messages.push(MockMessage::Text(text.to_string()));
			Ok(())
		}

		async fn send_embed(&mut self, embed: CreateEmbed) -> Result<(), Error> {
			self.messages
				.push(MockMessage::Embed(serde_json::to_value(&embed)?));
			Ok(())
		}
	}
}
// }}}
