use std::sync::Arc;
use std::time::Duration;

use mizuki::commands;
use mizuki::context::paths::get_var;
use mizuki::context::{Error, UserContext};
use mizuki::logs::init_tracing;
use poise::serenity_prelude::{self as serenity};
use tracing::{error, info};

// {{{ Error handler
async fn on_error(error: poise::FrameworkError<'_, UserContext, Error>) {
	if let poise::FrameworkError::Command { error, ctx, .. } = &error {
		error!(command = %ctx.command().qualified_name, %error, "Command failed");
	}

	if let Err(e) = poise::builtins::on_error(error).await {
		error!(error = %e, "Error while handling error");
	}
}
// }}}

#[tokio::main]
async fn main() -> Result<(), Error> {
	init_tracing();

	// {{{ Poise options
	let options = poise::FrameworkOptions {
		commands: vec![
			commands::help(),
			commands::servers(),
			commands::show::show(),
			commands::show::reset(),
			commands::whatif::whatif(),
			commands::whatif::nochoke(),
			commands::recent::recent(),
			commands::link::link(),
			commands::link::defaultmode(),
			commands::link::defaultserver(),
		],
		prefix_options: poise::PrefixFrameworkOptions {
			stripped_dynamic_prefix: Some(|_ctx, message, _user_ctx| {
				Box::pin(async {
					if message.author.bot {
						Ok(None)
					} else if message.content.starts_with("!") {
						Ok(Some(message.content.split_at(1)))
					} else {
						Ok(None)
					}
				})
			}),
			edit_tracker: Some(Arc::new(poise::EditTracker::for_timespan(
				Duration::from_secs(3600),
			))),
			..Default::default()
		},
		on_error: |error| Box::pin(on_error(error)),
		..Default::default()
	};
	// }}}
	// {{{ Start poise
	let framework = poise::Framework::builder()
		.setup(move |ctx, ready, framework| {
			Box::pin(async move {
				info!(user = %ready.user.name, "Logged in");
				poise::builtins::register_globally(ctx, &framework.options().commands).await?;
				UserContext::new()
			})
		})
		.options(options)
		.build();

	let token = get_var("MIZUKI_DISCORD_TOKEN")?;
	let intents =
		serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

	let mut client = serenity::ClientBuilder::new(token, intents)
		.framework(framework)
		.await?;

	client.start().await?;
	Ok(())
	// }}}
}
