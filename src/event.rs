//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks into a distinct Event enum.

use crate::{context::Context, helper::split_args, log_error};
use serenity::all::{Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in plugin {}: {}", plugin.name(), err),
            }
        }
    }

    /// Check if a message is the bot command `cmd`, e.g. `;roll 2d6`.  Returns the message and
    /// the arguments following the command.
    pub async fn is_bot_cmd(
        &self,
        ctx: &Context<'_>,
        cmd: &str,
    ) -> Option<(&Message, Vec<String>)> {
        self.is_any_bot_cmd(ctx, &[cmd]).await
    }

    /// As [`Event::is_bot_cmd`], accepting any of several names for the command.
    pub async fn is_any_bot_cmd(
        &self,
        ctx: &Context<'_>,
        names: &[&str],
    ) -> Option<(&Message, Vec<String>)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let args = {
            let cfg = ctx.cfg.read().await;
            let rest = msg.content.strip_prefix(cfg.general.command_prefix.as_str())?;
            split_args(rest)
        };

        let (cmd, args) = args.split_first()?;
        if !names.iter().any(|name| cmd.eq_ignore_ascii_case(name)) {
            return None;
        }

        Some((msg, args.to_vec()))
    }
}

pub enum EventHandled {
    Yes,
    No,
}
