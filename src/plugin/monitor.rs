use crate::logging::{origin, paint, Color};
use crate::{event::*, log_event, plugin::*};
use anyhow::Result;

/// Logs the connection and every command addressed to the bot.  Never consumes an event.
pub struct Monitor;

#[serenity::async_trait]
impl Plugin for Monitor {
    fn name(&self) -> &'static str {
        "monitor"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    paint(Color::User, &ready.user.name),
                );
            }
            Event::Message(msg) => {
                let is_command = {
                    let cfg = ctx.cfg.read().await;
                    msg.content.starts_with(cfg.general.command_prefix.as_str())
                };

                if is_command && !msg.author.bot {
                    log_event!(
                        "{} {}",
                        origin(msg, ctx.http).await,
                        msg.content_safe(ctx.cache),
                    );
                }
            }
        }

        Ok(EventHandled::No)
    }
}
