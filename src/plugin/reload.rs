use crate::config::Config;
use crate::helper::MessageHelper;
use crate::outmsg::MessageBank;
use crate::{event::*, log_internal, plugin::*};
use anyhow::Result;

pub struct Reload;

impl Reload {
    /// Re-read the configuration, then the message bank it points to.  Nothing is replaced
    /// unless both load.
    async fn reload(ctx: &Context<'_>) -> Result<usize> {
        let cfg = Config::load().await?;
        let messages = MessageBank::load(cfg.messages.path.as_deref()).await?;
        let count = messages.len();

        *ctx.cfg.write().await = cfg;
        *ctx.messages.write().await = messages;

        Ok(count)
    }
}

#[serenity::async_trait]
impl Plugin for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} - reload config and messages (bot owner only)",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let response = if !msg.is_from_owner(ctx).await {
            ctx.messages.read().await.out("PERMISSION_DENIED", &[])
        } else {
            match Self::reload(ctx).await {
                Ok(count) => {
                    log_internal!("Reloaded configuration and {} message definitions", count);
                    ctx.messages.read().await.out("RELOADED", &[])
                }
                Err(err) => ctx
                    .messages
                    .read()
                    .await
                    .out("RELOAD_FAILED", &[("error", &err)]),
            }
        };

        msg.reply(ctx.cache_http, response).await?;
        Ok(EventHandled::Yes)
    }
}
