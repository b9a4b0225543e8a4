use crate::outmsg::MessageBank;
use crate::{event::*, plugin::*};
use anyhow::Result;

/// Lists command usages, or the usage of a single command
pub struct Help;

impl Help {
    /// `usages` pairs plugin names with their usage lines.
    fn reply(bank: &MessageBank, usages: &[(&str, String)], command: Option<&str>) -> String {
        let lines: Vec<&str> = usages
            .iter()
            .filter(|(name, _)| command.map_or(true, |cmd| name.eq_ignore_ascii_case(cmd)))
            .map(|(_, usage)| usage.as_str())
            .collect();

        match command {
            Some(cmd) if lines.is_empty() => bank.out("UNKNOWN_COMMAND", &[("name", &cmd)]),
            _ => bank.out(
                "HELP",
                &[("commands", &format!("```\n{}\n```", lines.join("\n")))],
            ),
        }
    }
}

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} [command] - list commands, or show how to use one",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let mut usages = Vec::new();
        for plugin in crate::plugin::plugins() {
            if let Some(usage) = plugin.usage(ctx).await {
                usages.push((plugin.name(), usage));
            }
        }

        let reply = Self::reply(
            &*ctx.messages.read().await,
            &usages,
            args.first().map(String::as_str),
        );

        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
