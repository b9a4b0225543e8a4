use crate::dice::{D20, D6};
use crate::outmsg::MessageBank;
use crate::{event::*, plugin::*};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serenity::all::Mentionable;

/// Rolls for the Into the Odd tabletop game
pub struct IntoTheOdd;

const ROLL: [&str; 2] = ["roll", "r"];
const ATTRIBUTES: [&str; 5] = ["attributes", "rollattributes", "rollatts", "ratts", "ra"];

impl IntoTheOdd {
    fn reply<R: Rng + ?Sized>(
        bank: &MessageBank,
        mention: &str,
        args: &[String],
        rng: &mut R,
    ) -> String {
        let subcommand = args.first().map(|arg| arg.to_lowercase());

        match subcommand.as_deref() {
            Some(cmd) if ROLL.contains(&cmd) => bank.out(
                "ITO_ROLL",
                &[("mention", &mention), ("result", &D20.roll(rng).total)],
            ),
            Some(cmd) if ATTRIBUTES.contains(&cmd) => {
                let [strength, dexterity, willpower] = [(); 3].map(|_| (D6 * 3).roll(rng).total);
                bank.out(
                    "ITO_ATTRIBUTES",
                    &[
                        ("mention", &mention),
                        ("strength", &strength),
                        ("dexterity", &dexterity),
                        ("willpower", &willpower),
                    ],
                )
            }
            _ => bank.out("NO_SUBCOMMAND", &[("subcommands", &"**roll**, **attributes**")]),
        }
    }
}

#[serenity::async_trait]
impl Plugin for IntoTheOdd {
    fn name(&self) -> &'static str {
        "intotheodd"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} roll|attributes - Into the Odd d20 or attribute rolls (alias ito)",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_any_bot_cmd(ctx, &[self.name(), "ito"]).await else {
            return Ok(EventHandled::No);
        };

        let mention = msg.author.mention().to_string();
        let reply = Self::reply(
            &*ctx.messages.read().await,
            &mention,
            &args,
            &mut StdRng::from_entropy(),
        );

        msg.channel_id.say(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
