use crate::dice::D6;
use crate::outmsg::MessageBank;
use crate::{event::*, plugin::*};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serenity::all::Mentionable;

/// Rolls a pool of d6 and reads the highest die
pub struct Pool;

const MAX_POOL: u32 = 30;

#[derive(Debug, PartialEq)]
enum Outcome {
    Failure,
    Partial,
    Success,
}

impl Outcome {
    fn from_highest(highest: i64) -> Self {
        match highest {
            i64::MIN..=2 => Outcome::Failure,
            3..=4 => Outcome::Partial,
            _ => Outcome::Success,
        }
    }

    fn message_key(&self) -> &'static str {
        match self {
            Outcome::Failure => "POOL_FAILURE",
            Outcome::Partial => "POOL_PARTIAL",
            Outcome::Success => "POOL_SUCCESS",
        }
    }
}

/// Results in roll order with the first highest die in bold, and the highest value (0 if none).
fn highlight_highest(results: &[i64]) -> (String, i64) {
    let highest = results
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, i64)>, (i, &r)| match best {
            Some((_, b)) if b >= r => best,
            _ => Some((i, r)),
        });

    let shown: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, r)| match highest {
            Some((pos, _)) if pos == i => format!("**{}**", r),
            _ => r.to_string(),
        })
        .collect();

    (
        format!("[{}]", shown.join(", ")),
        highest.map_or(0, |(_, value)| value),
    )
}

impl Pool {
    fn reply<R: Rng + ?Sized>(
        bank: &MessageBank,
        mention: &str,
        args: &[String],
        rng: &mut R,
    ) -> String {
        let size = match args.first() {
            None => 0,
            Some(arg) => match arg.parse::<u32>() {
                Ok(size) if size <= MAX_POOL => size,
                _ => return bank.out("POOL_SIZE", &[("max", &MAX_POOL)]),
            },
        };

        let result = (D6 * size).roll(rng);
        let (results, highest) = highlight_highest(&result.results);

        bank.out(
            Outcome::from_highest(highest).message_key(),
            &[
                ("results", &results),
                ("highest", &highest),
                ("mention", &mention),
            ],
        )
    }
}

#[serenity::async_trait]
impl Plugin for Pool {
    fn name(&self) -> &'static str {
        "pool"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} <dice> - roll a pool of d6 and read the highest",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
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
