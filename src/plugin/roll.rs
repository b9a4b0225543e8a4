use crate::dice::DiceFormula;
use crate::outmsg::MessageBank;
use crate::{event::*, plugin::*};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Rolls dice formulas like `2d6+3`
pub struct Roll;

impl Roll {
    fn reply<R: Rng + ?Sized>(
        bank: &MessageBank,
        usage: &str,
        formulas: &[String],
        rng: &mut R,
    ) -> String {
        if formulas.is_empty() {
            return bank.out("MISSING_ARGUMENT", &[("usage", &usage)]);
        }

        formulas
            .iter()
            .map(|formula| match DiceFormula::parse(formula) {
                Ok(formula) => {
                    let roll = formula.roll(rng);
                    bank.out(
                        "DICE_ROLLED",
                        &[
                            ("formula", &formula),
                            ("results", &format_results(&roll.dice.results)),
                            ("total", &roll.total),
                        ],
                    )
                }
                Err(err) => bank.out("INVALID_DICE", &[("error", &err)]),
            })
            .collect()
    }
}

fn format_results(results: &[i64]) -> String {
    let results: Vec<String> = results.iter().map(ToString::to_string).collect();
    format!("[{}]", results.join(", "))
}

#[serenity::async_trait]
impl Plugin for Roll {
    fn name(&self) -> &'static str {
        "roll"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} <formula>... - roll dice, e.g. 2d6+3 or d20",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let usage = format!(
            "{}{} <formula>...",
            ctx.cfg.read().await.general.command_prefix,
            self.name()
        );
        let reply = Self::reply(
            &*ctx.messages.read().await,
            &usage,
            &args,
            &mut StdRng::from_entropy(),
        );

        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn test_reply() {
        let bank = MessageBank::builtin();
        let mut rng = StdRng::seed_from_u64(5);

        let reply = Roll::reply(&bank, ";roll <formula>...", &args(&["3d1+2"]), &mut rng);
        assert!(reply.contains("Die size must be between 2 and 1000"));

        let reply = Roll::reply(&bank, ";roll <formula>...", &args(&["4d2-4", "x"]), &mut rng);
        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(":bell: `4d2-4` ["));
        assert!(lines[1].contains("Invalid dice formula `x`"));

        let reply = Roll::reply(&bank, ";roll <formula>...", &[], &mut rng);
        assert!(reply.contains("`;roll <formula>...`"));
    }

    #[test]
    fn test_format_results() {
        assert_eq!(format_results(&[1, 20, 3]), "[1, 20, 3]");
        assert_eq!(format_results(&[]), "[]");
    }
}
