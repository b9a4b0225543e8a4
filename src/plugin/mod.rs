use crate::{context::Context, event::EventHandled};
use anyhow::Result;

mod charsheets;
mod help;
mod ignore_bots;
mod intotheodd;
mod monitor;
mod pool;
mod reload;
mod roll;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Doubles as the chat command for plugins that have one
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &crate::event::Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    use crate::plugin::*;

    vec![
        // Core bot operations
        Box::new(monitor::Monitor),
        Box::new(ignore_bots::IgnoreBots),
        Box::new(help::Help),
        Box::new(reload::Reload),
        // Dice
        Box::new(roll::Roll),
        Box::new(intotheodd::IntoTheOdd),
        Box::new(pool::Pool),
        // Character sheets
        Box::new(charsheets::Charsheets),
    ]
}
