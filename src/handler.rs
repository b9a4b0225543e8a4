use crate::{
    charsheets::Charsheets, config::Config, context::Context, event::Event, outmsg::MessageBank,
};
use serenity::all::{Message, Ready};
use tokio::sync::RwLock;

/// Owns the bot's long-lived state and feeds serenity's callbacks into the plugin chain
pub struct Handler {
    cfg: RwLock<Config>,
    messages: RwLock<MessageBank>,
    charsheets: Charsheets,
}

impl Handler {
    pub fn new(cfg: Config, messages: MessageBank, charsheets: Charsheets) -> Self {
        Self {
            cfg: RwLock::new(cfg),
            messages: RwLock::new(messages),
            charsheets,
        }
    }

    async fn dispatch(&self, discord_ctx: &serenity::all::Context, event: Event) {
        let ctx = Context {
            cfg: &self.cfg,
            messages: &self.messages,
            charsheets: &self.charsheets,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        };

        event.handle(ctx).await;
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        self.dispatch(&discord_ctx, Event::Ready(ready)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        self.dispatch(&discord_ctx, Event::Message(msg)).await;
    }
}
