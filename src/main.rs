mod charsheets;
mod config;
mod context;
mod dice;
mod event;
mod handler;
mod helper;
mod logging;
mod outmsg;
mod plugin;

use anyhow::anyhow;
use serenity::{all::GatewayIntents, Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();

    let messages = crate::outmsg::MessageBank::load(cfg.messages.path.as_deref()).await?;
    log_internal!("Loaded {} message definitions", messages.len());

    let charsheets_dir = cfg.charsheets_dir()?;
    let store = crate::charsheets::storage::FileStore::open(charsheets_dir.clone())
        .await
        .map_err(|e| {
            anyhow!(
                "Could not open character sheet storage at `{}`: {}",
                charsheets_dir.to_string_lossy(),
                e
            )
        })?;
    log_internal!(
        "Character sheets stored in {}",
        charsheets_dir.to_string_lossy()
    );
    let charsheets = crate::charsheets::Charsheets::new(
        store,
        crate::charsheets::FieldTypes::builtin(),
    );

    let handler = handler::Handler::new(cfg, messages, charsheets);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}
