use crate::{charsheets::Charsheets, config::Config, outmsg::MessageBank};
use std::sync::Arc;
use tokio::sync::RwLock;

/// What a plugin gets to work with while handling one event
pub struct Context<'a> {
    /// Swapped out wholesale by `reload`
    pub cfg: &'a RwLock<Config>,
    /// Reply wording, also swapped out by `reload`
    pub messages: &'a RwLock<MessageBank>,
    /// Templates and sheets.  Locks per document internally.
    pub charsheets: &'a Charsheets,
    pub cache: &'a Arc<serenity::all::Cache>,
    pub http: &'a Arc<serenity::all::Http>,
    pub cache_http: &'a CacheHttp,
}

/// Serenity's `Context` is the handiest `impl CacheHttp` for replies, which look in the cache
/// before falling back to HTTP.  The alias keeps it from being confused with ours.
pub type CacheHttp = serenity::all::Context;
