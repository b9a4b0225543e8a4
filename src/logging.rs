//! Colored terminal logging
//!
//! Every line starts with a one-character marker: `*` for Discord events, `+` for the bot's own
//! bookkeeping and `!` for errors, which go to stderr.

use serenity::all::{Http, Message};
use std::fmt::Display;
use std::io::IsTerminal;
use std::sync::{Arc, LazyLock};

#[derive(Clone, Copy)]
pub enum Color {
    Default,
    Event,
    Internal,
    Error,
    User,
    Place,
    Glue,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Color::Default => "\x1b[0m",
            Color::Event => "\x1b[33m",
            Color::Internal => "\x1b[35m",
            Color::Error => "\x1b[31m",
            Color::User => "\x1b[32m",
            Color::Place => "\x1b[36m",
            Color::Glue => "\x1b[90m",
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // Fixed for the life of the process
        static COLORS_ENABLED: LazyLock<bool> = LazyLock::new(|| std::io::stdout().is_terminal());

        if *COLORS_ENABLED {
            f.write_str(self.code())
        } else {
            Ok(())
        }
    }
}

/// `text` in `color`, resetting afterwards
pub fn paint(color: Color, text: impl Display) -> String {
    format!("{}{}{}", color, text, Color::Default)
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_line {
    ($print:ident, $marker:literal, $color:ident, $fmtstr:expr $(, $args:expr)* $(,)?) => {{
        $print!(
            concat!("{}", $marker, "{} ", $fmtstr),
            $crate::logging::Color::$color,
            $crate::logging::Color::Default
            $(, $args)*
        )
    }};
}

#[macro_export]
macro_rules! log_event {
    ($($arg:tt)+) => {
        $crate::__log_line!(println, "*", Event, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_internal {
    ($($arg:tt)+) => {
        $crate::__log_line!(println, "+", Internal, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::__log_line!(eprintln, "!", Error, $($arg)+)
    };
}

/// Where a message came from, as `guild:channel:author`.  Names that can't be looked up are
/// replaced by placeholders rather than failing the log line.
pub async fn origin(msg: &Message, http: &Arc<Http>) -> String {
    let guild = match msg.guild_id {
        Some(guild_id) => match guild_id.to_partial_guild(http).await {
            Ok(guild) => guild.name,
            Err(_) => "<unknown-guild>".to_owned(),
        },
        None => "<direct-message>".to_owned(),
    };
    let channel = msg
        .channel_id
        .name(http)
        .await
        .unwrap_or_else(|_| "<unknown-channel>".to_owned());
    let glue = paint(Color::Glue, ":");

    format!(
        "{}{}{}{}{}",
        paint(Color::Place, guild),
        glue,
        paint(Color::Place, channel),
        glue,
        paint(Color::User, &msg.author.name)
    )
}
