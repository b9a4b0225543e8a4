//! Bank of user-facing reply templates
//!
//! Replies are looked up by key and filled in with named parameters, so their wording lives in
//! one file (see `outdefs.outlang`) instead of being spread through the plugins.

use crate::log_error;
use anyhow::{anyhow, Result};
use std::{collections::HashMap, fmt, path::Path};

const DEFAULT_BANK: &str = include_str!("outdefs.outlang");
const DESCRIPTION_INDENT: &str = "    ";

const EMOJI: [(&str, &str); 3] = [
    ("Emoji.SUCCESS", ":star2:"),
    ("Emoji.INFO", ":bell:"),
    ("Emoji.ERROR", ":small_red_triangle_down:"),
];

/// Named parameters for [`MessageBank::out`]
pub type Params<'a> = [(&'a str, &'a dyn fmt::Display)];

pub struct MessageBank {
    defs: HashMap<String, String>,
}

impl MessageBank {
    /// The bank compiled into the binary
    pub fn builtin() -> Self {
        Self::parse(DEFAULT_BANK)
    }

    /// Load the bank from `path`, or the built-in one if there is none.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };

        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow!(
                "Could not read message bank at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Ok(Self::parse(&contents))
    }

    pub fn parse(src: &str) -> Self {
        let mut defs = HashMap::new();
        let mut name: Option<&str> = None;
        let mut desc = String::new();

        let mut finish = |name: &mut Option<&str>, desc: &mut String| {
            if let Some(name) = name.take() {
                if !desc.trim().is_empty() {
                    defs.insert(name.to_owned(), collapse(desc));
                }
            }
            desc.clear();
        };

        for line in src.lines() {
            if line.trim_start().starts_with('#') {
                continue;
            }

            if line.is_empty() {
                finish(&mut name, &mut desc);
            } else if is_def_name(line) {
                finish(&mut name, &mut desc);
                name = Some(line);
            } else if name.is_some() && line.starts_with(DESCRIPTION_INDENT) {
                desc.push(' ');
                desc.push_str(line);
            }
        }
        finish(&mut name, &mut desc);

        Self { defs }
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Render the reply `key`, filling `{name}` placeholders from `params`.  Placeholders with
    /// no matching parameter are left as they are.  An unknown key renders as the key itself.
    pub fn out(&self, key: &str, params: &Params) -> String {
        let Some(template) = self.defs.get(key) else {
            log_error!("Missing message definition {}", key);
            return format!("{}\n", key);
        };

        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open].replace("}}", "}"));
            rest = &rest[open..];

            if let Some(after) = rest.strip_prefix("{{") {
                out.push('{');
                rest = after;
                continue;
            }

            let Some(close) = rest.find('}') else {
                break;
            };
            let placeholder = &rest[1..close];

            match substitute(placeholder, params) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[..=close]),
            }
            rest = &rest[close + 1..];
        }
        out.push_str(&rest.replace("}}", "}"));

        out
    }
}

fn substitute(placeholder: &str, params: &Params) -> Option<String> {
    if placeholder == "\\n" {
        return Some("\n".to_owned());
    }

    if let Some((_, emoji)) = EMOJI.iter().find(|(name, _)| *name == placeholder) {
        return Some((*emoji).to_owned());
    }

    params
        .iter()
        .find(|(name, _)| *name == placeholder)
        .map(|(_, value)| value.to_string())
}

fn is_def_name(line: &str) -> bool {
    line.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Collapse runs of whitespace into single spaces, and terminate with a newline.
fn collapse(desc: &str) -> String {
    let mut collapsed = desc.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.push('\n');
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK: &str = "\
# comment
GREETING
    {Emoji.SUCCESS} Hello,
        **{name}**!

  # indented comment
TWO_LINES
    first{\\n}second

EMPTY

UNTERMINATED
    {missing} {{literal}} {name}";

    #[test]
    fn test_parse_definitions() {
        let bank = MessageBank::parse(BANK);
        assert_eq!(bank.len(), 3);
        assert_eq!(
            bank.out("GREETING", &[("name", &"Gorak")]),
            ":star2: Hello, **Gorak**!\n"
        );
        assert_eq!(bank.out("TWO_LINES", &[]), "first\nsecond\n");
    }

    #[test]
    fn test_unknown_placeholders_and_keys() {
        let bank = MessageBank::parse(BANK);
        assert_eq!(
            bank.out("UNTERMINATED", &[("name", &3)]),
            "{missing} {literal} 3\n"
        );
        assert_eq!(bank.out("NOPE", &[]), "NOPE\n");
        assert_eq!(bank.out("EMPTY", &[]), "EMPTY\n");
    }

    #[test]
    fn test_builtin_bank() {
        let bank = MessageBank::builtin();
        assert_eq!(
            bank.out("TEMPLATE_CREATED", &[("name", &"Hero")]),
            ":star2: Template **Hero** created.\n"
        );
        assert_eq!(
            bank.out("INVALID_NAME", &[("name", &"a/b")]),
            ":small_red_triangle_down: **a/b** is not a valid name. Names may not be empty or \
             contain `/`, `\\` or `.`.\n"
        );
    }

    #[tokio::test]
    async fn test_load_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.outlang");
        std::fs::write(&path, "RELOADED\n    Done.\n").unwrap();

        let bank = MessageBank::load(Some(path.as_path())).await.unwrap();
        assert_eq!(bank.out("RELOADED", &[]), "Done.\n");
        assert!(MessageBank::load(Some(dir.path().join("missing").as_path())).await.is_err());
        assert!(MessageBank::load(None).await.unwrap().len() > 40);
    }
}
