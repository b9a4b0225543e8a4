use crate::charsheets::{
    error::CharsheetError, template::FieldSpec, title_case, Charsheets as Store,
};
use crate::outmsg::MessageBank;
use crate::{event::*, log_error, plugin::*};
use anyhow::Result;

/// Templates and character sheets
pub struct Charsheets;

const NAMES: [&str; 2] = ["charsheets", "cs"];

const TEMPLATE_ADD: &str = "charsheets template add <name>";
const TEMPLATE_REMOVE: &str = "charsheets template remove <name>...";
const TEMPLATE_RENAME: &str = "charsheets template rename <old name> <new name>";
const FIELD_ADD: &str = "charsheets template field add <template> <field> <type> [default value]";
const FIELD_REMOVE: &str = "charsheets template field remove <template> <field>...";
const FIELD_RENAME: &str = "charsheets template field rename <template> <old name> <new name>";
const FIELD_LIST: &str = "charsheets template field list <template> [type]";
const FIELD_EDIT: &str =
    "charsheets template field edit <template> <field> <new type> [new default]";
const SHEET_ADD: &str = "charsheets sheet add <name> <template>";
const SHEET_REMOVE: &str = "charsheets sheet remove <name>...";
const SHEET_RENAME: &str = "charsheets sheet rename <old name> <new name>";
const SHEET_TOTEXT: &str = "charsheets sheet totext <name>";
const SHEET_FIELD: &str = "charsheets sheet field <sheet> <field> [new value]";
const SHEET_DO: &str = "charsheets sheet do <sheet> <field> <method> <arg>...";

/// Why a command produced no result of its own
enum Failure {
    /// Missing arguments, with the command's usage line
    Usage(&'static str),
    /// No or unknown subcommand, with the available ones
    NoSubcommand(&'static [&'static str]),
    Charsheet(CharsheetError),
}

impl From<CharsheetError> for Failure {
    fn from(err: CharsheetError) -> Self {
        Failure::Charsheet(err)
    }
}

type Reply = Result<String, Failure>;

/// Run a `charsheets` command, given the arguments after the command name, and produce the reply.
pub async fn execute(store: &Store, bank: &MessageBank, prefix: &str, args: &[String]) -> String {
    let invocation = Invocation {
        store,
        bank,
        prefix,
    };

    let (sub, rest) = subcommand(args);
    let result = match sub.as_deref() {
        Some("template" | "tp") => invocation.template(rest).await,
        Some("sheet" | "sh") => invocation.sheet(rest).await,
        _ => Err(Failure::NoSubcommand(&["template", "sheet"])),
    };

    result.unwrap_or_else(|failure| invocation.failure(failure))
}

fn subcommand(args: &[String]) -> (Option<String>, &[String]) {
    match args.split_first() {
        Some((sub, rest)) => (Some(sub.to_lowercase()), rest),
        None => (None, args),
    }
}

fn arg<'a>(args: &'a [String], index: usize, usage: &'static str) -> Result<&'a str, Failure> {
    args.get(index)
        .map(String::as_str)
        .ok_or(Failure::Usage(usage))
}

/// Everything from `index` on, joined back together.  `None` if there is nothing there.
fn rest_of(args: &[String], index: usize) -> Option<String> {
    args.get(index..)
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.join(" "))
}

fn names<'a>(
    args: &'a [String],
    from: usize,
    usage: &'static str,
) -> Result<Vec<&'a str>, Failure> {
    match args.get(from..) {
        Some(rest) if !rest.is_empty() => Ok(rest.iter().map(String::as_str).collect()),
        _ => Err(Failure::Usage(usage)),
    }
}

fn field_str(name: &str, spec: &FieldSpec) -> String {
    let mut s = format!(
        "**{}** ({})",
        title_case(name),
        title_case(spec.kind.name())
    );
    if let Some(default) = &spec.default {
        s.push_str(&format!(" [{}]", spec.kind.render(default)));
    }
    s
}

fn sheet_field_str(sheet: &str, field: &str, kind: &str) -> String {
    format!(
        "{} :: **{}** ({})",
        title_case(sheet),
        title_case(field),
        title_case(kind)
    )
}

struct Invocation<'a> {
    store: &'a Store,
    bank: &'a MessageBank,
    prefix: &'a str,
}

impl Invocation<'_> {
    fn sheets_updated(&self, amount: usize) -> String {
        if amount == 0 {
            return String::new();
        }
        self.bank.out("SHEETS_UPDATED", &[("amount", &amount)])
    }

    async fn template(&self, args: &[String]) -> Reply {
        let templates = self.store.templates();
        let (sub, args) = subcommand(args);

        match sub.as_deref() {
            Some("add") => {
                let name = arg(args, 0, TEMPLATE_ADD)?;
                templates.create(name).await?;
                Ok(self
                    .bank
                    .out("TEMPLATE_CREATED", &[("name", &title_case(name))]))
            }
            Some("remove" | "rm") => {
                let removal = templates.remove(&names(args, 0, TEMPLATE_REMOVE)?).await?;

                let mut reply = String::new();
                for name in &removal.removed {
                    reply += &self
                        .bank
                        .out("TEMPLATE_REMOVED", &[("name", &title_case(name))]);
                }
                for name in &removal.not_found {
                    reply += &self
                        .bank
                        .out("TEMPLATE_NOT_FOUND", &[("name", &title_case(name))]);
                }
                if removal.sheets_removed > 0 {
                    reply += &self
                        .bank
                        .out("SHEETS_REMOVED", &[("amount", &removal.sheets_removed)]);
                }
                Ok(reply)
            }
            Some("rename" | "rn") => {
                let old = arg(args, 0, TEMPLATE_RENAME)?;
                let new = arg(args, 1, TEMPLATE_RENAME)?;
                let updated = templates.rename(old, new).await?;

                Ok(self.bank.out(
                    "TEMPLATE_RENAMED",
                    &[("old", &title_case(old)), ("new", &title_case(new))],
                ) + &self.sheets_updated(updated))
            }
            Some("list" | "ls") => {
                let names = templates.list().await?;
                if names.is_empty() {
                    return Ok(self.bank.out("NO_TEMPLATES_AVAILABLE", &[]));
                }

                let names: Vec<String> = names
                    .iter()
                    .map(|name| format!("**{}**", title_case(name)))
                    .collect();
                Ok(self
                    .bank
                    .out("AVAILABLE_TEMPLATES", &[("templates", &names.join(", "))]))
            }
            Some("field" | "fd") => self.template_field(args).await,
            _ => Err(Failure::NoSubcommand(&[
                "add", "remove", "rename", "list", "field",
            ])),
        }
    }

    async fn template_field(&self, args: &[String]) -> Reply {
        let templates = self.store.templates();
        let (sub, args) = subcommand(args);

        match sub.as_deref() {
            Some("add") => {
                let template = arg(args, 0, FIELD_ADD)?;
                let field = arg(args, 1, FIELD_ADD)?;
                let kind = arg(args, 2, FIELD_ADD)?;
                let default = rest_of(args, 3);

                let added = templates
                    .field_add(template, field, kind, default.as_deref())
                    .await?;

                Ok(self.bank.out(
                    "FIELD_ADDED",
                    &[
                        ("field", &field_str(&added.name, &added.spec)),
                        ("template", &title_case(template)),
                    ],
                ) + &self.sheets_updated(added.sheets_updated))
            }
            Some("remove" | "rm") => {
                let template = arg(args, 0, FIELD_REMOVE)?;
                let fields = names(args, 1, FIELD_REMOVE)?;
                let removal = templates.field_remove(template, &fields).await?;

                let mut reply = String::new();
                for (name, spec) in &removal.removed {
                    reply += &self.bank.out(
                        "FIELD_REMOVED",
                        &[
                            ("field", &field_str(name, spec)),
                            ("template", &title_case(template)),
                        ],
                    );
                }
                for name in &removal.not_found {
                    reply += &self
                        .bank
                        .out("FIELD_NOT_FOUND", &[("name", &title_case(name))]);
                }
                Ok(reply + &self.sheets_updated(removal.sheets_updated))
            }
            Some("rename" | "rn") => {
                let template = arg(args, 0, FIELD_RENAME)?;
                let old = arg(args, 1, FIELD_RENAME)?;
                let new = arg(args, 2, FIELD_RENAME)?;
                let renamed = templates.field_rename(template, old, new).await?;

                Ok(self.bank.out(
                    "FIELD_RENAMED",
                    &[
                        ("field", &field_str(&renamed.old, &renamed.spec)),
                        ("new", &title_case(&renamed.new)),
                    ],
                ) + &self.sheets_updated(renamed.sheets_updated))
            }
            Some("list" | "ls") => {
                let template = arg(args, 0, FIELD_LIST)?;
                let fields = templates
                    .field_list(template, args.get(1).map(String::as_str))
                    .await?;

                if fields.is_empty() {
                    return Ok(self
                        .bank
                        .out("NO_FIELDS", &[("template", &title_case(template))]));
                }

                let listed: String = fields
                    .iter()
                    .map(|(name, spec)| format!("\n→ {}", field_str(name, spec)))
                    .collect();
                Ok(self.bank.out(
                    "FIELD_LIST",
                    &[("template", &title_case(template)), ("fields", &listed)],
                ))
            }
            Some("edit" | "ed") => {
                let template = arg(args, 0, FIELD_EDIT)?;
                let field = arg(args, 1, FIELD_EDIT)?;
                let kind = arg(args, 2, FIELD_EDIT)?;
                let default = rest_of(args, 3);

                let edited = templates
                    .field_edit(template, field, kind, default.as_deref())
                    .await?;

                Ok(self.bank.out(
                    "FIELD_UPDATED",
                    &[("field", &field_str(&edited.name, &edited.spec))],
                ) + &self.sheets_updated(edited.sheets_updated))
            }
            _ => Err(Failure::NoSubcommand(&[
                "add", "remove", "rename", "list", "edit",
            ])),
        }
    }

    async fn sheet(&self, args: &[String]) -> Reply {
        let sheets = self.store.sheets();
        let (sub, args) = subcommand(args);

        match sub.as_deref() {
            Some("add") => {
                let name = arg(args, 0, SHEET_ADD)?;
                let template = arg(args, 1, SHEET_ADD)?;
                sheets.create(name, template).await?;

                Ok(self.bank.out(
                    "SHEET_CREATED",
                    &[
                        ("name", &title_case(name)),
                        ("template", &title_case(template)),
                    ],
                ))
            }
            Some("remove" | "rm") => {
                let removal = sheets.remove(&names(args, 0, SHEET_REMOVE)?).await?;

                let mut reply = String::new();
                for name in &removal.removed {
                    reply += &self
                        .bank
                        .out("SHEET_REMOVED", &[("name", &title_case(name))]);
                }
                for name in &removal.not_found {
                    reply += &self
                        .bank
                        .out("SHEET_NOT_FOUND", &[("name", &title_case(name))]);
                }
                Ok(reply)
            }
            Some("rename" | "rn") => {
                let old = arg(args, 0, SHEET_RENAME)?;
                let new = arg(args, 1, SHEET_RENAME)?;
                sheets.rename(old, new).await?;

                Ok(self.bank.out(
                    "SHEET_RENAMED",
                    &[("old", &title_case(old)), ("new", &title_case(new))],
                ))
            }
            Some("list" | "ls") => {
                let listed = sheets.list(args.first().map(String::as_str)).await?;
                if listed.is_empty() {
                    return Ok(self.bank.out("NO_SHEETS_AVAILABLE", &[]));
                }

                let listed: String = listed
                    .iter()
                    .map(|sheet| {
                        format!(
                            "\n- **{}** (from **{}**)",
                            title_case(&sheet.name),
                            title_case(&sheet.template)
                        )
                    })
                    .collect();
                Ok(self.bank.out("AVAILABLE_SHEETS", &[("sheets", &listed)]))
            }
            Some("totext" | "txt") => {
                let name = arg(args, 0, SHEET_TOTEXT)?;
                Ok(format!("```\n{}```", sheets.to_text(name).await?))
            }
            Some("field" | "fd") => {
                let sheet = arg(args, 0, SHEET_FIELD)?;
                let field = arg(args, 1, SHEET_FIELD)?;
                let value = rest_of(args, 2);

                let reading = sheets.field(sheet, field, value.as_deref()).await?;
                let field = sheet_field_str(&reading.sheet, &reading.field, reading.kind.name());
                let key = match value {
                    Some(_) => "FIELD_VALUE_SET",
                    None => "FIELD_VALUE",
                };

                Ok(self
                    .bank
                    .out(key, &[("field", &field), ("value", &reading.value)]))
            }
            Some("do") => {
                let sheet = arg(args, 0, SHEET_DO)?;
                let field = arg(args, 1, SHEET_DO)?;
                let method = arg(args, 2, SHEET_DO)?;
                let method_args: Vec<&str> = args[3..].iter().map(String::as_str).collect();

                let outcome = sheets.apply(sheet, field, method, &method_args).await?;

                Ok(self.bank.out(
                    "FIELD_METHOD_APPLIED",
                    &[
                        (
                            "field",
                            &sheet_field_str(&outcome.sheet, &outcome.field, outcome.kind.name()),
                        ),
                        ("method", &outcome.method),
                        ("old", &outcome.old),
                        ("new", &outcome.new),
                    ],
                ))
            }
            _ => Err(Failure::NoSubcommand(&[
                "add", "remove", "rename", "list", "totext", "field", "do",
            ])),
        }
    }

    fn failure(&self, failure: Failure) -> String {
        match failure {
            Failure::Usage(usage) => self.bank.out(
                "MISSING_ARGUMENT",
                &[("usage", &format!("{}{}", self.prefix, usage))],
            ),
            Failure::NoSubcommand(subcommands) => {
                let subcommands: Vec<String> =
                    subcommands.iter().map(|sub| format!("**{}**", sub)).collect();
                self.bank
                    .out("NO_SUBCOMMAND", &[("subcommands", &subcommands.join(", "))])
            }
            Failure::Charsheet(err) => self.error(err),
        }
    }

    fn error(&self, err: CharsheetError) -> String {
        let bank = self.bank;
        let named = |key: &str, name: &str| bank.out(key, &[("name", &title_case(name))]);

        match err {
            CharsheetError::TemplateNotFound(name) => named("TEMPLATE_NOT_FOUND", &name),
            CharsheetError::TemplateAlreadyExists(name) => named("TEMPLATE_ALREADY_EXISTS", &name),
            CharsheetError::SheetNotFound(name) => named("SHEET_NOT_FOUND", &name),
            CharsheetError::SheetAlreadyExists(name) => named("SHEET_ALREADY_EXISTS", &name),
            CharsheetError::FieldNotFound(name) => named("FIELD_NOT_FOUND", &name),
            CharsheetError::FieldAlreadyExists(name) => named("FIELD_ALREADY_EXISTS", &name),
            CharsheetError::NullField(name) => named("NULL_FIELD", &name),
            CharsheetError::InvalidName(name) => bank.out("INVALID_NAME", &[("name", &name)]),
            CharsheetError::MethodNotFound { method, kind } => {
                let methods: Vec<String> = kind
                    .methods()
                    .iter()
                    .map(|m| format!("`{}`", m.usage))
                    .collect();
                let methods = if methods.is_empty() {
                    "none".to_owned()
                } else {
                    methods.join(", ")
                };
                bank.out(
                    "METHOD_NOT_FOUND",
                    &[
                        ("name", &method),
                        ("type", &title_case(kind.name())),
                        ("methods", &methods),
                    ],
                )
            }
            CharsheetError::InvalidType(name) => {
                let types: Vec<&str> = self.store.types().names().collect();
                bank.out(
                    "INVALID_FIELD_TYPE",
                    &[("type", &name), ("types", &types.join(", "))],
                )
            }
            CharsheetError::InvalidDefaultValue { value, kind } => bank.out(
                "INVALID_DEFAULT_FIELD_VALUE",
                &[("value", &value), ("type", &title_case(kind.name()))],
            ),
            CharsheetError::InvalidFieldValue { value, kind } => bank.out(
                "INVALID_FIELD_VALUE",
                &[("value", &value), ("type", &title_case(kind.name()))],
            ),
            CharsheetError::InvalidArgument { method, reason } => bank.out(
                "INVALID_ARGUMENT",
                &[("method", &method), ("reason", &reason)],
            ),
            CharsheetError::Storage(err) => {
                log_error!("Charsheet storage failure: {}", err);
                bank.out("INTERNAL_ERROR", &[])
            }
        }
    }
}

#[serenity::async_trait]
impl Plugin for Charsheets {
    fn name(&self) -> &'static str {
        "charsheets"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} (cs) template|sheet ... - manage character sheet templates and sheets",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_any_bot_cmd(ctx, &NAMES).await else {
            return Ok(EventHandled::No);
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let reply = execute(
            ctx.charsheets,
            &*ctx.messages.read().await,
            &prefix,
            &args,
        )
        .await;

        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}
