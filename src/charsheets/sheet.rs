use super::{
    error::{CharsheetError, Result},
    field::FieldKind,
    storage::{DocKey, DocKind, RenameOutcome, Storage},
    template::{Removal, TemplateStore},
    title_case,
};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// An instance of a template.  The set of field names always matches the template's; the
/// template stores keep it that way.
#[derive(serde::Serialize, serde::Deserialize, Default, Clone, Debug)]
pub struct Sheet {
    /// Name of the template this sheet was built from
    pub template: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Json>,
}

#[derive(Debug, PartialEq)]
pub struct SheetSummary {
    pub name: String,
    pub template: String,
}

/// A single field of a sheet, rendered for display.
#[derive(Debug)]
pub struct FieldReading {
    pub sheet: String,
    pub field: String,
    pub kind: FieldKind,
    pub value: String,
}

#[derive(Debug)]
pub struct MethodOutcome {
    pub sheet: String,
    pub field: String,
    pub kind: FieldKind,
    pub method: &'static str,
    pub old: String,
    pub new: String,
}

/// Operations on sheets.  The template a sheet references is looked up by name each time.
pub struct SheetStore<'a> {
    storage: &'a Storage,
    templates: TemplateStore<'a>,
}

impl<'a> SheetStore<'a> {
    pub fn new(storage: &'a Storage, templates: TemplateStore<'a>) -> Self {
        Self { storage, templates }
    }

    pub async fn get(&self, name: &str) -> Result<Sheet> {
        let key = DocKey::sheet(name)?;
        self.storage
            .read(&key)
            .await?
            .ok_or_else(|| CharsheetError::SheetNotFound(key.name.clone()))
    }

    /// Build a new sheet from the current fields and defaults of `template`.
    pub async fn create(&self, name: &str, template: &str) -> Result<()> {
        let key = DocKey::sheet(name)?;
        let template_key = DocKey::template(template)?;
        let schema = self.templates.get(template).await?;

        let sheet = Sheet {
            template: template_key.name,
            fields: schema
                .fields
                .iter()
                .map(|(field, spec)| (field.clone(), spec.default_value()))
                .collect(),
        };

        if self.storage.create(&key, &sheet).await? {
            Ok(())
        } else {
            Err(CharsheetError::SheetAlreadyExists(key.name))
        }
    }

    pub async fn remove(&self, names: &[&str]) -> Result<Removal> {
        let keys = names
            .iter()
            .map(|name| DocKey::sheet(name))
            .collect::<Result<Vec<_>>>()?;

        let mut removal = Removal::default();
        for key in keys {
            if self.storage.delete(&key).await? {
                removal.removed.push(key.name);
            } else {
                removal.not_found.push(key.name);
            }
        }

        Ok(removal)
    }

    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        let from = DocKey::sheet(old)?;
        let to = DocKey::sheet(new)?;

        match self.storage.rename(&from, &to).await? {
            RenameOutcome::Renamed => Ok(()),
            RenameOutcome::SourceMissing => Err(CharsheetError::SheetNotFound(from.name)),
            RenameOutcome::TargetExists => Err(CharsheetError::SheetAlreadyExists(to.name)),
        }
    }

    /// Every sheet, or only those built from `template`, which must exist.
    pub async fn list(&self, template: Option<&str>) -> Result<Vec<SheetSummary>> {
        let filter = match template {
            Some(name) => {
                let key = DocKey::template(name)?;
                if !self.storage.exists(&key).await? {
                    return Err(CharsheetError::TemplateNotFound(key.name));
                }
                Some(key.name)
            }
            None => None,
        };

        let mut sheets = Vec::new();
        for name in self.storage.list(DocKind::Sheet).await? {
            let Ok(key) = DocKey::sheet(&name) else {
                continue;
            };
            // May have been removed since listing
            let Some(sheet) = self.storage.read_or_skip::<Sheet>(&key).await? else {
                continue;
            };

            if filter.as_ref().map_or(true, |t| *t == sheet.template) {
                sheets.push(SheetSummary {
                    name: key.name,
                    template: sheet.template,
                });
            }
        }

        Ok(sheets)
    }

    /// Fixed-width listing of every field of a sheet: name, type and value.
    pub async fn to_text(&self, name: &str) -> Result<String> {
        let sheet = self.get(name).await?;
        let template = self.templates.get(&sheet.template).await?;

        let rows: Vec<(String, String, String)> = sheet
            .fields
            .iter()
            .map(|(field, value)| match template.fields.get(field) {
                Some(spec) => (
                    title_case(field),
                    title_case(spec.kind.name()),
                    spec.kind.render(value),
                ),
                None => (title_case(field), "?".to_owned(), value.to_string()),
            })
            .collect();

        let name_width = rows.iter().map(|(n, _, _)| n.chars().count()).max().unwrap_or(0);
        let type_width = rows.iter().map(|(_, t, _)| t.chars().count()).max().unwrap_or(0);

        let mut text = format!(
            "{} (from {})\n",
            name.to_uppercase(),
            title_case(&sheet.template)
        );
        for (field, kind, value) in rows {
            text.push_str(&format!(
                "    {:<name_width$}  {:<type_width$}  {}\n",
                field, kind, value
            ));
        }

        Ok(text)
    }

    /// Read a field, or set it when `new_value` is given.  Returns the field's current value.
    pub async fn field(
        &self,
        sheet: &str,
        field: &str,
        new_value: Option<&str>,
    ) -> Result<FieldReading> {
        let key = DocKey::sheet(sheet)?;
        let field = field.to_lowercase();

        let Some(raw) = new_value else {
            let doc = self.get(sheet).await?;
            let Some(value) = doc.fields.get(&field) else {
                return Err(CharsheetError::FieldNotFound(field));
            };
            let kind = self.field_kind(&doc, &field).await?;

            return Ok(FieldReading {
                sheet: key.name,
                kind,
                value: kind.render(value),
                field,
            });
        };

        let mut doc = self
            .storage
            .write::<Sheet>(&key)
            .await?
            .ok_or_else(|| CharsheetError::SheetNotFound(key.name.clone()))?;

        if !doc.fields.contains_key(&field) {
            return Err(CharsheetError::FieldNotFound(field));
        }

        let kind = self.field_kind(&doc, &field).await?;
        let value = kind.parse(raw).map_err(CharsheetError::from_field_value)?;

        doc.fields.insert(field.clone(), value.to_json());
        doc.commit().await?;

        Ok(FieldReading {
            sheet: key.name,
            field,
            kind,
            value: value.to_string(),
        })
    }

    /// Run a field type's method on a sheet value and store the result.
    pub async fn apply(
        &self,
        sheet: &str,
        field: &str,
        method: &str,
        args: &[&str],
    ) -> Result<MethodOutcome> {
        let key = DocKey::sheet(sheet)?;
        let field = field.to_lowercase();

        let mut doc = self
            .storage
            .write::<Sheet>(&key)
            .await?
            .ok_or_else(|| CharsheetError::SheetNotFound(key.name.clone()))?;

        let stored = match doc.fields.get(&field) {
            None => return Err(CharsheetError::FieldNotFound(field)),
            Some(Json::Null) => return Err(CharsheetError::NullField(field)),
            Some(stored) => stored.clone(),
        };

        let kind = self.field_kind(&doc, &field).await?;
        let Some(method) = kind.method(method) else {
            return Err(CharsheetError::MethodNotFound {
                method: method.to_lowercase(),
                kind,
            });
        };

        // Written behind our back, or a cascade that didn't reach this sheet
        let Some(old) = kind.decode(&stored) else {
            return Err(CharsheetError::InvalidFieldValue {
                value: stored.to_string(),
                kind,
            });
        };

        let new = method
            .apply(&old, args)
            .map_err(CharsheetError::from_field_value)?;

        doc.fields.insert(field.clone(), new.to_json());
        doc.commit().await?;

        Ok(MethodOutcome {
            sheet: key.name,
            field,
            kind,
            method: method.name,
            old: old.to_string(),
            new: new.to_string(),
        })
    }

    /// Resolve a field's type through the sheet's template.
    async fn field_kind(&self, sheet: &Sheet, field: &str) -> Result<FieldKind> {
        self.templates
            .get(&sheet.template)
            .await?
            .fields
            .get(field)
            .map(|spec| spec.kind)
            .ok_or_else(|| CharsheetError::FieldNotFound(field.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charsheets::{in_memory, storage::FileStore, Charsheets, FieldTypes};
    use serde_json::json;
    use std::sync::Arc;

    async fn hero_with_sheet() -> Charsheets {
        let cs = in_memory();
        cs.templates().create("hero").await.unwrap();
        cs.templates()
            .field_add("hero", "hp", "gauge", Some("10/10"))
            .await
            .unwrap();
        cs.sheets().create("Gorak", "Hero").await.unwrap();
        cs
    }

    #[tokio::test]
    async fn test_create_snapshots_defaults() {
        let cs = hero_with_sheet().await;

        let sheet = cs.sheets().get("gorak").await.unwrap();
        assert_eq!(sheet.template, "hero");
        assert_eq!(sheet.fields["hp"], json!([10, 10]));

        assert!(matches!(
            cs.sheets().create("gorak", "hero").await,
            Err(CharsheetError::SheetAlreadyExists(_))
        ));
        assert!(matches!(
            cs.sheets().create("gorak", "villain").await,
            Err(CharsheetError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_field_add_cascades_default() {
        let cs = hero_with_sheet().await;

        let added = cs
            .templates()
            .field_add("hero", "name", "scroll", Some("Nobody"))
            .await
            .unwrap();
        assert_eq!(added.sheets_updated, 1);

        let added = cs
            .templates()
            .field_add("hero", "xp", "abacus", None)
            .await
            .unwrap();
        assert_eq!(added.sheets_updated, 1);

        let sheet = cs.sheets().get("gorak").await.unwrap();
        assert_eq!(sheet.fields["name"], json!("Nobody"));
        assert_eq!(sheet.fields["xp"], Json::Null);
    }

    #[tokio::test]
    async fn test_field_rename_cascades() {
        let cs = hero_with_sheet().await;
        cs.sheets().field("gorak", "hp", Some("4/10")).await.unwrap();

        let renamed = cs
            .templates()
            .field_rename("hero", "hp", "health")
            .await
            .unwrap();
        assert_eq!(renamed.sheets_updated, 1);

        let sheet = cs.sheets().get("gorak").await.unwrap();
        assert!(!sheet.fields.contains_key("hp"));
        assert_eq!(sheet.fields["health"], json!([4, 10]));
    }

    #[tokio::test]
    async fn test_field_remove_cascades() {
        let cs = hero_with_sheet().await;
        cs.templates()
            .field_add("hero", "xp", "abacus", Some("0"))
            .await
            .unwrap();

        let removal = cs.templates().field_remove("hero", &["xp"]).await.unwrap();
        assert_eq!(removal.sheets_updated, 1);

        let sheet = cs.sheets().get("gorak").await.unwrap();
        assert_eq!(sheet.fields.keys().collect::<Vec<_>>(), ["hp"]);
    }

    #[tokio::test]
    async fn test_template_remove_cascades() {
        let cs = hero_with_sheet().await;
        cs.templates().create("villain").await.unwrap();
        cs.sheets().create("mordo", "villain").await.unwrap();

        let removal = cs.templates().remove(&["hero", "dragon"]).await.unwrap();
        assert_eq!(removal.removed, ["hero"]);
        assert_eq!(removal.not_found, ["dragon"]);
        assert_eq!(removal.sheets_removed, 1);

        let sheets = cs.sheets().list(None).await.unwrap();
        assert_eq!(
            sheets,
            [SheetSummary {
                name: "mordo".to_owned(),
                template: "villain".to_owned()
            }]
        );
    }

    #[tokio::test]
    async fn test_template_rename_repoints_sheets() {
        let cs = hero_with_sheet().await;

        assert_eq!(cs.templates().rename("hero", "champion").await.unwrap(), 1);
        assert_eq!(cs.sheets().get("gorak").await.unwrap().template, "champion");
        assert_eq!(cs.sheets().list(Some("champion")).await.unwrap().len(), 1);
        assert!(matches!(
            cs.sheets().list(Some("hero")).await,
            Err(CharsheetError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_field_get_and_set() {
        let cs = hero_with_sheet().await;
        let sheets = cs.sheets();

        assert_eq!(sheets.field("gorak", "hp", None).await.unwrap().value, "10/10");

        let set = sheets.field("gorak", "HP", Some("7/10")).await.unwrap();
        assert_eq!(set.value, "7/10");
        assert_eq!(sheets.field("gorak", "hp", None).await.unwrap().value, "7/10");

        assert!(matches!(
            sheets.field("gorak", "hp", Some("seven")).await,
            Err(CharsheetError::InvalidFieldValue { kind: FieldKind::Gauge, .. })
        ));
        assert_eq!(sheets.field("gorak", "hp", None).await.unwrap().value, "7/10");

        assert!(matches!(
            sheets.field("gorak", "mana", None).await,
            Err(CharsheetError::FieldNotFound(_))
        ));
        assert!(matches!(
            sheets.field("nobody", "hp", None).await,
            Err(CharsheetError::SheetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_field_with_missing_template() {
        let cs = hero_with_sheet().await;
        // Dangling reference, only reachable by editing files behind the bot's back
        let key = DocKey::sheet("gorak").unwrap();
        let mut sheet = cs.storage.write::<Sheet>(&key).await.unwrap().unwrap();
        sheet.template = "ghost".to_owned();
        sheet.commit().await.unwrap();

        assert!(matches!(
            cs.sheets().field("gorak", "hp", Some("1/10")).await,
            Err(CharsheetError::TemplateNotFound(_))
        ));
        assert!(matches!(
            cs.sheets().to_text("gorak").await,
            Err(CharsheetError::TemplateNotFound(_))
        ));
        assert_eq!(cs.sheets().get("gorak").await.unwrap().fields["hp"], json!([10, 10]));
    }

    #[tokio::test]
    async fn test_apply_method() {
        let cs = hero_with_sheet().await;
        let sheets = cs.sheets();

        let outcome = sheets.apply("gorak", "hp", "subtract", &["3"]).await.unwrap();
        assert_eq!(outcome.old, "10/10");
        assert_eq!(outcome.new, "7/10");

        assert!(matches!(
            sheets.apply("gorak", "hp", "explode", &[]).await,
            Err(CharsheetError::MethodNotFound { kind: FieldKind::Gauge, .. })
        ));
        assert!(matches!(
            sheets.apply("gorak", "hp", "add", &["lots"]).await,
            Err(CharsheetError::InvalidArgument { method: "add", .. })
        ));
        assert_eq!(sheets.field("gorak", "hp", None).await.unwrap().value, "7/10");
    }

    #[tokio::test]
    async fn test_apply_on_unset_field() {
        let cs = hero_with_sheet().await;
        cs.templates()
            .field_add("hero", "xp", "abacus", None)
            .await
            .unwrap();

        assert!(matches!(
            cs.sheets().apply("gorak", "xp", "add", &["1"]).await,
            Err(CharsheetError::NullField(_))
        ));
    }

    #[tokio::test]
    async fn test_field_edit_resets_sheet_values() {
        let cs = hero_with_sheet().await;
        let sheets = cs.sheets();
        sheets.field("gorak", "hp", Some("4/10")).await.unwrap();

        let edit = cs
            .templates()
            .field_edit("hero", "hp", "abacus", None)
            .await
            .unwrap();
        assert_eq!(edit.sheets_updated, 1);
        assert_eq!(sheets.get("gorak").await.unwrap().fields["hp"], Json::Null);
        assert_eq!(sheets.field("gorak", "hp", None).await.unwrap().value, "unset");
        assert!(matches!(
            sheets.apply("gorak", "hp", "add", &["1"]).await,
            Err(CharsheetError::NullField(_))
        ));

        sheets.field("gorak", "hp", Some("12")).await.unwrap();
        let outcome = sheets.apply("gorak", "hp", "add", &["1"]).await.unwrap();
        assert_eq!(outcome.new, "13");

        let edit = cs
            .templates()
            .field_edit("hero", "hp", "gauge", Some("8/8"))
            .await
            .unwrap();
        assert_eq!(edit.sheets_updated, 1);
        assert_eq!(sheets.field("gorak", "hp", None).await.unwrap().value, "8/8");
    }

    #[tokio::test]
    async fn test_mismatched_stored_value() {
        let cs = hero_with_sheet().await;
        let key = DocKey::sheet("gorak").unwrap();
        let mut sheet = cs.storage.write::<Sheet>(&key).await.unwrap().unwrap();
        sheet.fields.insert("hp".to_owned(), json!(12));
        sheet.commit().await.unwrap();

        let sheets = cs.sheets();
        assert_eq!(sheets.field("gorak", "hp", None).await.unwrap().value, "12");
        assert!(matches!(
            sheets.apply("gorak", "hp", "add", &["1"]).await,
            Err(CharsheetError::InvalidFieldValue { kind: FieldKind::Gauge, .. })
        ));
        assert_eq!(sheets.get("gorak").await.unwrap().fields["hp"], json!(12));
    }

    #[tokio::test]
    async fn test_remove_rename_and_text() {
        let cs = hero_with_sheet().await;
        cs.templates()
            .field_add("hero", "name", "scroll", Some("Gorak the Bold"))
            .await
            .unwrap();
        let sheets = cs.sheets();

        assert!(matches!(
            sheets.rename("nobody", "x").await,
            Err(CharsheetError::SheetNotFound(_))
        ));
        sheets.rename("gorak", "Grok").await.unwrap();

        let text = sheets.to_text("grok").await.unwrap();
        assert_eq!(
            text,
            "GROK (from Hero)\n    \
             Hp    Gauge   10/10\n    \
             Name  Scroll  Gorak the Bold\n"
        );

        let removal = sheets.remove(&["grok", "gorak"]).await.unwrap();
        assert_eq!(removal.removed, ["grok"]);
        assert_eq!(removal.not_found, ["gorak"]);
        assert!(sheets.list(None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_methods_on_one_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let cs = Arc::new(Charsheets::new(store, FieldTypes::builtin()));
        cs.templates().create("hero").await.unwrap();
        cs.templates()
            .field_add("hero", "xp", "abacus", Some("0"))
            .await
            .unwrap();
        cs.sheets().create("gorak", "hero").await.unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let cs = Arc::clone(&cs);
                tokio::spawn(async move {
                    cs.sheets()
                        .apply("gorak", "xp", "add", &["1"])
                        .await
                        .map(|_| ())
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(cs.sheets().field("gorak", "xp", None).await.unwrap().value, "50");
    }
}
