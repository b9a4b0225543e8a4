use super::{
    error::{CharsheetError, Result},
    field::FieldKind,
    sheet::Sheet,
    storage::{DocKey, DocKind, RenameOutcome, Storage},
    FieldTypes,
};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// A named schema: the typed fields every sheet built from it carries.
#[derive(serde::Serialize, serde::Deserialize, Default, Clone, Debug)]
pub struct Template {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub default: Option<Json>,
}

impl FieldSpec {
    /// The value a sheet gets for this field when it doesn't have one of its own.
    pub fn default_value(&self) -> Json {
        self.default.clone().unwrap_or(Json::Null)
    }
}

/// Names removed by a bulk delete, plus how many dependent documents went with them.
#[derive(Debug, Default)]
pub struct Removal {
    pub removed: Vec<String>,
    pub not_found: Vec<String>,
    pub sheets_removed: usize,
}

#[derive(Debug)]
pub struct FieldChange {
    pub name: String,
    pub spec: FieldSpec,
    pub sheets_updated: usize,
}

#[derive(Debug, Default)]
pub struct FieldRemoval {
    pub removed: Vec<(String, FieldSpec)>,
    pub not_found: Vec<String>,
    pub sheets_updated: usize,
}

#[derive(Debug)]
pub struct FieldRename {
    pub old: String,
    pub new: String,
    pub spec: FieldSpec,
    pub sheets_updated: usize,
}

/// Operations on templates.  Anything that changes a template's shape is pushed into the
/// sheets that reference it.
pub struct TemplateStore<'a> {
    storage: &'a Storage,
    types: &'a FieldTypes,
}

impl<'a> TemplateStore<'a> {
    pub fn new(storage: &'a Storage, types: &'a FieldTypes) -> Self {
        Self { storage, types }
    }

    fn field_type(&self, name: &str) -> Result<FieldKind> {
        self.types
            .get(name)
            .ok_or_else(|| CharsheetError::InvalidType(name.to_lowercase()))
    }

    /// Load a template, which must exist.
    pub async fn get(&self, name: &str) -> Result<Template> {
        let key = DocKey::template(name)?;
        self.storage
            .read(&key)
            .await?
            .ok_or_else(|| CharsheetError::TemplateNotFound(key.name.clone()))
    }

    pub async fn create(&self, name: &str) -> Result<()> {
        let key = DocKey::template(name)?;

        if self.storage.create(&key, &Template::default()).await? {
            Ok(())
        } else {
            Err(CharsheetError::TemplateAlreadyExists(key.name))
        }
    }

    /// Delete each named template, then every sheet built from any of them.
    pub async fn remove(&self, names: &[&str]) -> Result<Removal> {
        let keys = names
            .iter()
            .map(|name| DocKey::template(name))
            .collect::<Result<Vec<_>>>()?;

        let mut removal = Removal::default();
        for key in keys {
            if self.storage.delete(&key).await? {
                removal.removed.push(key.name);
            } else {
                removal.not_found.push(key.name);
            }
        }

        if removal.removed.is_empty() {
            return Ok(removal);
        }

        for name in self.storage.list(DocKind::Sheet).await? {
            let Ok(key) = DocKey::sheet(&name) else {
                continue;
            };
            // May have been removed since listing
            let Some(sheet) = self.storage.read_or_skip::<Sheet>(&key).await? else {
                continue;
            };

            if removal.removed.contains(&sheet.template) && self.storage.delete(&key).await? {
                removal.sheets_removed += 1;
            }
        }

        Ok(removal)
    }

    /// Rename a template and repoint its sheets.  Returns how many sheets were updated.
    pub async fn rename(&self, old: &str, new: &str) -> Result<usize> {
        let from = DocKey::template(old)?;
        let to = DocKey::template(new)?;

        match self.storage.rename(&from, &to).await? {
            RenameOutcome::Renamed => {}
            RenameOutcome::SourceMissing => return Err(CharsheetError::TemplateNotFound(from.name)),
            RenameOutcome::TargetExists => {
                return Err(CharsheetError::TemplateAlreadyExists(to.name))
            }
        }

        self.cascade(&from.name, |sheet| sheet.template = to.name.clone())
            .await
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        Ok(self.storage.list(DocKind::Template).await?)
    }

    /// Declare a new field, giving every existing sheet of the template its default.
    pub async fn field_add(
        &self,
        template: &str,
        field: &str,
        type_name: &str,
        default: Option<&str>,
    ) -> Result<FieldChange> {
        let kind = self.field_type(type_name)?;
        let key = DocKey::template(template)?;

        if !self.storage.exists(&key).await? {
            return Err(CharsheetError::TemplateNotFound(key.name));
        }

        let spec = FieldSpec {
            kind,
            default: parse_default(kind, default)?,
        };
        let name = field.to_lowercase();

        let mut doc = self
            .storage
            .write::<Template>(&key)
            .await?
            .ok_or_else(|| CharsheetError::TemplateNotFound(key.name.clone()))?;

        if doc.fields.contains_key(&name) {
            return Err(CharsheetError::FieldAlreadyExists(name));
        }

        doc.fields.insert(name.clone(), spec.clone());
        doc.commit().await?;

        let value = spec.default_value();
        let sheets_updated = self
            .cascade(&key.name, |sheet| {
                sheet.fields.insert(name.clone(), value.clone());
            })
            .await?;

        Ok(FieldChange {
            name,
            spec,
            sheets_updated,
        })
    }

    /// Drop fields from a template and its sheets.  Unknown fields are reported, not fatal.
    pub async fn field_remove(&self, template: &str, fields: &[&str]) -> Result<FieldRemoval> {
        let key = DocKey::template(template)?;
        let mut doc = self
            .storage
            .write::<Template>(&key)
            .await?
            .ok_or_else(|| CharsheetError::TemplateNotFound(key.name.clone()))?;

        let mut removal = FieldRemoval::default();
        for field in fields {
            let name = field.to_lowercase();
            match doc.fields.remove(&name) {
                Some(spec) => removal.removed.push((name, spec)),
                None => removal.not_found.push(name),
            }
        }

        if removal.removed.is_empty() {
            return Ok(removal);
        }

        doc.commit().await?;

        let removed = &removal.removed;
        removal.sheets_updated = self
            .cascade(&key.name, |sheet| {
                for (name, _) in removed {
                    sheet.fields.remove(name);
                }
            })
            .await?;

        Ok(removal)
    }

    pub async fn field_rename(&self, template: &str, old: &str, new: &str) -> Result<FieldRename> {
        let key = DocKey::template(template)?;
        let old = old.to_lowercase();
        let new = new.to_lowercase();

        let mut doc = self
            .storage
            .write::<Template>(&key)
            .await?
            .ok_or_else(|| CharsheetError::TemplateNotFound(key.name.clone()))?;

        if !doc.fields.contains_key(&old) {
            return Err(CharsheetError::FieldNotFound(old));
        }
        if doc.fields.contains_key(&new) {
            return Err(CharsheetError::FieldAlreadyExists(new));
        }

        let Some(spec) = doc.fields.remove(&old) else {
            return Err(CharsheetError::FieldNotFound(old));
        };
        doc.fields.insert(new.clone(), spec.clone());
        doc.commit().await?;

        let sheets_updated = self
            .cascade(&key.name, |sheet| {
                if let Some(value) = sheet.fields.remove(&old) {
                    sheet.fields.insert(new.clone(), value);
                }
            })
            .await?;

        Ok(FieldRename {
            old,
            new,
            spec,
            sheets_updated,
        })
    }

    /// Fields of a template, optionally only those of one type.  `any` means no filter.
    pub async fn field_list(
        &self,
        template: &str,
        type_filter: Option<&str>,
    ) -> Result<Vec<(String, FieldSpec)>> {
        let filter = match type_filter {
            Some(name) if !name.eq_ignore_ascii_case("any") => Some(self.field_type(name)?),
            _ => None,
        };

        Ok(self
            .get(template)
            .await?
            .fields
            .into_iter()
            .filter(|(_, spec)| filter.map_or(true, |kind| spec.kind == kind))
            .collect())
    }

    /// Replace a field's type and default, then overwrite the field in every sheet of the
    /// template with the new default (unset if there is none).  Stored values are never
    /// converted to the new type.
    pub async fn field_edit(
        &self,
        template: &str,
        field: &str,
        type_name: &str,
        default: Option<&str>,
    ) -> Result<FieldChange> {
        let kind = self.field_type(type_name)?;
        let key = DocKey::template(template)?;

        if !self.storage.exists(&key).await? {
            return Err(CharsheetError::TemplateNotFound(key.name));
        }

        let spec = FieldSpec {
            kind,
            default: parse_default(kind, default)?,
        };
        let name = field.to_lowercase();

        let mut doc = self
            .storage
            .write::<Template>(&key)
            .await?
            .ok_or_else(|| CharsheetError::TemplateNotFound(key.name.clone()))?;

        let Some(slot) = doc.fields.get_mut(&name) else {
            return Err(CharsheetError::FieldNotFound(name));
        };
        *slot = spec.clone();
        doc.commit().await?;

        let value = spec.default_value();
        let sheets_updated = self
            .cascade(&key.name, |sheet| {
                sheet.fields.insert(name.clone(), value.clone());
            })
            .await?;

        Ok(FieldChange {
            name,
            spec,
            sheets_updated,
        })
    }

    /// Apply `update` to every sheet referencing `template`, persisting each one.  Returns the
    /// number of sheets updated.  Sheets are updated one at a time; a failure part way leaves
    /// the sheets already visited updated.
    async fn cascade<F>(&self, template: &str, mut update: F) -> Result<usize>
    where
        F: FnMut(&mut Sheet) + Send,
    {
        let mut updated = 0;

        for name in self.storage.list(DocKind::Sheet).await? {
            let Ok(key) = DocKey::sheet(&name) else {
                continue;
            };
            let Some(mut sheet) = self.storage.write_or_skip::<Sheet>(&key).await? else {
                continue;
            };
            if sheet.template != template {
                continue;
            }

            update(&mut sheet);
            sheet.commit().await?;
            updated += 1;
        }

        Ok(updated)
    }
}

fn parse_default(kind: FieldKind, default: Option<&str>) -> Result<Option<Json>> {
    default
        .map(|raw| kind.parse(raw).map(|value| value.to_json()))
        .transpose()
        .map_err(CharsheetError::from_field_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charsheets::{in_memory, storage::FileStore, Charsheets, FieldTypes};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_list() {
        let cs = in_memory();
        cs.templates().create("Hero").await.unwrap();
        cs.templates().create("monster").await.unwrap();

        assert!(matches!(
            cs.templates().create("HERO").await,
            Err(CharsheetError::TemplateAlreadyExists(name)) if name == "hero"
        ));
        assert_eq!(cs.templates().list().await.unwrap(), ["hero", "monster"]);
        assert!(cs.templates().get("hero").await.unwrap().fields.is_empty());
    }

    #[tokio::test]
    async fn test_field_add_errors_in_order() {
        let cs = in_memory();
        let templates = cs.templates();
        templates.create("hero").await.unwrap();

        assert!(matches!(
            templates.field_add("nope", "hp", "dice", None).await,
            Err(CharsheetError::InvalidType(t)) if t == "dice"
        ));
        assert!(matches!(
            templates.field_add("nope", "hp", "gauge", Some("x")).await,
            Err(CharsheetError::TemplateNotFound(_))
        ));
        assert!(matches!(
            templates.field_add("hero", "hp", "gauge", Some("10")).await,
            Err(CharsheetError::InvalidDefaultValue { kind: FieldKind::Gauge, .. })
        ));

        let added = templates
            .field_add("hero", "HP", "Gauge", Some("10/10"))
            .await
            .unwrap();
        assert_eq!(added.name, "hp");
        assert_eq!(added.spec.default, Some(json!([10, 10])));

        assert!(matches!(
            templates.field_add("hero", "hp", "abacus", None).await,
            Err(CharsheetError::FieldAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_field_list_filter() {
        let cs = in_memory();
        let templates = cs.templates();
        templates.create("hero").await.unwrap();
        templates.field_add("hero", "hp", "gauge", None).await.unwrap();
        templates.field_add("hero", "str", "abacus", Some("3")).await.unwrap();
        templates.field_add("hero", "dex", "abacus", None).await.unwrap();

        let names = |fields: Vec<(String, FieldSpec)>| {
            fields.into_iter().map(|(name, _)| name).collect::<Vec<_>>()
        };

        assert_eq!(
            names(templates.field_list("hero", None).await.unwrap()),
            ["dex", "hp", "str"]
        );
        assert_eq!(
            names(templates.field_list("hero", Some("any")).await.unwrap()),
            ["dex", "hp", "str"]
        );
        assert_eq!(
            names(templates.field_list("hero", Some("Abacus")).await.unwrap()),
            ["dex", "str"]
        );
        assert!(matches!(
            templates.field_list("hero", Some("dice")).await,
            Err(CharsheetError::InvalidType(_))
        ));
        assert!(matches!(
            templates.field_list("villain", None).await,
            Err(CharsheetError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_field_remove_reports_missing() {
        let cs = in_memory();
        let templates = cs.templates();
        templates.create("hero").await.unwrap();
        templates.field_add("hero", "hp", "gauge", None).await.unwrap();
        templates.field_add("hero", "mp", "gauge", None).await.unwrap();

        let removal = templates
            .field_remove("hero", &["HP", "luck"])
            .await
            .unwrap();
        assert_eq!(removal.removed.len(), 1);
        assert_eq!(removal.removed[0].0, "hp");
        assert_eq!(removal.not_found, ["luck"]);

        let fields = templates.get("hero").await.unwrap().fields;
        assert_eq!(fields.keys().collect::<Vec<_>>(), ["mp"]);
    }

    #[tokio::test]
    async fn test_field_rename_and_edit() {
        let cs = in_memory();
        let templates = cs.templates();
        templates.create("hero").await.unwrap();
        templates.field_add("hero", "hp", "gauge", None).await.unwrap();
        templates.field_add("hero", "mp", "gauge", None).await.unwrap();

        assert!(matches!(
            templates.field_rename("hero", "luck", "fate").await,
            Err(CharsheetError::FieldNotFound(_))
        ));
        assert!(matches!(
            templates.field_rename("hero", "hp", "mp").await,
            Err(CharsheetError::FieldAlreadyExists(_))
        ));

        templates.field_rename("hero", "hp", "health").await.unwrap();
        templates
            .field_edit("hero", "health", "abacus", Some("12"))
            .await
            .unwrap();

        let fields = templates.get("hero").await.unwrap().fields;
        assert!(!fields.contains_key("hp"));
        assert_eq!(
            fields["health"],
            FieldSpec {
                kind: FieldKind::Abacus,
                default: Some(json!(12))
            }
        );

        assert!(matches!(
            templates.field_edit("hero", "luck", "abacus", None).await,
            Err(CharsheetError::FieldNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_template() {
        let cs = in_memory();
        let templates = cs.templates();
        templates.create("hero").await.unwrap();
        templates.create("villain").await.unwrap();

        assert!(matches!(
            templates.rename("nobody", "someone").await,
            Err(CharsheetError::TemplateNotFound(_))
        ));
        assert!(matches!(
            templates.rename("hero", "villain").await,
            Err(CharsheetError::TemplateAlreadyExists(_))
        ));
        assert_eq!(templates.rename("hero", "Champion").await.unwrap(), 0);
        assert_eq!(templates.list().await.unwrap(), ["champion", "villain"]);
    }

    #[tokio::test]
    async fn test_corrupt_sheet_does_not_stop_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let cs = Charsheets::new(store, FieldTypes::builtin());
        cs.templates().create("hero").await.unwrap();
        cs.sheets().create("gorak", "hero").await.unwrap();
        cs.sheets().create("zed", "hero").await.unwrap();
        std::fs::write(
            dir.path().join("sheets").join("broken.cscharsheet"),
            "{not json",
        )
        .unwrap();

        let added = cs
            .templates()
            .field_add("hero", "xp", "abacus", Some("0"))
            .await
            .unwrap();
        assert_eq!(added.sheets_updated, 2);
        assert_eq!(cs.sheets().list(None).await.unwrap().len(), 2);

        let removal = cs.templates().remove(&["hero"]).await.unwrap();
        assert_eq!(removal.sheets_removed, 2);
        assert_eq!(cs.storage.list(DocKind::Sheet).await.unwrap(), ["broken"]);
    }
}
