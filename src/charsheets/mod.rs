//! Character sheets: templates declare typed fields, sheets are instances of a template holding
//! values for them.  Structural edits to a template cascade into every sheet built from it.

pub mod error;
pub mod field;
pub mod sheet;
pub mod storage;
pub mod template;

use field::FieldKind;
use sheet::SheetStore;
use std::collections::BTreeMap;
use storage::{DocumentStore, Storage};
use template::TemplateStore;

/// The field types templates may declare, keyed by their lower-cased name.  Built once at
/// startup and handed by reference to the template and sheet stores.
pub struct FieldTypes {
    by_name: BTreeMap<&'static str, FieldKind>,
}

impl FieldTypes {
    pub fn builtin() -> Self {
        Self {
            by_name: FieldKind::ALL
                .into_iter()
                .map(|kind| (kind.name(), kind))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<FieldKind> {
        self.by_name.get(name.to_lowercase().as_str()).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }
}

/// Entry point to the templates and sheets kept in one document store.
pub struct Charsheets {
    storage: Storage,
    types: FieldTypes,
}

impl Charsheets {
    pub fn new(store: impl DocumentStore + 'static, types: FieldTypes) -> Self {
        Self {
            storage: Storage::new(store),
            types,
        }
    }

    pub fn types(&self) -> &FieldTypes {
        &self.types
    }

    pub fn templates(&self) -> TemplateStore<'_> {
        TemplateStore::new(&self.storage, &self.types)
    }

    pub fn sheets(&self) -> SheetStore<'_> {
        SheetStore::new(&self.storage, self.templates())
    }
}

/// Capitalize the first letter of every word, lower-casing the rest: `hit points` becomes
/// `Hit Points`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;

    for c in s.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        word_start = !c.is_alphabetic();
    }

    out
}

#[cfg(test)]
pub(crate) fn in_memory() -> Charsheets {
    Charsheets::new(storage::MemoryStore::new(), FieldTypes::builtin())
}
