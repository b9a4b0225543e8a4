use super::field::FieldKind;
use super::storage::DocKey;
use thiserror::Error;

/// Error from the field type layer: parsing a value or running a method on one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("Invalid value `{value}` for type {kind}")]
    InvalidValue { value: String, kind: FieldKind },
    #[error("Invalid argument for `{method}`: {reason}")]
    InvalidArgument { method: &'static str, reason: String },
}

/// Error reading or writing a document.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Document `{key}` is not valid JSON: {source}")]
    Corrupt {
        key: DocKey,
        source: serde_json::Error,
    },
}

/// Every way a template or sheet operation can be refused.  Apart from `Storage`, these are
/// user errors: the operation is aborted and the message reported back to the caller.
#[derive(Debug, Error)]
pub enum CharsheetError {
    #[error("Template `{0}` not found")]
    TemplateNotFound(String),
    #[error("Template `{0}` already exists")]
    TemplateAlreadyExists(String),
    #[error("Sheet `{0}` not found")]
    SheetNotFound(String),
    #[error("Sheet `{0}` already exists")]
    SheetAlreadyExists(String),
    #[error("Field `{0}` not found")]
    FieldNotFound(String),
    #[error("Field `{0}` already exists")]
    FieldAlreadyExists(String),
    #[error("Type {kind} has no method `{method}`")]
    MethodNotFound { method: String, kind: FieldKind },
    #[error("Invalid field type `{0}`")]
    InvalidType(String),
    #[error("Invalid default value `{value}` for type {kind}")]
    InvalidDefaultValue { value: String, kind: FieldKind },
    #[error("Invalid value `{value}` for type {kind}")]
    InvalidFieldValue { value: String, kind: FieldKind },
    #[error("Invalid argument for `{method}`: {reason}")]
    InvalidArgument { method: &'static str, reason: String },
    #[error("Field `{0}` has no value")]
    NullField(String),
    #[error("Invalid name `{0}`")]
    InvalidName(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CharsheetError {
    /// Lift a field-layer error raised while setting a sheet value or running a method.
    pub fn from_field_value(err: FieldError) -> Self {
        match err {
            FieldError::InvalidValue { value, kind } => {
                CharsheetError::InvalidFieldValue { value, kind }
            }
            FieldError::InvalidArgument { method, reason } => {
                CharsheetError::InvalidArgument { method, reason }
            }
        }
    }

    /// Lift a field-layer error raised while parsing a template field's default.
    pub fn from_field_default(err: FieldError) -> Self {
        match err {
            FieldError::InvalidValue { value, kind } => {
                CharsheetError::InvalidDefaultValue { value, kind }
            }
            other => Self::from_field_value(other),
        }
    }
}

pub type Result<T, E = CharsheetError> = std::result::Result<T, E>;
