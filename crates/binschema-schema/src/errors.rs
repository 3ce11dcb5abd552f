use thiserror::Error;

/// A structural or semantic violation in a schema document. Always reported
/// at schema-load time, carrying a dotted path to the offending type/field
/// so authors can find it without re-deriving it from the JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError {
            path: path.into(),
            message: message.into(),
        }
    }
}
