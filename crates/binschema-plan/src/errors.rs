use thiserror::Error;

/// Everything that can go wrong evaluating a schema against real bytes.
/// Decode and encode failures are kept in one enum (rather than split, as
/// the runtime's `ReadError`/`WriteError` are) because both directions share
/// failure modes like unencodable/undecodable discriminators and unresolved
/// paths.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("read error at byte {0}: {1}")]
    Read(u64, binschema_codec::ReadError),
    #[error("write error: {0}")]
    Write(#[from] binschema_codec::WriteError),
    #[error("expression error: {0}")]
    Expr(#[from] binschema_expr::ExprError),
    #[error("path `{0}` did not resolve to a value in the current scope")]
    UnresolvedPath(String),
    #[error("no discriminated union variant matched value {value:?}")]
    NoMatchingVariant { value: binschema_expr::Value },
    #[error("const mismatch at `{path}`: expected {expected:?}, found {found:?}")]
    ConstMismatch {
        path: String,
        expected: crate::value::Value,
        found: crate::value::Value,
    },
    #[error("position {position} is not aligned to {alignment} bytes")]
    Unaligned { position: u64, alignment: u64 },
    #[error("circular reference evaluating instance `{0}`")]
    CircularInstance(String),
    #[error("instance `{0}` was skipped by its gating condition and has no value")]
    InstanceSkipped(String),
    #[error("string at `{path}` is not valid {encoding}: {source}")]
    InvalidString {
        path: String,
        encoding: &'static str,
        source: std::string::FromUtf8Error,
    },
    #[error("byte {value} at `{path}` is out of range for {encoding}")]
    ByteOutOfRange { path: String, encoding: &'static str, value: u8 },
    #[error("value {value} at `{path}` does not fit in {bits} bits")]
    ValueOutOfRange { path: String, value: i64, bits: u32 },
    #[error("`{path}` has no content between `from_after_field` anchor and its own position")]
    EmptyMeasuredSpan { path: String },
    #[error("type `{0}` is not defined in this schema")]
    UnknownType(String),
}
