use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("could not parse expression at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("undefined name: {0}")]
    UndefinedName(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("type mismatch in `{op}`: {message}")]
    TypeMismatch { op: String, message: String },
}
