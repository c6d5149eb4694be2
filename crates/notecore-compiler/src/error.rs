use thiserror::Error;

/// Errors raised by `notecore-compiler`. `SelfReference` is deliberately
/// absent: the compiler never knows the id of the note it is compiling an
/// expression for, so self-reference is checked by the caller
/// (`notecore-module`) once it has both the note id and the reference set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("expression is empty")]
    EmptyExpression,
    #[error("syntax error at position {pos}: {msg}")]
    SyntaxError { pos: usize, msg: String },
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("division by zero in a literal fraction")]
    DivisionByZeroConstant,
    #[error("expression nesting depth {depth} exceeds the configured maximum {max}")]
    DepthExceeded { depth: usize, max: usize },
}
