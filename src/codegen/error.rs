//! Ошибки генерации IR.

use thiserror::Error;

use crate::ir::{BuilderError, Type, VerifyError};
use crate::parser::token::Position;

/// Ошибка генерации. Любая из них прерывает генерацию модуля целиком.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Undefined variable: {name} at {position}")]
    UndefinedVariable { name: String, position: Position },

    #[error("Unknown function referenced: {name} at {position}")]
    UnknownFunction { name: String, position: Position },

    #[error("Type mismatch: {left} {op} {right} at {position}")]
    TypeMismatch {
        op: String,
        left: Type,
        right: Type,
        position: Position,
    },

    #[error("Unsupported operator '{op}' for {ty} at {position}")]
    UnsupportedOperator {
        op: String,
        ty: Type,
        position: Position,
    },

    #[error("Unsupported type in print statement: {ty} at {position}")]
    UnsupportedPrintType { ty: Type, position: Position },

    #[error("Condition of type {ty} cannot be tested at {position}")]
    InvalidCondition { ty: Type, position: Position },

    #[error("Invalid literal '{text}' at {position}")]
    InvalidLiteral { text: String, position: Position },

    #[error("Function '{name}' is already defined (at {position})")]
    DuplicateFunction { name: String, position: Position },

    #[error("Function '{name}' expects {expected} arguments but got {found} at {position}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        position: Position,
    },

    #[error("Argument {index} of '{name}' must be {expected} but is {found} at {position}")]
    ArgumentType {
        name: String,
        index: usize,
        expected: Type,
        found: Type,
        position: Position,
    },

    #[error("Call to '{name}' produces no value at {position}")]
    VoidValue { name: String, position: Position },

    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),

    #[error("Module verification failed: {0}")]
    Verification(#[from] VerifyError),
}

/// Результат генерации.
pub type GenResult<T> = Result<T, GenerationError>;
