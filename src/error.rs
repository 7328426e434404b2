//! Определения ошибок для Screenit.

use thiserror::Error;

use crate::codegen::GenerationError;
use crate::parser::ParseError;

/// Основной тип `Result` для библиотеки.
pub type ScreenitResult<T> = Result<T, ScreenitError>;

/// Перечисление всех возможных ошибок конвейера.
#[derive(Error, Debug)]
pub enum ScreenitError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Code generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
