//! Ошибки парсера.

use super::token::{Position, Token};
use thiserror::Error;

/// Ошибка разбора.
///
/// Вид ошибки один: любое нарушение грамматики фатально для текущего
/// разбора и несёт сообщение и место, где оно обнаружено.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error at line {}, column {} near '{found}': {message}", .position.line, .position.column)]
pub struct ParseError {
    pub message: String,
    pub position: Position,
    /// Текст токена, на котором остановился разбор.
    pub found: String,
}

impl ParseError {
    /// Создать ошибку, привязанную к токену.
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: token.position,
            found: if token.is_eof() {
                "end of file".to_string()
            } else {
                token.text.clone()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::token::TokenKind;

    #[test]
    fn test_error_message() {
        let token = Token::new(TokenKind::Identifier, "y", Position::new(2, 4));
        let error = ParseError::at(&token, "Expected ';' after expression.");
        assert_eq!(
            error.to_string(),
            "Parse error at line 2, column 4 near 'y': Expected ';' after expression."
        );
    }

    #[test]
    fn test_error_at_eof() {
        let token = Token::new(TokenKind::EndOfFile, "", Position::new(1, 9));
        let error = ParseError::at(&token, "Expected expression.");
        assert_eq!(error.found, "end of file");
    }
}
