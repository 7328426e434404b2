//! Токены и позиции исходного кода.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Позиция в исходном коде. Строки и колонки считаются с 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Создать новую позицию.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Позиция синтетических токенов, которых нет в исходнике.
    pub fn synthetic() -> Self {
        Self { line: 0, column: 0 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Вид токена.
///
/// Порядок вариантов фиксирован: порядковый номер выводится в отладочной
/// форме токена.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Ключевое слово (`func`, `if`, `screenit`, ...)
    Keyword,
    /// Целый литерал
    IntLiteral,
    /// Литерал с плавающей точкой
    FloatLiteral,
    /// Строковый литерал (текст без кавычек)
    StringLiteral,
    /// `true` / `false`
    BoolLiteral,
    /// Идентификатор
    Identifier,
    /// `=` и `!`
    Operator,
    /// `+ - * /`
    Arithmetic,
    /// `< > <= >= == !=`
    Compare,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// Нераспознанный символ или незакрытая строка
    Unknown,
    /// Конец файла
    EndOfFile,
}

impl TokenKind {
    /// Порядковый номер вида токена.
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

/// Токен: вид, текст и позиция начала.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    /// Создать новый токен.
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Создать токен, которого нет в исходнике (например, `true` в рассахаренном `for`).
    pub fn synthetic(kind: TokenKind, text: impl Into<String>) -> Self {
        Self::new(kind, text, Position::synthetic())
    }

    /// Проверить вид и текст токена.
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    /// Проверить, является ли токен ключевым словом `keyword`.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.is(TokenKind::Keyword, keyword)
    }

    /// Проверить, является ли токен концом файла.
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EndOfFile
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({}, \"{}\", {}, {})",
            self.kind.ordinal(),
            self.text,
            self.position.line,
            self.position.column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_form() {
        let token = Token::new(TokenKind::Identifier, "x", Position::new(3, 7));
        assert_eq!(token.to_string(), "Token(5, \"x\", 3, 7)");
    }

    #[test]
    fn test_kind_ordinals() {
        assert_eq!(TokenKind::Keyword.ordinal(), 0);
        assert_eq!(TokenKind::Compare.ordinal(), 8);
        assert_eq!(TokenKind::EndOfFile.ordinal(), 16);
    }

    #[test]
    fn test_token_predicates() {
        let token = Token::new(TokenKind::Keyword, "var", Position::default());
        assert!(token.is_keyword("var"));
        assert!(!token.is_keyword("func"));
        assert!(!token.is_eof());
    }
}
