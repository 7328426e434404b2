//! Фронтенд языка Screenit: лексер и парсер.
//!
//! # Синтаксис
//!
//! ```text
//! // Переменные
//! var x = 42;
//! x = x + 1;
//!
//! // Вывод
//! screenit "hello";
//! screenit x;
//!
//! // Условия и циклы
//! if (x > 1) { screenit x; } else { screenit 0; }
//! while (x > 0) { x = x - 1; }
//! for (var i = 0; i < 10; i = i + 1) { screenit i; }
//!
//! // Функции
//! func add(a, b) { return a + b; }
//! screenit add(1, 2);
//! ```
//!
//! # Пример
//!
//! ```rust
//! use screenit_lang::parser::parse;
//!
//! let program = parse("var x = 1; screenit x;").unwrap();
//! assert_eq!(program.len(), 2);
//! ```

pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use error::ParseError;
pub use lexer::{tokenize, Lexer};
pub use parser::Parser;
pub use token::{Position, Token, TokenKind};

use crate::ast::Stmt;

/// Разобрать исходный текст в последовательность инструкций верхнего уровня.
pub fn parse(source: &str) -> Result<Vec<Stmt>, ParseError> {
    parse_tokens(tokenize(source))
}

/// Разобрать уже полученную последовательность токенов.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Vec<Stmt>, ParseError> {
    let statements = Parser::new(tokens).parse()?;
    log::debug!("parsed {} top-level statements", statements.len());
    Ok(statements)
}
