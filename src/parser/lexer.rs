//! Лексер языка Screenit.
//!
//! Один проход слева направо без возврата. Ошибки не выбрасываются:
//! нераспознанный символ или незакрытая строка превращаются в токен
//! [`TokenKind::Unknown`], а решение откладывается до парсера.

use logos::Logos;

use super::token::{Position, Token, TokenKind};

/// Текст диагностики для строки без закрывающей кавычки.
pub const UNTERMINATED_STRING: &str = "Unterminated string.";

/// Внутренние токены для logos.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")] // Пропускаем пробелы
#[logos(skip r"//[^\n]*")] // Комментарий до конца строки
enum RawToken {
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,

    // Многосимвольные операторы выигрывают за счёт самого длинного совпадения
    #[regex(r"==|!=|<=|>=|<|>")]
    Compare,
    #[regex(r"[=!]")]
    Operator,
    #[regex(r"[+\-*/]")]
    Arithmetic,

    // Float только если после точки идёт цифра: `1.` даёт Int и Unknown
    #[regex(r"[0-9]+\.[0-9]+")]
    Float,
    #[regex(r"[0-9]+")]
    Int,

    #[regex(r#""[^"]*""#)]
    String,
    #[regex(r#""[^"]*"#)]
    UnterminatedString,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,
}

/// Классифицировать слово по таблице ключевых слов.
pub fn classify_word(word: &str) -> TokenKind {
    match word {
        "func" | "if" | "else" | "while" | "for" | "screenit" | "return" | "var" | "break" => {
            TokenKind::Keyword
        }
        "true" | "false" => TokenKind::BoolLiteral,
        _ => TokenKind::Identifier,
    }
}

/// Лексер для исходного текста Screenit.
pub struct Lexer<'a> {
    logos: logos::Lexer<'a, RawToken>,
    source: &'a str,
    /// Байтовое смещение, до которого посчитаны строки и колонки.
    cursor: usize,
    position: Position,
}

impl<'a> Lexer<'a> {
    /// Создать новый лексер.
    pub fn new(source: &'a str) -> Self {
        Self {
            logos: RawToken::lexer(source),
            source,
            cursor: 0,
            position: Position::default(),
        }
    }

    /// Просканировать весь вход. Последовательность всегда заканчивается
    /// ровно одним токеном конца файла.
    pub fn scan_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        log::trace!("lexer produced {} tokens", tokens.len());
        tokens
    }

    /// Получить следующий токен. После конца входа всегда возвращает `EndOfFile`.
    pub fn next_token(&mut self) -> Token {
        match self.logos.next() {
            Some(result) => {
                let span = self.logos.span();
                self.advance_to(span.start);
                let start = self.position;
                let slice = self.logos.slice();
                let token = match result {
                    Ok(raw) => Self::convert_token(raw, slice, start),
                    Err(()) => Token::new(TokenKind::Unknown, slice, start),
                };
                self.advance_to(span.end);
                token
            }
            None => {
                self.advance_to(self.source.len());
                Token::new(TokenKind::EndOfFile, "", self.position)
            }
        }
    }

    /// Текущая позиция (строка и колонка после последнего прочитанного токена).
    pub fn position(&self) -> Position {
        self.position
    }

    /// Продвинуть счётчики строк и колонок до байтового смещения `offset`.
    fn advance_to(&mut self, offset: usize) {
        if offset <= self.cursor {
            return;
        }
        for ch in self.source[self.cursor..offset].chars() {
            if ch == '\n' {
                self.position.line += 1;
                self.position.column = 1;
            } else {
                self.position.column += 1;
            }
        }
        self.cursor = offset;
    }

    /// Конвертировать внутренний токен logos в публичный Token.
    fn convert_token(raw: RawToken, slice: &str, position: Position) -> Token {
        let kind = match raw {
            RawToken::LeftParen => TokenKind::LeftParen,
            RawToken::RightParen => TokenKind::RightParen,
            RawToken::LeftBrace => TokenKind::LeftBrace,
            RawToken::RightBrace => TokenKind::RightBrace,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Compare => TokenKind::Compare,
            RawToken::Operator => TokenKind::Operator,
            RawToken::Arithmetic => TokenKind::Arithmetic,
            RawToken::Float => TokenKind::FloatLiteral,
            RawToken::Int => TokenKind::IntLiteral,
            RawToken::String => {
                // Убираем кавычки, escape-последовательностей в языке нет
                let text = &slice[1..slice.len() - 1];
                return Token::new(TokenKind::StringLiteral, text, position);
            }
            RawToken::UnterminatedString => {
                return Token::new(TokenKind::Unknown, UNTERMINATED_STRING, position);
            }
            RawToken::Word => classify_word(slice),
        };
        Token::new(kind, slice, position)
    }
}

/// Разбить исходный текст на токены.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).scan_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lexer_basic() {
        let mut lexer = Lexer::new("var x = 42;");

        assert!(lexer.next_token().is_keyword("var"));
        assert!(lexer.next_token().is(TokenKind::Identifier, "x"));
        assert!(lexer.next_token().is(TokenKind::Operator, "="));
        assert!(lexer.next_token().is(TokenKind::IntLiteral, "42"));
        assert!(lexer.next_token().is(TokenKind::Semicolon, ";"));
        assert!(lexer.next_token().is_eof());
        assert!(lexer.next_token().is_eof());
    }

    #[test]
    fn test_lexer_two_char_operators() {
        let tokens = tokenize("== != <= >= = ! < >");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["==", "!=", "<=", ">=", "=", "!", "<", ">", ""]);
        assert_eq!(tokens[4].kind, TokenKind::Operator);
        assert_eq!(tokens[5].kind, TokenKind::Operator);
        assert_eq!(tokens[6].kind, TokenKind::Compare);
    }

    #[test]
    fn test_lexer_comments() {
        assert_eq!(
            kinds("// comment\n42 // trailing"),
            vec![TokenKind::IntLiteral, TokenKind::EndOfFile]
        );
    }

    #[test]
    fn test_lexer_numbers() {
        let tokens = tokenize("3.14 7 1.");
        assert!(tokens[0].is(TokenKind::FloatLiteral, "3.14"));
        assert!(tokens[1].is(TokenKind::IntLiteral, "7"));
        assert!(tokens[2].is(TokenKind::IntLiteral, "1"));
        assert!(tokens[3].is(TokenKind::Unknown, "."));
    }

    #[test]
    fn test_lexer_string() {
        let tokens = tokenize(r#"screenit "hello world";"#);
        assert!(tokens[1].is(TokenKind::StringLiteral, "hello world"));
    }

    #[test]
    fn test_lexer_unterminated_string() {
        let tokens = tokenize("screenit \"oops");
        assert!(tokens[1].is(TokenKind::Unknown, UNTERMINATED_STRING));
        assert!(tokens[2].is_eof());
    }

    #[test]
    fn test_lexer_keywords_and_bools() {
        assert_eq!(
            kinds("func screenit truex true false _x1"),
            vec![
                TokenKind::Keyword,
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::BoolLiteral,
                TokenKind::BoolLiteral,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_lexer_unknown_character() {
        let tokens = tokenize("a @ b");
        assert!(tokens[1].is(TokenKind::Unknown, "@"));
        assert!(tokens[2].is(TokenKind::Identifier, "b"));
    }

    #[test]
    fn test_lexer_positions() {
        let tokens = tokenize("var x;\n  x = 1;");
        assert_eq!(tokens[0].position, Position::new(1, 1));
        assert_eq!(tokens[1].position, Position::new(1, 5));
        assert_eq!(tokens[3].position, Position::new(2, 3));
        let eof = tokens.last().unwrap();
        assert!(eof.is_eof());
        assert_eq!(eof.position, Position::new(2, 9));
    }
}
