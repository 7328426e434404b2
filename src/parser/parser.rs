//! Рекурсивный спуск по последовательности токенов Screenit.
//!
//! Грамматика выражений, от низшего приоритета к высшему:
//!
//! ```text
//! assignment → comparison → term → factor → unary → call → primary
//! ```
//!
//! `term` и `factor` крутятся на одном и том же классе арифметических
//! токенов, поэтому `+ -` и `* /` имеют одинаковый приоритет и
//! группируются слева направо: `1 + 2 * 3` читается как `(1 + 2) * 3`.

use log::{trace, warn};

use super::error::ParseError;
use super::token::{Token, TokenKind};
use crate::ast::{Expr, ForStmt, FunctionStmt, ReturnStmt, BreakStmt, Stmt};

/// Предел числа аргументов вызова и параметров функции.
pub const MAX_ARGUMENTS: usize = 255;

/// Красная зона и шаг роста стека для глубоко вложенных выражений.
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_GROW: usize = 8 * 1024 * 1024;

type ParseResult<T> = Result<T, ParseError>;

/// Парсер Screenit.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// Создать парсер над последовательностью токенов.
    ///
    /// Если последовательность не заканчивается концом файла, он добавляется.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EndOfFile, "", position));
        }
        Self { tokens, current: 0 }
    }

    /// Разобрать программу в последовательность инструкций верхнего уровня.
    ///
    /// Нераспознанные и пустые токены на верхнем уровне пропускаются. Ошибка
    /// разбора прерывает весь разбор, кроме случая, когда курсор уже дошёл до
    /// конца файла: тогда ошибка проглатывается и возвращается уже
    /// разобранное.
    pub fn parse(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            let token = self.peek();
            if token.kind == TokenKind::Unknown || token.text.is_empty() {
                warn!("skipping stray token {}", token);
                self.advance();
                continue;
            }

            match self.declaration() {
                Ok(stmt) => {
                    trace!("parsed {}", stmt);
                    statements.push(stmt);
                }
                Err(err) if self.is_at_end() => {
                    warn!("ignoring error at end of input: {}", err);
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(statements)
    }

    // === Объявления ===

    fn declaration(&mut self) -> ParseResult<Stmt> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || {
            if self.match_keyword("func") {
                return self.function();
            }
            if self.match_keyword("var") {
                return self.var_declaration();
            }
            self.statement()
        })
    }

    fn function(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected function name.")?;
        self.consume(TokenKind::LeftParen, "Expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    return Err(self.error_at_current("Cannot have more than 255 parameters."));
                }
                params.push(self.consume(TokenKind::Identifier, "Expected parameter name.")?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after parameters.")?;

        self.consume(TokenKind::LeftBrace, "Expected '{' before function body.")?;
        let body = self.block_body("Expected '}' after function body.")?;

        Ok(Stmt::Function(FunctionStmt { name, params, body }))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected variable name.")?;

        let initializer = if self.match_token(TokenKind::Operator, "=") {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expected ';' after variable declaration.")?;
        Ok(Stmt::var(name, initializer))
    }

    // === Инструкции ===

    fn statement(&mut self) -> ParseResult<Stmt> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || {
            if self.match_kind(TokenKind::LeftBrace) {
                let statements = self.block_body("Expected '}' after block.")?;
                return Ok(Stmt::block(statements));
            }

            if self.check(TokenKind::Keyword) {
                let keyword = self.advance().clone();
                return match keyword.text.as_str() {
                    "if" => self.if_statement(),
                    "while" => self.while_statement(),
                    "for" => self.for_statement(),
                    "screenit" => self.print_statement(),
                    "return" => self.return_statement(keyword),
                    "break" => self.break_statement(keyword),
                    other => Err(ParseError::at(
                        &keyword,
                        format!("Unexpected keyword: {}", other),
                    )),
                };
            }

            self.expression_statement()
        })
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after if condition.")?;

        let then_branch = self.statement()?;
        let else_branch = if self.match_keyword("else") {
            Some(self.statement()?)
        } else {
            None
        };

        Ok(Stmt::if_else(condition, then_branch, else_branch))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after condition.")?;
        let body = self.statement()?;

        Ok(Stmt::while_loop(condition, body))
    }

    /// `for` сразу рассахаривается в `Block`/`While`.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'for'.")?;

        let initializer = if self.match_kind(TokenKind::Semicolon) {
            None
        } else if self.match_keyword("var") {
            Some(Box::new(self.var_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after loop condition.")?;

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RightParen, "Expected ')' after for clauses.")?;

        let body = Box::new(self.statement()?);

        Ok(ForStmt {
            initializer,
            condition,
            increment,
            body,
        }
        .desugar())
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after screenit value.")?;
        Ok(Stmt::print(value))
    }

    fn return_statement(&mut self, keyword: Token) -> ParseResult<Stmt> {
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after return value.")?;
        Ok(Stmt::Return(ReturnStmt { keyword, value }))
    }

    fn break_statement(&mut self, keyword: Token) -> ParseResult<Stmt> {
        self.consume(TokenKind::Semicolon, "Expected ';' after break.")?;
        Ok(Stmt::Break(BreakStmt { keyword }))
    }

    /// Инструкции до закрывающей `}` (открывающая уже поглощена).
    fn block_body(&mut self, missing_brace: &str) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, missing_brace)?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after expression.")?;
        Ok(Stmt::expression(expr))
    }

    // === Выражения ===

    fn expression(&mut self) -> ParseResult<Expr> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || self.assignment())
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.comparison()?;

        if self.match_token(TokenKind::Operator, "=") {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable(variable) => Ok(Expr::assign(variable.name, value)),
                _ => Err(ParseError::at(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        while self.match_kind(TokenKind::Compare) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = Expr::binary(expr, op, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        while self.match_kind(TokenKind::Arithmetic) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::binary(expr, op, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;
        while self.match_kind(TokenKind::Arithmetic) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::binary(expr, op, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || {
            if self.match_token(TokenKind::Arithmetic, "-")
                || self.match_token(TokenKind::Operator, "!")
            {
                let op = self.previous().clone();
                let right = self.unary()?;
                return Ok(Expr::unary(op, right));
            }
            self.call()
        })
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        while self.match_kind(TokenKind::LeftParen) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let callee = match callee {
            Expr::Variable(variable) => variable.name,
            _ => {
                return Err(ParseError::at(
                    self.previous(),
                    "Expected function name for call expression.",
                ))
            }
        };

        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    return Err(self.error_at_current("Cannot have more than 255 arguments."));
                }
                arguments.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after arguments.")?;

        Ok(Expr::call(callee, arguments))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.peek().kind {
            TokenKind::BoolLiteral
            | TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral => Ok(Expr::literal(self.advance().clone())),
            TokenKind::Identifier => Ok(Expr::variable(self.advance().clone())),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "Expected ')' after expression.")?;
                Ok(Expr::grouping(expr))
            }
            _ => Err(self.error_at_current("Expected expression.")),
        }
    }

    // === Курсор ===

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn match_token(&mut self, kind: TokenKind, text: &str) -> bool {
        if self.peek().is(kind, text) {
            self.advance();
            return true;
        }
        false
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        self.match_token(TokenKind::Keyword, keyword)
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error_at_current(message))
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        ParseError::at(self.peek(), message)
    }
}
