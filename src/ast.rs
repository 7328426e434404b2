//! Абстрактное синтаксическое дерево (AST) языка Screenit.
//!
//! Два замкнутых семейства узлов: выражения [`Expr`] и инструкции [`Stmt`].
//! Каждый узел единолично владеет дочерними узлами; токены внутри узлов
//! хранятся по значению.
//!
//! Обход выполняется через [`ExprVisitor`] / [`StmtVisitor`]: метод `accept`
//! сопоставляет вариант и вызывает нужный метод посетителя, так что проходу
//! не нужно знать конкретный вариант заранее.
//!
//! `Display` каждого узла даёт детерминированную отладочную строку вида
//! `VariantName(field1, field2, ...)`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parser::token::{Position, Token, TokenKind};

// === Выражения ===

/// Бинарное выражение (`1 + 2`, `x < y`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub op: Token,
    pub right: Box<Expr>,
}

/// Унарное выражение (`-x`, `!flag`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: Token,
    pub right: Box<Expr>,
}

/// Литерал: целое, float, строка или bool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralExpr {
    pub value: Token,
}

/// Чтение переменной.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableExpr {
    pub name: Token,
}

/// Присваивание переменной (`x = 5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignExpr {
    pub name: Token,
    pub value: Box<Expr>,
}

/// Вызов функции по имени (`add(1, 2)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: Token,
    pub arguments: Vec<Expr>,
}

/// Выражение в скобках.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingExpr {
    pub expression: Box<Expr>,
}

/// Выражение.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Literal(LiteralExpr),
    Variable(VariableExpr),
    Assign(AssignExpr),
    Call(CallExpr),
    Grouping(GroupingExpr),
}

impl Expr {
    pub fn binary(left: Expr, op: Token, right: Expr) -> Self {
        Expr::Binary(BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn unary(op: Token, right: Expr) -> Self {
        Expr::Unary(UnaryExpr {
            op,
            right: Box::new(right),
        })
    }

    pub fn literal(value: Token) -> Self {
        Expr::Literal(LiteralExpr { value })
    }

    pub fn variable(name: Token) -> Self {
        Expr::Variable(VariableExpr { name })
    }

    pub fn assign(name: Token, value: Expr) -> Self {
        Expr::Assign(AssignExpr {
            name,
            value: Box::new(value),
        })
    }

    pub fn call(callee: Token, arguments: Vec<Expr>) -> Self {
        Expr::Call(CallExpr { callee, arguments })
    }

    pub fn grouping(expression: Expr) -> Self {
        Expr::Grouping(GroupingExpr {
            expression: Box::new(expression),
        })
    }

    /// Позиция самого левого токена выражения.
    pub fn position(&self) -> Position {
        let mut current = self;
        loop {
            current = match current {
                Expr::Binary(expr) => &expr.left,
                Expr::Grouping(expr) => &expr.expression,
                Expr::Unary(expr) => return expr.op.position,
                Expr::Literal(expr) => return expr.value.position,
                Expr::Variable(expr) => return expr.name.position,
                Expr::Assign(expr) => return expr.name.position,
                Expr::Call(expr) => return expr.callee.position,
            };
        }
    }

    /// Двойная диспетчеризация: вызвать метод посетителя для этого варианта.
    pub fn accept<V: ExprVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            Expr::Binary(expr) => visitor.visit_binary(expr),
            Expr::Unary(expr) => visitor.visit_unary(expr),
            Expr::Literal(expr) => visitor.visit_literal(expr),
            Expr::Variable(expr) => visitor.visit_variable(expr),
            Expr::Assign(expr) => visitor.visit_assign(expr),
            Expr::Call(expr) => visitor.visit_call(expr),
            Expr::Grouping(expr) => visitor.visit_grouping(expr),
        }
    }
}

/// Посетитель выражений.
pub trait ExprVisitor {
    type Output;

    fn visit_binary(&mut self, expr: &BinaryExpr) -> Self::Output;
    fn visit_unary(&mut self, expr: &UnaryExpr) -> Self::Output;
    fn visit_literal(&mut self, expr: &LiteralExpr) -> Self::Output;
    fn visit_variable(&mut self, expr: &VariableExpr) -> Self::Output;
    fn visit_assign(&mut self, expr: &AssignExpr) -> Self::Output;
    fn visit_call(&mut self, expr: &CallExpr) -> Self::Output;
    fn visit_grouping(&mut self, expr: &GroupingExpr) -> Self::Output;
}

// === Инструкции ===

/// Выражение, вычисляемое ради побочного эффекта (`f(x);`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStmt {
    pub expression: Expr,
}

/// `screenit expr;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintStmt {
    pub expression: Expr,
}

/// `var name = initializer;` (инициализатор необязателен).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarStmt {
    pub name: Token,
    pub initializer: Option<Expr>,
}

/// `{ ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStmt {
    pub statements: Vec<Stmt>,
}

/// `if (condition) then else otherwise`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

/// `while (condition) body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
}

/// `for (initializer; condition; increment) body`
///
/// Парсер сразу рассахаривает `for` через [`ForStmt::desugar`], поэтому
/// в дереве из парсера этот узел не встречается.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub initializer: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub increment: Option<Expr>,
    pub body: Box<Stmt>,
}

/// `func name(params) { body }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionStmt {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

/// `return value;` (значение необязательно).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub keyword: Token,
    pub value: Option<Expr>,
}

/// `break;`. Разбирается, но не генерирует кода.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakStmt {
    pub keyword: Token,
}

/// Инструкция.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expression(ExpressionStmt),
    Print(PrintStmt),
    Var(VarStmt),
    Block(BlockStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Function(FunctionStmt),
    Return(ReturnStmt),
    Break(BreakStmt),
}

impl Stmt {
    pub fn expression(expression: Expr) -> Self {
        Stmt::Expression(ExpressionStmt { expression })
    }

    pub fn print(expression: Expr) -> Self {
        Stmt::Print(PrintStmt { expression })
    }

    pub fn var(name: Token, initializer: Option<Expr>) -> Self {
        Stmt::Var(VarStmt { name, initializer })
    }

    pub fn block(statements: Vec<Stmt>) -> Self {
        Stmt::Block(BlockStmt { statements })
    }

    pub fn if_else(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Stmt::If(IfStmt {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn while_loop(condition: Expr, body: Stmt) -> Self {
        Stmt::While(WhileStmt {
            condition,
            body: Box::new(body),
        })
    }

    /// Двойная диспетчеризация: вызвать метод посетителя для этого варианта.
    pub fn accept<V: StmtVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            Stmt::Expression(stmt) => visitor.visit_expression(stmt),
            Stmt::Print(stmt) => visitor.visit_print(stmt),
            Stmt::Var(stmt) => visitor.visit_var(stmt),
            Stmt::Block(stmt) => visitor.visit_block(stmt),
            Stmt::If(stmt) => visitor.visit_if(stmt),
            Stmt::While(stmt) => visitor.visit_while(stmt),
            Stmt::For(stmt) => visitor.visit_for(stmt),
            Stmt::Function(stmt) => visitor.visit_function(stmt),
            Stmt::Return(stmt) => visitor.visit_return(stmt),
            Stmt::Break(stmt) => visitor.visit_break(stmt),
        }
    }
}

/// Посетитель инструкций.
pub trait StmtVisitor {
    type Output;

    fn visit_expression(&mut self, stmt: &ExpressionStmt) -> Self::Output;
    fn visit_print(&mut self, stmt: &PrintStmt) -> Self::Output;
    fn visit_var(&mut self, stmt: &VarStmt) -> Self::Output;
    fn visit_block(&mut self, stmt: &BlockStmt) -> Self::Output;
    fn visit_if(&mut self, stmt: &IfStmt) -> Self::Output;
    fn visit_while(&mut self, stmt: &WhileStmt) -> Self::Output;
    fn visit_for(&mut self, stmt: &ForStmt) -> Self::Output;
    fn visit_function(&mut self, stmt: &FunctionStmt) -> Self::Output;
    fn visit_return(&mut self, stmt: &ReturnStmt) -> Self::Output;
    fn visit_break(&mut self, stmt: &BreakStmt) -> Self::Output;
}

impl ForStmt {
    /// Рассахарить `for` во вложенные `Block`/`While`:
    ///
    /// ```text
    /// { initializer; while (condition | true) { body; increment; } }
    /// ```
    ///
    /// Блок с инкрементом появляется только при наличии инкремента, внешний
    /// блок только при наличии инициализатора.
    pub fn desugar(self) -> Stmt {
        let mut body = *self.body;

        if let Some(increment) = self.increment {
            body = Stmt::block(vec![body, Stmt::expression(increment)]);
        }

        let condition = self.condition.unwrap_or_else(|| {
            Expr::literal(Token::synthetic(TokenKind::BoolLiteral, "true"))
        });
        body = Stmt::while_loop(condition, body);

        if let Some(initializer) = self.initializer {
            body = Stmt::block(vec![*initializer, body]);
        }

        body
    }
}

// === Отладочные строки ===

/// Записать элементы через запятую в квадратных скобках.
fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

/// Записать необязательный узел или `null`.
fn write_optional<T: fmt::Display>(f: &mut fmt::Formatter<'_>, item: Option<&T>) -> fmt::Result {
    match item {
        Some(item) => write!(f, "{}", item),
        None => write!(f, "null"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary(e) => write!(f, "BinaryExpr({}, {}, {})", e.left, e.op.text, e.right),
            Expr::Unary(e) => write!(f, "UnaryExpr({}, {})", e.op.text, e.right),
            Expr::Literal(e) => write!(f, "LiteralExpr({})", e.value.text),
            Expr::Variable(e) => write!(f, "VariableExpr({})", e.name.text),
            Expr::Assign(e) => write!(f, "AssignExpr({}, {})", e.name.text, e.value),
            Expr::Call(e) => {
                write!(f, "CallExpr({}, ", e.callee.text)?;
                write_list(f, &e.arguments)?;
                write!(f, ")")
            }
            Expr::Grouping(e) => write!(f, "GroupingExpr({})", e.expression),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expression(s) => write!(f, "ExprStmt({})", s.expression),
            Stmt::Print(s) => write!(f, "PrintStmt({})", s.expression),
            Stmt::Var(s) => {
                write!(f, "VarStmt({}, ", s.name.text)?;
                write_optional(f, s.initializer.as_ref())?;
                write!(f, ")")
            }
            Stmt::Block(s) => {
                write!(f, "BlockStmt(")?;
                write_list(f, &s.statements)?;
                write!(f, ")")
            }
            Stmt::If(s) => {
                write!(f, "IfStmt({}, {}, ", s.condition, s.then_branch)?;
                write_optional(f, s.else_branch.as_deref())?;
                write!(f, ")")
            }
            Stmt::While(s) => write!(f, "WhileStmt({}, {})", s.condition, s.body),
            Stmt::For(s) => {
                write!(f, "ForStmt(")?;
                write_optional(f, s.initializer.as_deref())?;
                write!(f, ", ")?;
                write_optional(f, s.condition.as_ref())?;
                write!(f, ", ")?;
                write_optional(f, s.increment.as_ref())?;
                write!(f, ", {})", s.body)
            }
            Stmt::Function(s) => {
                let params: Vec<&str> = s.params.iter().map(|p| p.text.as_str()).collect();
                write!(f, "FunctionStmt({}, ", s.name.text)?;
                write_list(f, &params)?;
                write!(f, ", ")?;
                write_list(f, &s.body)?;
                write!(f, ")")
            }
            Stmt::Return(s) => {
                write!(f, "ReturnStmt({}, ", s.keyword.text)?;
                write_optional(f, s.value.as_ref())?;
                write!(f, ")")
            }
            Stmt::Break(s) => write!(f, "BreakStmt({})", s.keyword.text),
        }
    }
}

/// Отладочный дамп программы: по одной инструкции верхнего уровня на строку.
pub fn dump(statements: &[Stmt]) -> String {
    statements
        .iter()
        .map(|stmt| stmt.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
