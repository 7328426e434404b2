//! # Screenit
//!
//! Компилятор небольшого императивного языка Screenit: переменные,
//! арифметика и сравнения, условия, циклы, функции и встроенная печать
//! `screenit`.
//!
//! ## Основные модули
//!
//! - [`parser`] - Лексер и парсер (рекурсивный спуск)
//! - [`ast`] - Узлы AST, посетители и отладочные строки
//! - [`codegen`] - Генерация IR в SSA-форме
//! - [`ir`] - Модель IR, построитель, печать и проверка
//! - [`runtime`] - Функции печати для сгенерированного кода
//! - [`compiler`] - Конвейер целиком
//! - [`llvm_backend`] - Исполнение через LLVM (требует feature `llvm_backend`)
//!
//! ## Features
//!
//! - `llvm_backend` - Включает JIT-исполнение и объектные файлы через LLVM
//!
//! ## Пример
//!
//! ```rust
//! use screenit_lang::{compile_source, CompileOptions};
//!
//! let source = "func add(a, b) { return a + b; } screenit add(1, 2);";
//! let compilation = compile_source(source, &CompileOptions::default()).unwrap();
//!
//! let ir = compilation.module.to_string();
//! assert!(ir.contains("define i32 @add(i32 %a, i32 %b)"));
//! ```

// === Фронтенд ===
pub mod ast;
pub mod parser;

// === Генерация и IR ===
pub mod codegen;
pub mod ir;

// === Бэкенд и runtime ===
pub mod llvm_backend;
pub mod runtime;

// === Конвейер ===
pub mod compiler;
pub mod error;

// === Re-exports для удобства ===
pub use ast::{Expr, ExprVisitor, Stmt, StmtVisitor};
pub use codegen::{generate, GenerationError, IrGenerator};
pub use compiler::{compile_file, compile_source, run, CompileOptions, Compilation};
pub use error::{ScreenitError, ScreenitResult};
pub use parser::{parse, tokenize, ParseError, Token, TokenKind};
