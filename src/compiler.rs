//! Модуль `compiler`
//!
//! Конвейер компиляции Screenit:
//! - Frontend: лексер и парсер (текст → токены → AST)
//! - Middle: генерация IR в SSA-форме с проверкой модуля
//! - Backend: исполнение через LLVM (feature `llvm_backend`)

use std::path::Path;

use log::debug;

use crate::ast::Stmt;
use crate::codegen::{IrGenerator, ENTRY_FUNCTION};
use crate::error::ScreenitResult;
use crate::ir::Module;
use crate::llvm_backend;
use crate::parser::{parse_tokens, tokenize, Token};

/// Настройки компиляции.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Имя модуля IR
    pub module_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            module_name: ENTRY_FUNCTION.to_string(),
        }
    }
}

/// Все промежуточные результаты компиляции.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub statements: Vec<Stmt>,
    pub module: Module,
}

/// Скомпилировать исходный текст до проверенного модуля IR.
pub fn compile_source(source: &str, options: &CompileOptions) -> ScreenitResult<Compilation> {
    let tokens = tokenize(source);
    debug!("lexed {} tokens", tokens.len());

    let statements = parse_tokens(tokens.clone())?;
    let module = IrGenerator::new(&options.module_name).generate(&statements)?;

    Ok(Compilation {
        tokens,
        statements,
        module,
    })
}

/// Прочитать файл целиком и скомпилировать его.
///
/// Содержимое читается как байты; невалидный UTF-8 заменяется символом
/// замены, а не считается ошибкой.
pub fn compile_file(path: &Path, options: &CompileOptions) -> ScreenitResult<Compilation> {
    let bytes = std::fs::read(path)?;
    let source = String::from_utf8_lossy(&bytes);
    debug!("read {} bytes from {}", bytes.len(), path.display());
    compile_source(&source, options)
}

/// Скомпилировать и выполнить программу, вернув код завершения `main`.
pub fn run(source: &str, options: &CompileOptions) -> ScreenitResult<i32> {
    let compilation = compile_source(source, options)?;
    llvm_backend::execute(&compilation.module)
}
