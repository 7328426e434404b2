//! Модуль `llvm_backend`
//!
//! Исполнение модуля IR через LLVM (inkwell): текстовая форма модуля
//! разбирается LLVM, проверяется и запускается JIT-движком. Функции печати
//! из [`crate::runtime`] отображаются на объявления модуля напрямую.
//!
//! Включается feature-флагом `llvm_backend`. Без него доступна заглушка,
//! которая возвращает ошибку исполнения.

use std::path::Path;

use crate::error::{ScreenitError, ScreenitResult};
use crate::ir;

// === Реализация с inkwell (когда feature включен) ===

#[cfg(feature = "llvm_backend")]
use inkwell::context::Context;
#[cfg(feature = "llvm_backend")]
use inkwell::memory_buffer::MemoryBuffer;
#[cfg(feature = "llvm_backend")]
use inkwell::module::Module;
#[cfg(feature = "llvm_backend")]
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
#[cfg(feature = "llvm_backend")]
use inkwell::OptimizationLevel;

#[cfg(feature = "llvm_backend")]
use crate::codegen::ENTRY_FUNCTION;
#[cfg(feature = "llvm_backend")]
use crate::runtime;

/// Сигнатура точки входа программы.
#[cfg(feature = "llvm_backend")]
type EntryFn = unsafe extern "C" fn() -> i32;

/// LLVM Backend для исполнения модуля IR.
#[cfg(feature = "llvm_backend")]
pub struct LLVMBackend<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
}

#[cfg(feature = "llvm_backend")]
impl<'ctx> LLVMBackend<'ctx> {
    /// Загрузить модуль IR в LLVM и проверить его.
    pub fn new(context: &'ctx Context, module: &ir::Module) -> ScreenitResult<Self> {
        let text = module.to_string();
        let buffer = MemoryBuffer::create_from_memory_range_copy(text.as_bytes(), &module.name);
        let module = context
            .create_module_from_ir(buffer)
            .map_err(|e| ScreenitError::Execution(format!("LLVM rejected module: {}", e)))?;
        module
            .verify()
            .map_err(|e| ScreenitError::Execution(format!("LLVM verification failed: {}", e)))?;

        Ok(Self { context, module })
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    /// Текстовое представление модуля, как его видит LLVM.
    pub fn get_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// Выполнить `main` через JIT и вернуть код завершения.
    pub fn run_main(&self) -> ScreenitResult<i32> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(ScreenitError::Execution)?;

        let engine = self
            .module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|e| ScreenitError::Execution(e.to_string()))?;

        for (name, address) in runtime::symbols() {
            if let Some(function) = self.module.get_function(name) {
                engine.add_global_mapping(&function, address);
            }
        }

        let main = unsafe { engine.get_function::<EntryFn>(ENTRY_FUNCTION) }
            .map_err(|e| ScreenitError::Execution(format!("{:?}", e)))?;

        log::debug!("running '{}' through JIT", ENTRY_FUNCTION);
        Ok(unsafe { main.call() })
    }

    /// Скомпилировать модуль в объектный файл для текущей платформы.
    pub fn compile_to_object(&self, output_path: &Path) -> ScreenitResult<()> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(ScreenitError::Execution)?;

        let target_triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&target_triple)
            .map_err(|e| ScreenitError::Execution(e.to_string()))?;

        let target_machine = target
            .create_target_machine(
                &target_triple,
                "generic",
                "",
                OptimizationLevel::Default,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or(ScreenitError::Execution(
                "Failed to create target machine".to_string(),
            ))?;

        target_machine
            .write_to_file(&self.module, FileType::Object, output_path)
            .map_err(|e| ScreenitError::Execution(e.to_string()))?;

        Ok(())
    }
}

/// Выполнить модуль через JIT.
#[cfg(feature = "llvm_backend")]
pub fn execute(module: &ir::Module) -> ScreenitResult<i32> {
    let context = Context::create();
    LLVMBackend::new(&context, module)?.run_main()
}

/// Записать модуль в объектный файл.
#[cfg(feature = "llvm_backend")]
pub fn write_object(module: &ir::Module, output_path: &Path) -> ScreenitResult<()> {
    let context = Context::create();
    LLVMBackend::new(&context, module)?.compile_to_object(output_path)
}

// === Заглушка для сборки без LLVM ===

#[cfg(not(feature = "llvm_backend"))]
const UNAVAILABLE: &str = "LLVM support not compiled in. Enable feature 'llvm_backend'";

/// Выполнить модуль через JIT (заглушка).
#[cfg(not(feature = "llvm_backend"))]
pub fn execute(module: &ir::Module) -> ScreenitResult<i32> {
    log::warn!("cannot execute module '{}': {}", module.name, UNAVAILABLE);
    Err(ScreenitError::Execution(UNAVAILABLE.to_string()))
}

/// Записать модуль в объектный файл (заглушка).
#[cfg(not(feature = "llvm_backend"))]
pub fn write_object(module: &ir::Module, output_path: &Path) -> ScreenitResult<()> {
    log::warn!(
        "cannot write '{}' for module '{}': {}",
        output_path.display(),
        module.name,
        UNAVAILABLE
    );
    Err(ScreenitError::Execution(UNAVAILABLE.to_string()))
}

/// Доступно ли исполнение через LLVM в этой сборке.
pub fn is_available() -> bool {
    cfg!(feature = "llvm_backend")
}

// === Тесты ===
