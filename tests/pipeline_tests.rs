//! Тесты конвейера целиком: файлы, ошибки, исполнение.

use std::io::Write;

use screenit_lang::compiler::{compile_file, compile_source, CompileOptions};
use screenit_lang::error::ScreenitError;
use screenit_lang::llvm_backend;

#[test]
fn test_compile_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "func twice(n) {{ return n * 2; }}").unwrap();
    writeln!(file, "screenit twice(21);").unwrap();

    let compilation = compile_file(file.path(), &CompileOptions::default()).unwrap();
    assert_eq!(compilation.statements.len(), 2);
    assert!(compilation.module.function_by_name("twice").is_some());
}

#[test]
fn test_compile_file_tolerates_invalid_utf8() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"screenit \"caf\xff\";").unwrap();

    let compilation = compile_file(file.path(), &CompileOptions::default()).unwrap();
    assert_eq!(compilation.module.globals.len(), 1);
    assert_eq!(
        compilation.module.globals[0].bytes,
        "caf\u{FFFD}".as_bytes().to_vec()
    );
}

#[test]
fn test_compile_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile_file(&dir.path().join("absent.sit"), &CompileOptions::default())
        .unwrap_err();
    assert!(matches!(err, ScreenitError::Io(_)));
}

#[test]
fn test_stage_errors_are_distinguished() {
    let options = CompileOptions::default();

    let err = compile_source("var x = ;", &options).unwrap_err();
    assert!(matches!(err, ScreenitError::Parse(_)));
    assert!(err.to_string().starts_with("Parse error at line 1, column 9"), "{}", err);

    let err = compile_source("screenit missing(1);", &options).unwrap_err();
    assert!(matches!(err, ScreenitError::Generation(_)));
    assert!(err.to_string().starts_with("Code generation error: "), "{}", err);
}

#[test]
fn test_compilation_keeps_all_stages() {
    let source = "var x = 2; if (x > 1) { screenit x; } else { screenit 0; }";
    let compilation = compile_source(source, &CompileOptions::default()).unwrap();
    assert_eq!(compilation.tokens.len(), 23);
    assert_eq!(compilation.statements.len(), 2);
    assert_eq!(compilation.module.name, "main");
}

#[test]
fn test_ir_text_is_llvm_assembly() {
    let compilation =
        compile_source(include_str!("../demos/values.sit"), &CompileOptions::default()).unwrap();
    let text = compilation.module.to_string();
    assert!(text.starts_with("; ModuleID = 'main'\nsource_filename = \"main\"\n"));
    assert!(text.contains("declare void @print_text(ptr)"));
    assert!(text.contains("declare void @print_integer(i32)"));
    assert!(text.contains("declare void @print_real(double)"));
    assert!(text.contains("define i32 @main() {"));
}

#[test]
fn test_statements_serialize_to_json() {
    let compilation =
        compile_source(include_str!("../demos/scopes.sit"), &CompileOptions::default()).unwrap();
    let json = serde_json::to_string_pretty(&compilation.statements).unwrap();
    assert!(json.contains("\"square\""));
}

#[cfg(not(feature = "llvm_backend"))]
#[test]
fn test_execution_requires_llvm() {
    assert!(!llvm_backend::is_available());
    let err = screenit_lang::run("screenit 1;", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, ScreenitError::Execution(_)));
}

#[cfg(feature = "llvm_backend")]
#[test]
fn test_demo_programs_execute() {
    assert!(llvm_backend::is_available());
    for source in [
        include_str!("../demos/fib.sit"),
        include_str!("../demos/scopes.sit"),
        include_str!("../demos/values.sit"),
    ] {
        assert_eq!(screenit_lang::run(source, &CompileOptions::default()).unwrap(), 0);
    }
}
