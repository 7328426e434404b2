//! Тесты генерации IR через публичный API.

use proptest::prelude::*;
use screenit_lang::codegen::{generate, GenerationError};
use screenit_lang::ir::{verify_module, Instruction, Module, Terminator, Type};
use screenit_lang::parser::parse;

fn lower(source: &str) -> Result<Module, GenerationError> {
    generate(&parse(source).unwrap())
}

fn calls_to(module: &Module, function: &str, callee: &str) -> usize {
    let callee = module.get_function(callee).unwrap();
    module
        .function_by_name(function)
        .unwrap()
        .instructions()
        .filter(|i| matches!(i, Instruction::Call { callee: c, .. } if *c == callee))
        .count()
}

#[test]
fn test_if_else_program() {
    let module = lower("var x = 2; if (x > 1) { screenit x; } else { screenit 0; }").unwrap();
    let main = module.function_by_name("main").unwrap();

    let labels: Vec<&str> = main.blocks.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["entry", "then", "else", "ifcont"]);

    let declarations: Vec<&str> = module
        .functions
        .iter()
        .filter(|f| f.is_declaration())
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(declarations, vec!["print_integer"]);

    for label in ["then", "else"] {
        let block = main.block_by_label(label).unwrap();
        let calls = block
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Call { .. }))
            .count();
        assert_eq!(calls, 1, "block {}", label);
    }
    assert_eq!(calls_to(&module, "main", "print_integer"), 2);

    assert!(matches!(
        main.block_by_label("entry").unwrap().terminator,
        Some(Terminator::CondBranch { .. })
    ));
}

#[test]
fn test_add_function_spills_parameters() {
    let module = lower("func add(a, b) { return a + b; }").unwrap();
    let add = module.function_by_name("add").unwrap();
    assert_eq!(add.param_types(), vec![Type::I32, Type::I32]);
    assert_eq!(add.return_type, Type::I32);

    let text = module.to_string();
    assert!(
        text.contains(
            "define i32 @add(i32 %a, i32 %b) {\n\
             entry:\n\
             \x20 %a1 = alloca i32, align 4\n\
             \x20 %b1 = alloca i32, align 4\n\
             \x20 store i32 %a, ptr %a1, align 4\n\
             \x20 store i32 %b, ptr %b1, align 4\n\
             \x20 %a2 = load i32, ptr %a1, align 4\n\
             \x20 %b2 = load i32, ptr %b1, align 4\n\
             \x20 %addtmp = add i32 %a2, %b2\n\
             \x20 ret i32 %addtmp\n\
             }\n"
        ),
        "{}",
        text
    );
}

#[test]
fn test_for_matches_hand_written_while() {
    let desugared = lower("for (var i = 0; i < 5; i = i + 1) { screenit i; }").unwrap();
    let manual = lower("{ var i = 0; while (i < 5) { screenit i; i = i + 1; } }").unwrap();
    assert_eq!(desugared, manual);
    assert_eq!(desugared.to_string(), manual.to_string());
}

#[test]
fn test_integer_plus_string_is_rejected() {
    let err = lower("screenit 1 + \"x\";").unwrap_err();
    assert!(matches!(err, GenerationError::TypeMismatch { .. }));
    assert!(err.to_string().contains("i32"), "{}", err);
}

#[test]
fn test_mixed_int_and_float_is_rejected() {
    let err = lower("screenit 1 + 2.0;").unwrap_err();
    assert!(matches!(
        err,
        GenerationError::TypeMismatch {
            left: Type::I32,
            right: Type::F64,
            ..
        }
    ));
}

#[test]
fn test_undefined_variable_message() {
    let err = lower("var a = 1;\nscreenit b;").unwrap_err();
    assert_eq!(err.to_string(), "Undefined variable: b at 2:10");
}

#[test]
fn test_assignment_cannot_change_slot_type() {
    let err = lower("var x = 1; x = 2.5;").unwrap_err();
    assert_eq!(err.to_string(), "Type mismatch: i32 = double at 1:12");
    assert!(matches!(
        err,
        GenerationError::TypeMismatch {
            left: Type::I32,
            right: Type::F64,
            ..
        }
    ));

    let err = lower("var b = true; b = 5;").unwrap_err();
    assert!(matches!(
        err,
        GenerationError::TypeMismatch {
            left: Type::I1,
            right: Type::I32,
            ..
        }
    ));
}

#[test]
fn test_stores_match_slot_types() {
    let module = lower("var x = 1; x = x * 2; var f = 0.5; f = 1.5; var s = \"a\"; s = \"b\";").unwrap();
    let text = module.to_string();
    assert!(text.contains("%x = alloca i32, align 4"));
    assert!(text.contains("%f = alloca double, align 8"));
    verify_module(&module).unwrap();
}

/// Запустить `body` в потоке со стеком заданного размера.
fn with_stack(size: usize, body: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .stack_size(size)
        .spawn(body)
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_deep_prefix_chain_generates() {
    with_stack(8 * 1024 * 1024, || {
        let module = lower(&format!("screenit {}1;", "-".repeat(20_000))).unwrap();
        assert_eq!(calls_to(&module, "main", "print_integer"), 1);
    });
}

#[test]
fn test_deep_if_nesting_generates() {
    with_stack(8 * 1024 * 1024, || {
        let module = lower(&format!("{}screenit 1;", "if (true) ".repeat(5_000))).unwrap();
        let main = module.function_by_name("main").unwrap();
        assert_eq!(main.blocks.len(), 1 + 3 * 5_000);
        assert_eq!(calls_to(&module, "main", "print_integer"), 1);
    });
}

#[test]
fn test_string_print_uses_global() {
    let module = lower("screenit \"hi\"; screenit \"hi\";").unwrap();
    assert_eq!(module.globals.len(), 2);
    assert_eq!(calls_to(&module, "main", "print_text"), 2);
    let text = module.to_string();
    assert!(text.contains("@.str = private unnamed_addr constant [3 x i8] c\"hi\\00\", align 1"));
    assert!(text.contains("@.str.1 = "));
}

#[test]
fn test_float_print_uses_real() {
    let module = lower("screenit 1.5 * 2.0;").unwrap();
    assert_eq!(calls_to(&module, "main", "print_real"), 1);
    assert!(module.to_string().contains("fmul double"));
}

#[test]
fn test_demo_programs_generate_valid_modules() {
    for source in [
        include_str!("../demos/fib.sit"),
        include_str!("../demos/scopes.sit"),
        include_str!("../demos/values.sit"),
    ] {
        let module = lower(source).unwrap();
        verify_module(&module).unwrap();
        assert!(module.function_by_name("main").is_some());
    }
}

#[test]
fn test_generation_is_deterministic() {
    let source = include_str!("../demos/fib.sit");
    assert_eq!(lower(source).unwrap().to_string(), lower(source).unwrap().to_string());
}

// === Свойства ===

fn arithmetic() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..10_000).prop_map(|n| n.to_string()),
        Just("v".to_string()),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), prop_oneof![Just("+"), Just("-"), Just("*"), Just("/")], inner.clone())
                .prop_map(|(l, op, r)| format!("{} {} {}", l, op, r)),
            inner.clone().prop_map(|e| format!("({})", e)),
            inner.prop_map(|e| format!("-{}", e)),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_arithmetic_programs_generate(expr in arithmetic()) {
        let source = format!("var v = 3; screenit {}; v = {}; if (v > {}) {{ screenit v; }}", expr, expr, expr);
        let module = lower(&source).unwrap();
        prop_assert!(verify_module(&module).is_ok());
        prop_assert_eq!(calls_to(&module, "main", "print_integer"), 2);
    }

    #[test]
    fn prop_functions_of_arithmetic_generate(expr in arithmetic(), arg in 0i32..100) {
        let source = format!("func f(v) {{ return {}; }} screenit f({});", expr, arg);
        let module = lower(&source).unwrap();
        let f = module.function_by_name("f").unwrap();
        prop_assert_eq!(f.params.len(), 1);
        prop_assert!(f.blocks.iter().all(|b| b.terminator.is_some()));
    }
}
