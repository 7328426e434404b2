//! Генератор IR: обход AST и построение модуля в SSA-форме.
//!
//! Генератор реализует [`ExprVisitor`] и [`StmtVisitor`] и держит весь
//! контекст генерации явно: построитель с точкой вставки и стек областей
//! видимости. Тело функции генерируется внутри [`IrGenerator::with_function`],
//! которая сохраняет и восстанавливает точку вставки и область, так что
//! вложенное определение функции не портит окружающий контекст.
//!
//! Программа верхнего уровня становится функцией `main() -> i32`, которая
//! выполняет инструкции по порядку и возвращает 0.

pub mod error;
pub mod scope;

pub use error::{GenResult, GenerationError};
pub use scope::{Binding, ScopeKind, Scopes};

use log::{debug, trace, warn};

use crate::ast::*;
use crate::ir::{
    verify_module, BinaryOp, BlockId, Builder, FloatPredicate, FunctionId, IntPredicate, Module,
    Parameter, Type, Value,
};
use crate::parser::token::{Position, TokenKind};
use crate::runtime;

/// Имя точки входа программы.
pub const ENTRY_FUNCTION: &str = "main";

/// Красная зона и шаг роста стека для глубоко вложенных деревьев.
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_GROW: usize = 8 * 1024 * 1024;

/// Генератор IR.
pub struct IrGenerator {
    builder: Builder,
    scopes: Scopes,
}

impl IrGenerator {
    /// Создать генератор для модуля с именем `module_name`.
    pub fn new(module_name: &str) -> Self {
        Self {
            builder: Builder::new(module_name),
            scopes: Scopes::new(),
        }
    }

    /// Сгенерировать модуль из инструкций верхнего уровня.
    ///
    /// Возвращаемый модуль прошёл структурную проверку.
    pub fn generate(mut self, statements: &[Stmt]) -> GenResult<Module> {
        let main = self
            .builder
            .add_function(ENTRY_FUNCTION, Vec::new(), Type::I32);
        let entry = self.builder.append_basic_block(main, "entry")?;
        self.builder.position_at_end(main, entry);

        for stmt in statements {
            trace!("lowering {}", stmt);
            self.lower_stmt(stmt)?;
        }

        if !self.builder.block_has_terminator()? {
            self.builder.build_return(Some(Value::i32(0)))?;
        }

        let module = self.builder.finish();
        verify_module(&module)?;
        debug!(
            "generated module '{}' with {} functions",
            module.name,
            module.functions.len()
        );
        Ok(module)
    }

    // === Контекст ===

    /// Сгенерировать тело функции: точка вставки и области видимости
    /// восстанавливаются после выхода, даже при ошибке.
    fn with_function<T>(
        &mut self,
        function: FunctionId,
        body: impl FnOnce(&mut Self) -> GenResult<T>,
    ) -> GenResult<T> {
        let saved = self.builder.insert_point();
        let entry = self.builder.append_basic_block(function, "entry")?;
        self.builder.position_at_end(function, entry);
        self.scopes.push(ScopeKind::Function);

        let result = body(self);

        self.scopes.pop();
        self.builder.restore_insert_point(saved);
        result
    }

    /// Выполнить `body` во вложенной области блока.
    fn with_block_scope<T>(&mut self, body: impl FnOnce(&mut Self) -> GenResult<T>) -> GenResult<T> {
        self.scopes.push(ScopeKind::Block);
        let result = body(self);
        self.scopes.pop();
        result
    }

    fn append_block(&mut self, label: &str) -> GenResult<BlockId> {
        let function = self.builder.current_function()?;
        Ok(self.builder.append_basic_block(function, label)?)
    }

    /// Перейти к `target`, если текущий блок ещё не завершён.
    fn branch_if_open(&mut self, target: BlockId) -> GenResult<()> {
        if !self.builder.block_has_terminator()? {
            self.builder.build_unconditional_branch(target)?;
        }
        Ok(())
    }

    fn position_at(&mut self, block: BlockId) -> GenResult<()> {
        let function = self.builder.current_function()?;
        self.builder.position_at_end(function, block);
        Ok(())
    }

    fn lookup(&self, name: &str, position: Position) -> GenResult<Binding> {
        self.scopes
            .lookup(name)
            .ok_or_else(|| GenerationError::UndefinedVariable {
                name: name.to_string(),
                position,
            })
    }

    /// Сгенерировать выражение; глубокая вложенность расширяет стек.
    fn lower_expr(&mut self, expr: &Expr) -> GenResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || expr.accept(self))
    }

    /// Сгенерировать инструкцию; глубокая вложенность расширяет стек.
    fn lower_stmt(&mut self, stmt: &Stmt) -> GenResult<()> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW, || stmt.accept(self))
    }

    // === Выражения ===

    /// Привести условие к `i1`: не-`i1` значение сравнивается с нулём.
    fn condition(&mut self, expr: &Expr) -> GenResult<Value> {
        let value = self.lower_expr(expr)?;
        match value.ty() {
            Type::I1 => Ok(value),
            Type::I32 => Ok(self.builder.build_int_compare(
                IntPredicate::Ne,
                value,
                Value::i32(0),
                "tobool",
            )?),
            Type::F64 => Ok(self.builder.build_float_compare(
                FloatPredicate::One,
                value,
                Value::ConstFloat(0.0),
                "tobool",
            )?),
            ty => Err(GenerationError::InvalidCondition {
                ty,
                position: expr.position(),
            }),
        }
    }

    /// Вызов функции модуля; для `void`-функций результата нет.
    fn lower_call(&mut self, expr: &CallExpr) -> GenResult<Option<Value>> {
        let name = expr.callee.text.as_str();
        let position = expr.callee.position;

        let callee = self
            .builder
            .get_function(name)
            .ok_or_else(|| GenerationError::UnknownFunction {
                name: name.to_string(),
                position,
            })?;
        let param_types = self.builder.function(callee)?.param_types();

        if param_types.len() != expr.arguments.len() {
            return Err(GenerationError::ArityMismatch {
                name: name.to_string(),
                expected: param_types.len(),
                found: expr.arguments.len(),
                position,
            });
        }

        let mut args = Vec::with_capacity(expr.arguments.len());
        for (index, (argument, expected)) in expr.arguments.iter().zip(param_types).enumerate() {
            let value = self.lower_expr(argument)?;
            if value.ty() != expected {
                return Err(GenerationError::ArgumentType {
                    name: name.to_string(),
                    index,
                    expected,
                    found: value.ty(),
                    position: argument.position(),
                });
            }
            args.push(value);
        }

        Ok(self.builder.build_call(callee, args, "calltmp")?)
    }

    /// Объявление функции печати из runtime (создаётся при первом использовании).
    fn runtime_function(&mut self, name: &str, param: Type, position: Position) -> GenResult<FunctionId> {
        if let Some(existing) = self.builder.get_function(name) {
            let function = self.builder.function(existing)?;
            let matches = function.is_declaration()
                && function.return_type == Type::Void
                && function.param_types() == [param];
            if !matches {
                return Err(GenerationError::DuplicateFunction {
                    name: name.to_string(),
                    position,
                });
            }
            return Ok(existing);
        }
        Ok(self
            .builder
            .add_function(name, vec![Parameter::new("", param)], Type::Void))
    }
}

impl ExprVisitor for IrGenerator {
    type Output = GenResult<Value>;

    fn visit_binary(&mut self, expr: &BinaryExpr) -> GenResult<Value> {
        let left = self.lower_expr(&expr.left)?;
        let right = self.lower_expr(&expr.right)?;
        let op = expr.op.text.as_str();
        let position = expr.op.position;

        if left.ty() != right.ty() {
            return Err(GenerationError::TypeMismatch {
                op: op.to_string(),
                left: left.ty(),
                right: right.ty(),
                position,
            });
        }

        let ty = left.ty();
        let unsupported = || GenerationError::UnsupportedOperator {
            op: op.to_string(),
            ty,
            position,
        };

        match expr.op.kind {
            TokenKind::Arithmetic => {
                let (op, name) = match (op, ty.is_float()) {
                    ("+", false) => (BinaryOp::Add, "addtmp"),
                    ("-", false) => (BinaryOp::Sub, "subtmp"),
                    ("*", false) => (BinaryOp::Mul, "multmp"),
                    ("/", false) => (BinaryOp::SDiv, "divtmp"),
                    ("+", true) => (BinaryOp::FAdd, "addtmp"),
                    ("-", true) => (BinaryOp::FSub, "subtmp"),
                    ("*", true) => (BinaryOp::FMul, "multmp"),
                    ("/", true) => (BinaryOp::FDiv, "divtmp"),
                    _ => return Err(unsupported()),
                };
                if !ty.is_int() && !ty.is_float() {
                    return Err(unsupported());
                }
                Ok(self.builder.build_binary(op, left, right, name)?)
            }
            TokenKind::Compare if ty.is_int() => {
                let predicate = match op {
                    "<" => IntPredicate::Slt,
                    ">" => IntPredicate::Sgt,
                    "<=" => IntPredicate::Sle,
                    ">=" => IntPredicate::Sge,
                    "==" => IntPredicate::Eq,
                    "!=" => IntPredicate::Ne,
                    _ => return Err(unsupported()),
                };
                Ok(self
                    .builder
                    .build_int_compare(predicate, left, right, "cmptmp")?)
            }
            TokenKind::Compare if ty.is_float() => {
                let predicate = match op {
                    "<" => FloatPredicate::Olt,
                    ">" => FloatPredicate::Ogt,
                    "<=" => FloatPredicate::Ole,
                    ">=" => FloatPredicate::Oge,
                    "==" => FloatPredicate::Oeq,
                    "!=" => FloatPredicate::One,
                    _ => return Err(unsupported()),
                };
                Ok(self
                    .builder
                    .build_float_compare(predicate, left, right, "cmptmp")?)
            }
            _ => Err(unsupported()),
        }
    }

    fn visit_unary(&mut self, expr: &UnaryExpr) -> GenResult<Value> {
        let operand = self.lower_expr(&expr.right)?;
        let ty = operand.ty();

        match (expr.op.text.as_str(), ty) {
            ("-", ty) if ty.is_int() => Ok(self.builder.build_binary(
                BinaryOp::Sub,
                Value::int(ty, 0),
                operand,
                "negtmp",
            )?),
            ("-", Type::F64) => Ok(self.builder.build_float_neg(operand, "negtmp")?),
            ("!", ty) if ty.is_int() => Ok(self.builder.build_binary(
                BinaryOp::Xor,
                operand,
                Value::int(ty, -1),
                "nottmp",
            )?),
            (op, ty) => Err(GenerationError::UnsupportedOperator {
                op: op.to_string(),
                ty,
                position: expr.op.position,
            }),
        }
    }

    fn visit_literal(&mut self, expr: &LiteralExpr) -> GenResult<Value> {
        let token = &expr.value;
        let invalid = || GenerationError::InvalidLiteral {
            text: token.text.clone(),
            position: token.position,
        };

        match token.kind {
            TokenKind::IntLiteral => token
                .text
                .parse::<i32>()
                .map(Value::i32)
                .map_err(|_| invalid()),
            TokenKind::FloatLiteral => token
                .text
                .parse::<f64>()
                .map(Value::ConstFloat)
                .map_err(|_| invalid()),
            TokenKind::BoolLiteral => match token.text.as_str() {
                "true" => Ok(Value::bool(true)),
                "false" => Ok(Value::bool(false)),
                _ => Err(invalid()),
            },
            TokenKind::StringLiteral => Ok(self.builder.global_string(&token.text)),
            _ => Err(invalid()),
        }
    }

    /// Чтение переменной всегда загружает `i32`, каким бы ни был тип слота.
    fn visit_variable(&mut self, expr: &VariableExpr) -> GenResult<Value> {
        let binding = self.lookup(&expr.name.text, expr.name.position)?;
        Ok(self
            .builder
            .build_load(Type::I32, binding.slot, &expr.name.text)?)
    }

    /// Присваивание не меняет тип слота: значение другого типа не помещается.
    fn visit_assign(&mut self, expr: &AssignExpr) -> GenResult<Value> {
        let value = self.lower_expr(&expr.value)?;
        let binding = self.lookup(&expr.name.text, expr.name.position)?;
        if value.ty() != binding.ty {
            return Err(GenerationError::TypeMismatch {
                op: "=".to_string(),
                left: binding.ty,
                right: value.ty(),
                position: expr.name.position,
            });
        }
        self.builder.build_store(value, binding.slot)?;
        Ok(value)
    }

    fn visit_call(&mut self, expr: &CallExpr) -> GenResult<Value> {
        self.lower_call(expr)?
            .ok_or_else(|| GenerationError::VoidValue {
                name: expr.callee.text.clone(),
                position: expr.callee.position,
            })
    }

    fn visit_grouping(&mut self, expr: &GroupingExpr) -> GenResult<Value> {
        self.lower_expr(&expr.expression)
    }
}

impl StmtVisitor for IrGenerator {
    type Output = GenResult<()>;

    fn visit_expression(&mut self, stmt: &ExpressionStmt) -> GenResult<()> {
        // Вызов ради побочного эффекта может не иметь значения
        if let Expr::Call(call) = &stmt.expression {
            self.lower_call(call)?;
            return Ok(());
        }
        self.lower_expr(&stmt.expression)?;
        Ok(())
    }

    fn visit_print(&mut self, stmt: &PrintStmt) -> GenResult<()> {
        let value = self.lower_expr(&stmt.expression)?;
        let position = stmt.expression.position();

        let (name, argument) = match value.ty() {
            Type::Ptr => (runtime::PRINT_TEXT, value),
            Type::I32 => (runtime::PRINT_INTEGER, value),
            Type::I1 => {
                let widened = self.builder.build_int_z_extend(value, Type::I32, "widened")?;
                (runtime::PRINT_INTEGER, widened)
            }
            Type::F64 => (runtime::PRINT_REAL, value),
            ty => return Err(GenerationError::UnsupportedPrintType { ty, position }),
        };

        let function = self.runtime_function(name, argument.ty(), position)?;
        self.builder.build_call(function, vec![argument], "")?;
        Ok(())
    }

    fn visit_var(&mut self, stmt: &VarStmt) -> GenResult<()> {
        let value = match &stmt.initializer {
            Some(initializer) => self.lower_expr(initializer)?,
            None => Value::i32(0),
        };

        let slot = self.builder.build_alloca(value.ty(), &stmt.name.text)?;
        self.builder.build_store(value, slot)?;
        self.scopes.define(&stmt.name.text, slot, value.ty());
        Ok(())
    }

    fn visit_block(&mut self, stmt: &BlockStmt) -> GenResult<()> {
        self.with_block_scope(|generator| {
            for inner in &stmt.statements {
                generator.lower_stmt(inner)?;
            }
            Ok(())
        })
    }

    fn visit_if(&mut self, stmt: &IfStmt) -> GenResult<()> {
        let condition = self.condition(&stmt.condition)?;

        let then_block = self.append_block("then")?;
        let else_block = self.append_block("else")?;
        let merge_block = self.append_block("ifcont")?;

        self.builder
            .build_conditional_branch(condition, then_block, else_block)?;

        self.position_at(then_block)?;
        self.lower_stmt(&stmt.then_branch)?;
        self.branch_if_open(merge_block)?;

        self.position_at(else_block)?;
        if let Some(else_branch) = &stmt.else_branch {
            self.lower_stmt(else_branch)?;
        }
        self.branch_if_open(merge_block)?;

        self.position_at(merge_block)
    }

    fn visit_while(&mut self, stmt: &WhileStmt) -> GenResult<()> {
        let cond_block = self.append_block("whilecond")?;
        let body_block = self.append_block("whilebody")?;
        let after_block = self.append_block("whileafter")?;

        self.branch_if_open(cond_block)?;

        self.position_at(cond_block)?;
        let condition = self.condition(&stmt.condition)?;
        self.builder
            .build_conditional_branch(condition, body_block, after_block)?;

        self.position_at(body_block)?;
        self.lower_stmt(&stmt.body)?;
        self.branch_if_open(cond_block)?;

        self.position_at(after_block)
    }

    fn visit_for(&mut self, stmt: &ForStmt) -> GenResult<()> {
        self.lower_stmt(&stmt.clone().desugar())
    }

    fn visit_function(&mut self, stmt: &FunctionStmt) -> GenResult<()> {
        let name = stmt.name.text.as_str();
        if self.builder.get_function(name).is_some() {
            return Err(GenerationError::DuplicateFunction {
                name: name.to_string(),
                position: stmt.name.position,
            });
        }

        let params = stmt
            .params
            .iter()
            .map(|p| Parameter::new(p.text.as_str(), Type::I32))
            .collect();
        let function = self.builder.add_function(name, params, Type::I32);
        debug!("lowering function '{}' ({} params)", name, stmt.params.len());

        self.with_function(function, |generator| {
            // Параметры переносятся в слоты, чтобы их можно было переприсваивать
            for (index, param) in stmt.params.iter().enumerate() {
                let value = generator.builder.param(index)?;
                let slot = generator.builder.build_alloca(Type::I32, &param.text)?;
                generator.builder.build_store(value, slot)?;
                generator.scopes.define(&param.text, slot, Type::I32);
            }

            for inner in &stmt.body {
                generator.lower_stmt(inner)?;
            }

            if !generator.builder.block_has_terminator()? {
                generator.builder.build_return(Some(Value::i32(0)))?;
            }
            Ok(())
        })
    }

    fn visit_return(&mut self, stmt: &ReturnStmt) -> GenResult<()> {
        let value = match &stmt.value {
            Some(value) => Some(self.lower_expr(value)?),
            None => None,
        };
        self.builder.build_return(value)?;
        Ok(())
    }

    fn visit_break(&mut self, stmt: &BreakStmt) -> GenResult<()> {
        warn!(
            "'break' at {} has no effect and generates no code",
            stmt.keyword.position
        );
        Ok(())
    }
}

/// Сгенерировать модуль `main` из инструкций верхнего уровня.
pub fn generate(statements: &[Stmt]) -> GenResult<Module> {
    IrGenerator::new(ENTRY_FUNCTION).generate(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instruction;
    use crate::parser::parse;

    fn lower(source: &str) -> GenResult<Module> {
        generate(&parse(source).unwrap())
    }

    fn labels(module: &Module, function: &str) -> Vec<String> {
        module
            .function_by_name(function)
            .unwrap()
            .blocks
            .iter()
            .map(|b| b.label.clone())
            .collect()
    }

    #[test]
    fn test_empty_program() {
        let module = lower("").unwrap();
        let main = module.function_by_name("main").unwrap();
        assert_eq!(main.blocks.len(), 1);
        assert_eq!(
            main.blocks[0].terminator,
            Some(crate::ir::Terminator::Return(Some(Value::i32(0))))
        );
    }

    #[test]
    fn test_if_blocks() {
        let module = lower("var x = 2; if (x > 1) { screenit x; } else { screenit 0; }").unwrap();
        assert_eq!(labels(&module, "main"), vec!["entry", "then", "else", "ifcont"]);
    }

    #[test]
    fn test_while_blocks() {
        let module = lower("var i = 0; while (i < 3) { i = i + 1; }").unwrap();
        assert_eq!(
            labels(&module, "main"),
            vec!["entry", "whilecond", "whilebody", "whileafter"]
        );
    }

    #[test]
    fn test_undefined_variable() {
        let err = lower("screenit y;").unwrap_err();
        assert!(matches!(err, GenerationError::UndefinedVariable { ref name, .. } if name == "y"));
    }

    #[test]
    fn test_block_scope_discarded() {
        let err = lower("{ var inner = 1; } screenit inner;").unwrap_err();
        assert!(matches!(err, GenerationError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_function_cannot_see_enclosing_locals() {
        let err = lower("var g = 1; func f() { return g; }").unwrap_err();
        assert!(matches!(err, GenerationError::UndefinedVariable { ref name, .. } if name == "g"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = lower("screenit 1 + \"x\";").unwrap_err();
        assert!(matches!(
            err,
            GenerationError::TypeMismatch {
                left: Type::I32,
                right: Type::Ptr,
                ..
            }
        ));
    }

    #[test]
    fn test_assign_must_fit_slot_type() {
        let err = lower("var x = 1; x = 2.5;").unwrap_err();
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
        assert_eq!(err.to_string(), "Type mismatch: i1 = i32 at 1:15");
    }

    #[test]
    fn test_assign_same_type() {
        assert!(lower("var s = \"a\"; s = \"b\"; var f = 1.5; f = 2.5;").is_ok());
        assert!(lower("func f(a) { a = a + 1; return a; }").is_ok());
    }

    #[test]
    fn test_string_arithmetic_unsupported() {
        let err = lower("screenit \"a\" + \"b\";").unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedOperator { ty: Type::Ptr, .. }));
    }

    #[test]
    fn test_unknown_function() {
        let err = lower("screenit f(1);").unwrap_err();
        assert!(matches!(err, GenerationError::UnknownFunction { .. }));
    }

    #[test]
    fn test_forward_reference_is_unknown() {
        let err = lower("screenit f(); func f() { return 1; }").unwrap_err();
        assert!(matches!(err, GenerationError::UnknownFunction { .. }));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = lower("func f(a) { return a; } screenit f(1, 2);").unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_function() {
        let err = lower("func f() {} func f() {}").unwrap_err();
        assert!(matches!(err, GenerationError::DuplicateFunction { .. }));
        let err = lower("func main() {}").unwrap_err();
        assert!(matches!(err, GenerationError::DuplicateFunction { .. }));
    }

    #[test]
    fn test_invalid_int_literal() {
        let err = lower("screenit 99999999999;").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidLiteral { .. }));
    }

    #[test]
    fn test_print_selects_runtime_function() {
        let module = lower("screenit \"s\"; screenit 1; screenit 1.5; screenit true;").unwrap();
        assert!(module.function_by_name("print_text").is_some());
        assert!(module.function_by_name("print_real").is_some());
        let print_integer = module.get_function("print_integer").unwrap();
        let calls = module
            .function_by_name("main")
            .unwrap()
            .instructions()
            .filter(|i| matches!(i, Instruction::Call { callee, .. } if *callee == print_integer))
            .count();
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_implicit_return_after_function_body() {
        let module = lower("func f(a) { screenit a; }").unwrap();
        let f = module.function_by_name("f").unwrap();
        assert_eq!(
            f.blocks.last().unwrap().terminator,
            Some(crate::ir::Terminator::Return(Some(Value::i32(0))))
        );
    }

    #[test]
    fn test_nested_function_restores_insert_point() {
        let module = lower("if (true) { func inner() { return 1; } screenit inner(); }").unwrap();
        assert_eq!(labels(&module, "main"), vec!["entry", "then", "else", "ifcont"]);
        assert_eq!(labels(&module, "inner"), vec!["entry"]);
    }

    #[test]
    fn test_valueless_return_fails_verification() {
        let err = lower("func f() { return; }").unwrap_err();
        assert!(matches!(err, GenerationError::Verification(_)));
    }

    #[test]
    fn test_break_is_noop() {
        let with_break = lower("while (false) { break; }").unwrap();
        let without = lower("while (false) { }").unwrap();
        assert_eq!(with_break, without);
    }

    #[test]
    fn test_recursion() {
        let module =
            lower("func fact(n) { if (n <= 1) { return 1; } return n * fact(n - 1); }").unwrap();
        assert!(module.function_by_name("fact").is_some());
    }

    #[test]
    fn test_void_call_as_value() {
        let err = lower("screenit 1; var x = print_integer(2);").unwrap_err();
        assert!(matches!(err, GenerationError::VoidValue { .. }));
        assert!(lower("screenit 1; print_integer(2);").is_ok());
    }
}
