//! Структурная проверка модуля перед передачей бэкенду.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::*;

/// Нарушение структуры модуля.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("in function '{function}': {message}")]
pub struct VerifyError {
    pub function: String,
    pub message: String,
}

type VerifyResult = Result<(), VerifyError>;

/// Проверить модуль целиком.
pub fn verify_module(module: &Module) -> VerifyResult {
    let mut names = HashSet::new();
    for function in &module.functions {
        if !names.insert(function.name.as_str()) {
            return Err(VerifyError {
                function: function.name.clone(),
                message: "function is defined more than once".to_string(),
            });
        }
        verify_function(module, function)?;
    }
    Ok(())
}

struct FunctionVerifier<'a> {
    module: &'a Module,
    function: &'a Function,
    defined: HashSet<LocalId>,
    /// Тип, под который выделен каждый слот `alloca`.
    slots: HashMap<LocalId, Type>,
}

fn verify_function(module: &Module, function: &Function) -> VerifyResult {
    if function.is_declaration() {
        return Ok(());
    }

    let mut verifier = FunctionVerifier {
        module,
        function,
        defined: HashSet::new(),
        slots: HashMap::new(),
    };

    for instruction in function.instructions() {
        if let Some(result) = instruction.result() {
            if function.local(result).is_none() {
                return verifier.fail(format!("instruction defines unknown value #{}", result.0));
            }
            if !verifier.defined.insert(result) {
                let name = local_name(function, result);
                return verifier.fail(format!("value '%{}' is defined more than once", name));
            }
        }
        if let Instruction::Alloca { result, ty } = instruction {
            verifier.slots.insert(*result, *ty);
        }
    }

    for block in &function.blocks {
        for instruction in &block.instructions {
            verifier.check_instruction(instruction, &block.label)?;
        }
        match &block.terminator {
            Some(terminator) => verifier.check_terminator(terminator, &block.label)?,
            None => {
                return verifier.fail(format!("block '{}' has no terminator", block.label));
            }
        }
    }

    Ok(())
}

fn local_name(function: &Function, id: LocalId) -> &str {
    function.local(id).map(|l| l.name.as_str()).unwrap_or("?")
}

impl FunctionVerifier<'_> {
    fn fail(&self, message: String) -> VerifyResult {
        Err(VerifyError {
            function: self.function.name.clone(),
            message,
        })
    }

    fn check_value(&self, value: Value, block: &str) -> VerifyResult {
        match value {
            Value::ConstInt { ty, .. } if !ty.is_int() => {
                self.fail(format!("integer constant of type {} in '{}'", ty, block))
            }
            Value::Global(id) if self.module.global(id).is_none() => {
                self.fail(format!("reference to unknown global #{} in '{}'", id.0, block))
            }
            Value::Param { index, ty } => match self.function.params.get(index) {
                Some(param) if param.ty == ty => Ok(()),
                Some(_) => self.fail(format!("parameter #{} used with wrong type in '{}'", index, block)),
                None => self.fail(format!("reference to unknown parameter #{} in '{}'", index, block)),
            },
            Value::Local { id, ty } => match self.function.local(id) {
                Some(local) if !self.defined.contains(&id) => {
                    self.fail(format!("use of undefined value '%{}' in '{}'", local.name, block))
                }
                Some(local) if local.ty != ty => self.fail(format!(
                    "value '%{}' used as {} but has type {} in '{}'",
                    local.name, ty, local.ty, block
                )),
                Some(_) => Ok(()),
                None => self.fail(format!("reference to unknown value #{} in '{}'", id.0, block)),
            },
            _ => Ok(()),
        }
    }

    fn expect_type(&self, value: Value, expected: Type, what: &str, block: &str) -> VerifyResult {
        if value.ty() != expected {
            return self.fail(format!(
                "{} must be {} but is {} in '{}'",
                what,
                expected,
                value.ty(),
                block
            ));
        }
        Ok(())
    }

    fn check_instruction(&self, instruction: &Instruction, block: &str) -> VerifyResult {
        for operand in instruction.operands() {
            self.check_value(operand, block)?;
        }

        match instruction {
            Instruction::Alloca { ty, .. } if *ty == Type::Void => {
                self.fail(format!("alloca of void in '{}'", block))
            }
            Instruction::Load { ptr, .. } => self.expect_type(*ptr, Type::Ptr, "load address", block),
            Instruction::Store { value, ptr } => {
                self.expect_type(*ptr, Type::Ptr, "store address", block)?;
                match ptr {
                    Value::Local { id, .. } => match self.slots.get(id) {
                        Some(&slot_ty) => self.expect_type(*value, slot_ty, "stored value", block),
                        None => Ok(()),
                    },
                    _ => Ok(()),
                }
            }
            Instruction::Binary { op, lhs, rhs, .. } => {
                self.expect_type(*rhs, lhs.ty(), "right operand", block)?;
                let valid = if op.is_float() {
                    lhs.ty().is_float()
                } else {
                    lhs.ty().is_int()
                };
                if !valid {
                    return self.fail(format!(
                        "'{}' applied to {} in '{}'",
                        op.mnemonic(),
                        lhs.ty(),
                        block
                    ));
                }
                Ok(())
            }
            Instruction::ICmp { lhs, rhs, .. } => {
                self.expect_type(*rhs, lhs.ty(), "right operand", block)?;
                if !lhs.ty().is_int() {
                    return self.fail(format!("icmp applied to {} in '{}'", lhs.ty(), block));
                }
                Ok(())
            }
            Instruction::FCmp { lhs, rhs, .. } => {
                self.expect_type(*lhs, Type::F64, "left operand", block)?;
                self.expect_type(*rhs, Type::F64, "right operand", block)
            }
            Instruction::FNeg { operand, .. } => {
                self.expect_type(*operand, Type::F64, "fneg operand", block)
            }
            Instruction::ZExt { operand, ty, .. } => {
                if !operand.ty().is_int() || !ty.is_int() {
                    return self.fail(format!("zext from {} to {} in '{}'", operand.ty(), ty, block));
                }
                Ok(())
            }
            Instruction::Call {
                result,
                callee,
                args,
            } => self.check_call(*result, *callee, args, block),
            _ => Ok(()),
        }
    }

    fn check_call(
        &self,
        result: Option<LocalId>,
        callee: FunctionId,
        args: &[Value],
        block: &str,
    ) -> VerifyResult {
        let Some(target) = self.module.function(callee) else {
            return self.fail(format!("call to unknown function #{} in '{}'", callee.0, block));
        };

        if target.params.len() != args.len() {
            return self.fail(format!(
                "call to '{}' passes {} arguments, expected {}",
                target.name,
                args.len(),
                target.params.len()
            ));
        }
        for (arg, param) in args.iter().zip(&target.params) {
            self.expect_type(*arg, param.ty, "call argument", block)?;
        }

        if result.is_some() == (target.return_type == Type::Void) {
            return self.fail(format!(
                "call to '{}' result does not match return type {}",
                target.name, target.return_type
            ));
        }
        Ok(())
    }

    fn check_terminator(&self, terminator: &Terminator, block: &str) -> VerifyResult {
        for target in terminator.successors() {
            if self.function.block(target).is_none() {
                return self.fail(format!("branch to unknown block #{} from '{}'", target.0, block));
            }
        }

        match terminator {
            Terminator::Return(None) if self.function.return_type != Type::Void => self.fail(
                format!(
                    "'ret void' in function returning {} ('{}')",
                    self.function.return_type, block
                ),
            ),
            Terminator::Return(Some(value)) => {
                self.check_value(*value, block)?;
                self.expect_type(*value, self.function.return_type, "return value", block)
            }
            Terminator::CondBranch { condition, .. } => {
                self.check_value(*condition, block)?;
                self.expect_type(*condition, Type::I1, "branch condition", block)
            }
            _ => Ok(()),
        }
    }
}
