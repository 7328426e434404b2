//! Построитель IR с перемещаемой точкой вставки.
//!
//! [`Builder`] владеет модулем и знает текущую точку вставки (функция и
//! блок). Все `build_*` методы добавляют инструкцию в конец текущего блока.
//! Если текущий блок уже завершён терминатором, открывается новый
//! недостижимый блок `dead`, так что после терминатора ничего не дописывается.

use thiserror::Error;

use super::*;

/// Ошибка использования построителя.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuilderError {
    #[error("Builder has no insertion point")]
    NoInsertPoint,

    #[error("Unknown function id {0}")]
    UnknownFunction(usize),

    #[error("Function '{0}' has no parameter {1}")]
    UnknownParameter(String, usize),
}

/// Точка вставки: функция и блок в ней.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPoint {
    pub function: FunctionId,
    pub block: BlockId,
}

type BuildResult<T> = Result<T, BuilderError>;

/// Построитель модуля.
pub struct Builder {
    module: Module,
    insert_point: Option<InsertPoint>,
}

impl Builder {
    /// Создать построитель нового пустого модуля.
    pub fn new(module_name: &str) -> Self {
        Self {
            module: Module::new(module_name),
            insert_point: None,
        }
    }

    /// Завершить построение и вернуть модуль.
    pub fn finish(self) -> Module {
        self.module
    }

    // === Функции и блоки ===

    /// Добавить функцию без тела (объявление).
    pub fn add_function(
        &mut self,
        name: &str,
        params: Vec<Parameter>,
        return_type: Type,
    ) -> FunctionId {
        self.module
            .add_function(Function::new(name, params, return_type))
    }

    pub fn get_function(&self, name: &str) -> Option<FunctionId> {
        self.module.get_function(name)
    }

    pub fn function(&self, id: FunctionId) -> BuildResult<&Function> {
        self.module
            .function(id)
            .ok_or(BuilderError::UnknownFunction(id.0))
    }

    fn function_mut(&mut self, id: FunctionId) -> BuildResult<&mut Function> {
        self.module
            .functions
            .get_mut(id.0)
            .ok_or(BuilderError::UnknownFunction(id.0))
    }

    /// Добавить блок в конец функции. Метка уникализируется.
    pub fn append_basic_block(&mut self, function: FunctionId, label: &str) -> BuildResult<BlockId> {
        Ok(self.function_mut(function)?.add_block(label))
    }

    /// Перенести точку вставки в конец блока.
    pub fn position_at_end(&mut self, function: FunctionId, block: BlockId) {
        self.insert_point = Some(InsertPoint { function, block });
    }

    pub fn insert_point(&self) -> Option<InsertPoint> {
        self.insert_point
    }

    /// Восстановить ранее сохранённую точку вставки.
    pub fn restore_insert_point(&mut self, insert_point: Option<InsertPoint>) {
        self.insert_point = insert_point;
    }

    pub fn current_function(&self) -> BuildResult<FunctionId> {
        self.insert_point
            .map(|ip| ip.function)
            .ok_or(BuilderError::NoInsertPoint)
    }

    /// Завершён ли текущий блок терминатором.
    pub fn block_has_terminator(&self) -> BuildResult<bool> {
        let ip = self.insert_point.ok_or(BuilderError::NoInsertPoint)?;
        Ok(self
            .function(ip.function)?
            .block(ip.block)
            .is_some_and(BasicBlock::is_terminated))
    }

    /// Значение параметра текущей функции.
    pub fn param(&self, index: usize) -> BuildResult<Value> {
        let function = self.function(self.current_function()?)?;
        let param = function
            .params
            .get(index)
            .ok_or_else(|| BuilderError::UnknownParameter(function.name.clone(), index))?;
        Ok(Value::Param {
            index,
            ty: param.ty,
        })
    }

    /// Строковая константа модуля; значение имеет тип `ptr`.
    pub fn global_string(&mut self, text: &str) -> Value {
        Value::Global(self.module.add_global_string(text))
    }

    /// Текущий блок, готовый принять инструкцию. Завершённый блок
    /// заменяется новым блоком `dead`.
    fn open_block(&mut self) -> BuildResult<(FunctionId, BlockId)> {
        let ip = self.insert_point.ok_or(BuilderError::NoInsertPoint)?;
        let terminated = self
            .function(ip.function)?
            .block(ip.block)
            .is_some_and(BasicBlock::is_terminated);

        if terminated {
            let dead = self.append_basic_block(ip.function, "dead")?;
            self.position_at_end(ip.function, dead);
            return Ok((ip.function, dead));
        }
        Ok((ip.function, ip.block))
    }

    fn push(&mut self, make: impl FnOnce(&mut Function) -> Instruction) -> BuildResult<()> {
        let (function, block) = self.open_block()?;
        let function = self.function_mut(function)?;
        let instruction = make(function);
        function.blocks[block.0].instructions.push(instruction);
        Ok(())
    }

    fn terminate(&mut self, terminator: Terminator) -> BuildResult<()> {
        let (function, block) = self.open_block()?;
        self.function_mut(function)?.blocks[block.0].terminator = Some(terminator);
        Ok(())
    }

    // === Инструкции ===

    /// Выделить слот на стеке.
    ///
    /// Слоты всегда ставятся в начало входного блока функции, после уже
    /// существующих `alloca`, чтобы объявление внутри цикла не наращивало стек.
    pub fn build_alloca(&mut self, ty: Type, name: &str) -> BuildResult<Value> {
        let function_id = self.current_function()?;
        let function = self.function_mut(function_id)?;
        let result = function.add_local(name, Type::Ptr);

        let entry = function
            .blocks
            .first_mut()
            .ok_or(BuilderError::NoInsertPoint)?;
        let index = entry
            .instructions
            .iter()
            .take_while(|i| matches!(i, Instruction::Alloca { .. }))
            .count();
        entry
            .instructions
            .insert(index, Instruction::Alloca { result, ty });

        Ok(Value::Local {
            id: result,
            ty: Type::Ptr,
        })
    }

    pub fn build_load(&mut self, ty: Type, ptr: Value, name: &str) -> BuildResult<Value> {
        let mut value = None;
        self.push(|f| {
            let result = f.add_local(name, ty);
            value = Some(Value::Local { id: result, ty });
            Instruction::Load { result, ty, ptr }
        })?;
        value.ok_or(BuilderError::NoInsertPoint)
    }

    pub fn build_store(&mut self, value: Value, ptr: Value) -> BuildResult<()> {
        self.push(|_| Instruction::Store { value, ptr })
    }

    /// Арифметика; тип результата совпадает с типом левого операнда.
    pub fn build_binary(
        &mut self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> BuildResult<Value> {
        let ty = lhs.ty();
        let mut value = None;
        self.push(|f| {
            let result = f.add_local(name, ty);
            value = Some(Value::Local { id: result, ty });
            Instruction::Binary {
                result,
                op,
                lhs,
                rhs,
            }
        })?;
        value.ok_or(BuilderError::NoInsertPoint)
    }

    pub fn build_int_compare(
        &mut self,
        predicate: IntPredicate,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> BuildResult<Value> {
        let mut value = None;
        self.push(|f| {
            let result = f.add_local(name, Type::I1);
            value = Some(Value::Local {
                id: result,
                ty: Type::I1,
            });
            Instruction::ICmp {
                result,
                predicate,
                lhs,
                rhs,
            }
        })?;
        value.ok_or(BuilderError::NoInsertPoint)
    }

    pub fn build_float_compare(
        &mut self,
        predicate: FloatPredicate,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> BuildResult<Value> {
        let mut value = None;
        self.push(|f| {
            let result = f.add_local(name, Type::I1);
            value = Some(Value::Local {
                id: result,
                ty: Type::I1,
            });
            Instruction::FCmp {
                result,
                predicate,
                lhs,
                rhs,
            }
        })?;
        value.ok_or(BuilderError::NoInsertPoint)
    }

    pub fn build_float_neg(&mut self, operand: Value, name: &str) -> BuildResult<Value> {
        let mut value = None;
        self.push(|f| {
            let result = f.add_local(name, Type::F64);
            value = Some(Value::Local {
                id: result,
                ty: Type::F64,
            });
            Instruction::FNeg { result, operand }
        })?;
        value.ok_or(BuilderError::NoInsertPoint)
    }

    pub fn build_int_z_extend(&mut self, operand: Value, ty: Type, name: &str) -> BuildResult<Value> {
        let mut value = None;
        self.push(|f| {
            let result = f.add_local(name, ty);
            value = Some(Value::Local { id: result, ty });
            Instruction::ZExt {
                result,
                operand,
                ty,
            }
        })?;
        value.ok_or(BuilderError::NoInsertPoint)
    }

    /// Вызов функции. Для `void`-функций результата нет.
    pub fn build_call(
        &mut self,
        callee: FunctionId,
        args: Vec<Value>,
        name: &str,
    ) -> BuildResult<Option<Value>> {
        let return_type = self.function(callee)?.return_type;
        let mut value = None;
        self.push(|f| {
            let result = if return_type == Type::Void {
                None
            } else {
                let id = f.add_local(name, return_type);
                value = Some(Value::Local {
                    id,
                    ty: return_type,
                });
                Some(id)
            };
            Instruction::Call {
                result,
                callee,
                args,
            }
        })?;
        Ok(value)
    }

    // === Терминаторы ===

    pub fn build_return(&mut self, value: Option<Value>) -> BuildResult<()> {
        self.terminate(Terminator::Return(value))
    }

    pub fn build_unconditional_branch(&mut self, target: BlockId) -> BuildResult<()> {
        self.terminate(Terminator::Branch(target))
    }

    pub fn build_conditional_branch(
        &mut self,
        condition: Value,
        then_block: BlockId,
        else_block: BlockId,
    ) -> BuildResult<()> {
        self.terminate(Terminator::CondBranch {
            condition,
            then_block,
            else_block,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_main() -> (Builder, FunctionId) {
        let mut builder = Builder::new("test");
        let main = builder.add_function("main", vec![], Type::I32);
        let entry = builder.append_basic_block(main, "entry").unwrap();
        builder.position_at_end(main, entry);
        (builder, main)
    }

    #[test]
    fn test_no_insert_point() {
        let mut builder = Builder::new("test");
        assert_eq!(
            builder.build_return(None),
            Err(BuilderError::NoInsertPoint)
        );
    }

    #[test]
    fn test_allocas_hoisted_to_entry() {
        let (mut builder, main) = builder_with_main();
        let x = builder.build_alloca(Type::I32, "x").unwrap();
        builder.build_store(Value::i32(1), x).unwrap();

        let body = builder.append_basic_block(main, "body").unwrap();
        builder.build_unconditional_branch(body).unwrap();
        builder.position_at_end(main, body);
        builder.build_alloca(Type::I32, "y").unwrap();
        builder.build_return(Some(Value::i32(0))).unwrap();

        let module = builder.finish();
        let entry = &module.functions[main.0].blocks[0];
        assert!(matches!(entry.instructions[0], Instruction::Alloca { .. }));
        assert!(matches!(entry.instructions[1], Instruction::Alloca { .. }));
        assert!(matches!(entry.instructions[2], Instruction::Store { .. }));
        assert!(module.functions[main.0].blocks[1].instructions.is_empty());
    }

    #[test]
    fn test_emit_after_terminator_opens_dead_block() {
        let (mut builder, main) = builder_with_main();
        builder.build_return(Some(Value::i32(1))).unwrap();
        assert!(builder.block_has_terminator().unwrap());

        builder.build_return(Some(Value::i32(2))).unwrap();
        let function = builder.function(main).unwrap();
        assert_eq!(function.blocks.len(), 2);
        assert_eq!(function.blocks[1].label, "dead");
        assert_eq!(
            builder.insert_point(),
            Some(InsertPoint {
                function: main,
                block: BlockId(1)
            })
        );
    }

    #[test]
    fn test_void_call_has_no_result() {
        let (mut builder, _) = builder_with_main();
        let print = builder.add_function(
            "print_integer",
            vec![Parameter::new("", Type::I32)],
            Type::Void,
        );
        let result = builder.build_call(print, vec![Value::i32(1)], "").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_block_labels_unique() {
        let (mut builder, main) = builder_with_main();
        let a = builder.append_basic_block(main, "then").unwrap();
        let b = builder.append_basic_block(main, "then").unwrap();
        let function = builder.function(main).unwrap();
        assert_eq!(function.blocks[a.0].label, "then");
        assert_eq!(function.blocks[b.0].label, "then1");
    }
}
