//! Промежуточное представление (IR) в SSA-форме.
//!
//! Низкоуровневое типизированное представление программы: модуль из функций,
//! функции из базовых блоков, блоки из инструкций и ровно одного
//! терминатора. Переменные живут в слотах `alloca` и читаются/пишутся через
//! `load`/`store`; поток управления задаётся явными переходами между блоками.
//!
//! Текстовая форма модуля ([`printer`]) совпадает с ассемблером LLVM, так что
//! модуль можно передать LLVM без дополнительного перевода.

pub mod builder;
pub mod printer;
pub mod verify;

pub use builder::{Builder, BuilderError, InsertPoint};
pub use verify::{verify_module, VerifyError};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Тип значения IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    /// Булево значение (результат сравнения)
    I1,
    I32,
    /// 64-битный float
    F64,
    /// Непрозрачный указатель
    Ptr,
}

impl Type {
    pub fn is_int(self) -> bool {
        matches!(self, Type::I1 | Type::I32)
    }

    pub fn is_float(self) -> bool {
        self == Type::F64
    }

    /// Выравнивание в байтах для `alloca`/`load`/`store`.
    pub fn align(self) -> u32 {
        match self {
            Type::Void | Type::I1 => 1,
            Type::I32 => 4,
            Type::F64 | Type::Ptr => 8,
        }
    }
}

/// Индекс функции в модуле.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub usize);

/// Индекс блока в функции.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub usize);

/// Индекс локального значения (результата инструкции) в функции.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(pub usize);

/// Индекс глобальной константы в модуле.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalId(pub usize);

/// Операнд инструкции.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Целая константа (`i1`, `i8` или `i32`)
    ConstInt { ty: Type, value: i64 },
    /// Константа `double`
    ConstFloat(f64),
    /// Адрес глобальной строки
    Global(GlobalId),
    /// Параметр текущей функции
    Param { index: usize, ty: Type },
    /// Результат инструкции текущей функции
    Local { id: LocalId, ty: Type },
}

impl Value {
    pub fn int(ty: Type, value: i64) -> Self {
        Value::ConstInt { ty, value }
    }

    pub fn i32(value: i32) -> Self {
        Value::ConstInt {
            ty: Type::I32,
            value: value as i64,
        }
    }

    pub fn bool(value: bool) -> Self {
        Value::ConstInt {
            ty: Type::I1,
            value: value as i64,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::ConstInt { ty, .. } => *ty,
            Value::ConstFloat(_) => Type::F64,
            Value::Global(_) => Type::Ptr,
            Value::Param { ty, .. } => *ty,
            Value::Local { ty, .. } => *ty,
        }
    }
}

/// Арифметическая и битовая операция.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinaryOp {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::Xor => "xor",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
        }
    }
}

/// Предикат целочисленного сравнения (знаковый).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        }
    }
}

/// Предикат сравнения float (упорядоченный).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FloatPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        }
    }
}

/// Инструкция IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Слот на стеке под значение типа `ty`; результат имеет тип `ptr`
    Alloca { result: LocalId, ty: Type },
    /// Чтение из памяти
    Load { result: LocalId, ty: Type, ptr: Value },
    /// Запись в память
    Store { value: Value, ptr: Value },
    /// Арифметика
    Binary {
        result: LocalId,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    /// Целочисленное сравнение
    ICmp {
        result: LocalId,
        predicate: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Сравнение float
    FCmp {
        result: LocalId,
        predicate: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Смена знака float
    FNeg { result: LocalId, operand: Value },
    /// Расширение целого нулями до `ty`
    ZExt {
        result: LocalId,
        operand: Value,
        ty: Type,
    },
    /// Вызов функции модуля
    Call {
        result: Option<LocalId>,
        callee: FunctionId,
        args: Vec<Value>,
    },
}

impl Instruction {
    /// Локальное значение, определяемое инструкцией.
    pub fn result(&self) -> Option<LocalId> {
        match self {
            Instruction::Alloca { result, .. }
            | Instruction::Load { result, .. }
            | Instruction::Binary { result, .. }
            | Instruction::ICmp { result, .. }
            | Instruction::FCmp { result, .. }
            | Instruction::FNeg { result, .. }
            | Instruction::ZExt { result, .. } => Some(*result),
            Instruction::Call { result, .. } => *result,
            Instruction::Store { .. } => None,
        }
    }

    /// Операнды инструкции.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Instruction::Alloca { .. } => Vec::new(),
            Instruction::Load { ptr, .. } => vec![*ptr],
            Instruction::Store { value, ptr } => vec![*value, *ptr],
            Instruction::Binary { lhs, rhs, .. }
            | Instruction::ICmp { lhs, rhs, .. }
            | Instruction::FCmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Instruction::FNeg { operand, .. } | Instruction::ZExt { operand, .. } => {
                vec![*operand]
            }
            Instruction::Call { args, .. } => args.clone(),
        }
    }
}

/// Терминатор блока.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    /// `ret` со значением или без
    Return(Option<Value>),
    /// Безусловный переход
    Branch(BlockId),
    /// Условный переход по `i1`
    CondBranch {
        condition: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return(_) => Vec::new(),
            Terminator::Branch(target) => vec![*target],
            Terminator::CondBranch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
        }
    }
}

/// Базовый блок: линейная последовательность инструкций и один терминатор.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
    /// `None`, пока блок строится
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(label: String) -> Self {
        Self {
            label,
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// Параметр функции.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Описание локального значения: имя в текстовой форме и тип.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Local {
    pub name: String,
    pub ty: Type,
}

/// Функция. Функция без блоков является объявлением (`declare`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub blocks: Vec<BasicBlock>,
    pub locals: Vec<Local>,
    /// Занятые имена: значения, параметры и метки блоков делят одно
    /// пространство имён.
    #[serde(skip)]
    names: HashSet<String>,
    /// Последний выданный суффикс для каждого базового имени.
    #[serde(skip)]
    suffixes: HashMap<String, usize>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: Type) -> Self {
        let mut function = Self {
            name: name.into(),
            params: Vec::new(),
            return_type,
            blocks: Vec::new(),
            locals: Vec::new(),
            names: HashSet::new(),
            suffixes: HashMap::new(),
        };
        for param in params {
            let name = function.unique_name(&param.name);
            function.params.push(Parameter::new(name, param.ty));
        }
        function
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty).collect()
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0)
    }

    /// Найти блок по метке.
    pub fn block_by_label(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn local(&self, id: LocalId) -> Option<&Local> {
        self.locals.get(id.0)
    }

    /// Все инструкции функции в порядке блоков.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    /// Занять имя, добавив числовой суффикс при конфликте
    /// (`tmp`, `tmp1`, `tmp2`, ...).
    pub(crate) fn unique_name(&mut self, base: &str) -> String {
        if self.names.insert(base.to_string()) {
            return base.to_string();
        }
        let counter = self.suffixes.entry(base.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}{}", base, counter);
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    pub(crate) fn add_block(&mut self, label: &str) -> BlockId {
        let label = self.unique_name(label);
        self.blocks.push(BasicBlock::new(label));
        BlockId(self.blocks.len() - 1)
    }

    pub(crate) fn add_local(&mut self, name: &str, ty: Type) -> LocalId {
        let name = self.unique_name(name);
        self.locals.push(Local { name, ty });
        LocalId(self.locals.len() - 1)
    }
}

/// Глобальная строковая константа.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    /// Байты строки без завершающего нуля
    pub bytes: Vec<u8>,
}

impl Global {
    /// Длина массива с завершающим нулём.
    pub fn len_with_nul(&self) -> usize {
        self.bytes.len() + 1
    }
}

/// Модуль: единица трансляции.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// Найти функцию по имени.
    pub fn get_function(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(FunctionId)
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn global(&self, id: GlobalId) -> Option<&Global> {
        self.globals.get(id.0)
    }

    pub(crate) fn add_function(&mut self, function: Function) -> FunctionId {
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    /// Добавить строковую константу (`.str`, `.str.1`, ...).
    pub(crate) fn add_global_string(&mut self, text: &str) -> GlobalId {
        let name = match self.globals.len() {
            0 => ".str".to_string(),
            n => format!(".str.{}", n),
        };
        self.globals.push(Global {
            name,
            bytes: text.as_bytes().to_vec(),
        });
        GlobalId(self.globals.len() - 1)
    }
}
