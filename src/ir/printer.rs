//! Текстовая форма IR в синтаксисе ассемблера LLVM (непрозрачные указатели).

use super::*;
use std::fmt;

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I32 => "i32",
            Type::F64 => "double",
            Type::Ptr => "ptr",
        };
        f.write_str(name)
    }
}

/// Операнд в контексте функции и модуля (имена нужны для `%x` / `@x`).
struct Operand<'a> {
    value: Value,
    function: &'a Function,
    module: &'a Module,
}

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::ConstInt { ty: Type::I1, value } => {
                write!(f, "{}", if value != 0 { "true" } else { "false" })
            }
            Value::ConstInt { value, .. } => write!(f, "{}", value),
            // LLVM принимает double в виде шестнадцатеричного битового образа
            Value::ConstFloat(value) => write!(f, "0x{:016X}", value.to_bits()),
            Value::Global(id) => match self.module.global(id) {
                Some(global) => write!(f, "@{}", global.name),
                None => write!(f, "@<bad-global-{}>", id.0),
            },
            Value::Param { index, .. } => match self.function.params.get(index) {
                Some(param) => write!(f, "%{}", param.name),
                None => write!(f, "%<bad-param-{}>", index),
            },
            Value::Local { id, .. } => match self.function.local(id) {
                Some(local) => write!(f, "%{}", local.name),
                None => write!(f, "%<bad-local-{}>", id.0),
            },
        }
    }
}

/// Экранировать байты строки для `c"..."`.
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if byte.is_ascii_graphic() && byte != b'"' && byte != b'\\' || byte == b' ' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("\\{:02X}", byte));
        }
    }
    out
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(
                f,
                "@{} = private unnamed_addr constant [{} x i8] c\"{}\\00\", align 1",
                global.name,
                global.len_with_nul(),
                escape_bytes(&global.bytes)
            )?;
        }

        for function in &self.functions {
            writeln!(f)?;
            write_function(f, function, self)?;
        }

        Ok(())
    }
}

fn write_function(f: &mut fmt::Formatter<'_>, function: &Function, module: &Module) -> fmt::Result {
    if function.is_declaration() {
        let params: Vec<String> = function.params.iter().map(|p| p.ty.to_string()).collect();
        return writeln!(
            f,
            "declare {} @{}({})",
            function.return_type,
            function.name,
            params.join(", ")
        );
    }

    let params: Vec<String> = function
        .params
        .iter()
        .map(|p| format!("{} %{}", p.ty, p.name))
        .collect();
    writeln!(
        f,
        "define {} @{}({}) {{",
        function.return_type,
        function.name,
        params.join(", ")
    )?;

    for (i, block) in function.blocks.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        writeln!(f, "{}:", block.label)?;
        for instruction in &block.instructions {
            write!(f, "  ")?;
            write_instruction(f, instruction, function, module)?;
            writeln!(f)?;
        }
        if let Some(terminator) = &block.terminator {
            write!(f, "  ")?;
            write_terminator(f, terminator, function, module)?;
            writeln!(f)?;
        }
    }

    writeln!(f, "}}")
}

fn local_name(function: &Function, id: LocalId) -> &str {
    function.local(id).map(|l| l.name.as_str()).unwrap_or("<bad-local>")
}

fn write_instruction(
    f: &mut fmt::Formatter<'_>,
    instruction: &Instruction,
    function: &Function,
    module: &Module,
) -> fmt::Result {
    let op = |value: Value| Operand {
        value,
        function,
        module,
    };

    match instruction {
        Instruction::Alloca { result, ty } => write!(
            f,
            "%{} = alloca {}, align {}",
            local_name(function, *result),
            ty,
            ty.align()
        ),
        Instruction::Load { result, ty, ptr } => write!(
            f,
            "%{} = load {}, ptr {}, align {}",
            local_name(function, *result),
            ty,
            op(*ptr),
            ty.align()
        ),
        Instruction::Store { value, ptr } => write!(
            f,
            "store {} {}, ptr {}, align {}",
            value.ty(),
            op(*value),
            op(*ptr),
            value.ty().align()
        ),
        Instruction::Binary {
            result,
            op: binary,
            lhs,
            rhs,
        } => write!(
            f,
            "%{} = {} {} {}, {}",
            local_name(function, *result),
            binary.mnemonic(),
            lhs.ty(),
            op(*lhs),
            op(*rhs)
        ),
        Instruction::ICmp {
            result,
            predicate,
            lhs,
            rhs,
        } => write!(
            f,
            "%{} = icmp {} {} {}, {}",
            local_name(function, *result),
            predicate.mnemonic(),
            lhs.ty(),
            op(*lhs),
            op(*rhs)
        ),
        Instruction::FCmp {
            result,
            predicate,
            lhs,
            rhs,
        } => write!(
            f,
            "%{} = fcmp {} {} {}, {}",
            local_name(function, *result),
            predicate.mnemonic(),
            lhs.ty(),
            op(*lhs),
            op(*rhs)
        ),
        Instruction::FNeg { result, operand } => write!(
            f,
            "%{} = fneg {} {}",
            local_name(function, *result),
            operand.ty(),
            op(*operand)
        ),
        Instruction::ZExt {
            result,
            operand,
            ty,
        } => write!(
            f,
            "%{} = zext {} {} to {}",
            local_name(function, *result),
            operand.ty(),
            op(*operand),
            ty
        ),
        Instruction::Call {
            result,
            callee,
            args,
        } => {
            let (name, return_type) = match module.function(*callee) {
                Some(callee) => (callee.name.as_str(), callee.return_type),
                None => ("<bad-function>", Type::Void),
            };
            if let Some(result) = result {
                write!(f, "%{} = ", local_name(function, *result))?;
            }
            let args: Vec<String> = args
                .iter()
                .map(|arg| format!("{} {}", arg.ty(), op(*arg)))
                .collect();
            write!(f, "call {} @{}({})", return_type, name, args.join(", "))
        }
    }
}

fn write_terminator(
    f: &mut fmt::Formatter<'_>,
    terminator: &Terminator,
    function: &Function,
    module: &Module,
) -> fmt::Result {
    let label = |id: BlockId| {
        function
            .block(id)
            .map(|b| b.label.as_str())
            .unwrap_or("<bad-block>")
    };

    match terminator {
        Terminator::Return(None) => write!(f, "ret void"),
        Terminator::Return(Some(value)) => write!(
            f,
            "ret {} {}",
            value.ty(),
            Operand {
                value: *value,
                function,
                module
            }
        ),
        Terminator::Branch(target) => write!(f, "br label %{}", label(*target)),
        Terminator::CondBranch {
            condition,
            then_block,
            else_block,
        } => write!(
            f,
            "br i1 {}, label %{}, label %{}",
            Operand {
                value: *condition,
                function,
                module
            },
            label(*then_block),
            label(*else_block)
        ),
    }
}
