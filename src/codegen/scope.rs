//! Стек областей видимости генератора.
//!
//! Блок открывает область, которая видит внешние привязки; тело функции
//! открывает область-барьер: слоты внешней функции живут в чужом кадре
//! стека, поэтому поиск на барьере останавливается. При выходе область
//! снимается целиком, и внешние привязки восстанавливаются как были.

use std::collections::HashMap;

use crate::ir::{Type, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Тело функции (или программа верхнего уровня)
    Function,
    /// Блок `{ ... }`
    Block,
}

/// Привязка имени: слот `alloca` и тип, под который он выделен.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding {
    pub slot: Value,
    pub ty: Type,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    slots: HashMap<String, Binding>,
}

/// Стек областей: имя переменной → привязка.
#[derive(Debug)]
pub struct Scopes {
    stack: Vec<Scope>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    /// Стек с одной областью верхнего уровня.
    pub fn new() -> Self {
        Self {
            stack: vec![Scope {
                kind: ScopeKind::Function,
                slots: HashMap::new(),
            }],
        }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.stack.push(Scope {
            kind,
            slots: HashMap::new(),
        });
    }

    /// Снять внутреннюю область. Область верхнего уровня не снимается.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Привязать имя в текущей области (повторное объявление перекрывает).
    pub fn define(&mut self, name: &str, slot: Value, ty: Type) {
        if let Some(scope) = self.stack.last_mut() {
            scope.slots.insert(name.to_string(), Binding { slot, ty });
        }
    }

    /// Найти привязку, двигаясь наружу до ближайшей области функции.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        for scope in self.stack.iter().rev() {
            if let Some(binding) = scope.slots.get(name) {
                return Some(*binding);
            }
            if scope.kind == ScopeKind::Function {
                break;
            }
        }
        None
    }
}
