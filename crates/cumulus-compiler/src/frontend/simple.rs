// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! A small, self-contained expression implementation.
//!
//! The workflow translator needs to synthesize references of its own (a
//! conditional's lifted outputs refer to the inner names, fragment outputs
//! refer to call results), and the test suites need a front-end that does
//! not drag a parser in. Both use these nodes. Real front-ends keep their
//! own trees and implement [`Expression`] directly; references to call
//! outputs arrive pre-resolved as whole dotted paths.

use super::{ConstResult, Expr, Expression, RefKind, VarRef};
use cumulus_ir::{Type, Value, coerce_to};
use std::fmt;
use std::sync::Arc;

/// A literal constant.
#[derive(Debug)]
pub struct Literal {
    value: Value,
}

/// A resolved reference to a binding, by dotted path.
#[derive(Debug)]
pub struct Reference {
    path: Vec<String>,
    ty: Type,
    kind: RefKind,
}

/// A syntactic field read on another expression (a pair or struct member).
#[derive(Debug)]
pub struct FieldAccess {
    base: Expr,
    field: String,
    ty: Type,
}

/// An array literal.
#[derive(Debug)]
pub struct ArrayLiteral {
    items: Vec<Expr>,
    item_type: Type,
}

/// A binary operation; folds only when both operands fold.
#[derive(Debug)]
pub struct BinaryOp {
    op: String,
    lhs: Expr,
    rhs: Expr,
}

/// A literal expression.
pub fn lit(value: Value) -> Expr {
    Arc::new(Literal { value })
}

/// An integer literal.
pub fn int(i: i64) -> Expr {
    lit(Value::Int(i))
}

/// A string literal.
pub fn string(s: impl Into<String>) -> Expr {
    lit(Value::String(s.into()))
}

/// A required reference to a dotted path.
pub fn var(path: &str, ty: Type) -> Expr {
    var_kind(path, ty, RefKind::Required)
}

/// A reference with an explicit kind.
pub fn var_kind(path: &str, ty: Type, kind: RefKind) -> Expr {
    Arc::new(Reference {
        path: path.split('.').map(str::to_string).collect(),
        ty,
        kind,
    })
}

/// A field read on a base expression.
pub fn field(base: Expr, field_name: impl Into<String>, ty: Type) -> Expr {
    Arc::new(FieldAccess {
        base,
        field: field_name.into(),
        ty,
    })
}

/// An array literal with the given item type.
pub fn array(items: Vec<Expr>, item_type: Type) -> Expr {
    Arc::new(ArrayLiteral { items, item_type })
}

/// A binary operation.
pub fn binop(op: impl Into<String>, lhs: Expr, rhs: Expr) -> Expr {
    Arc::new(BinaryOp {
        op: op.into(),
        lhs,
        rhs,
    })
}

/// Addition.
pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    binop("+", lhs, rhs)
}

impl Expression for Literal {
    fn try_const_eval(&self, target: &Type) -> ConstResult {
        match coerce_to(&self.value, target) {
            Ok(value) => ConstResult::Const(value),
            Err(err) => ConstResult::NonConstant(err.to_string()),
        }
    }

    fn free_variables(&self, _type_hint: &Type, _expand_field_access: bool) -> Vec<VarRef> {
        Vec::new()
    }

    fn is_trivial(&self) -> bool {
        true
    }

    fn as_reference(&self) -> Option<Vec<String>> {
        None
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Expression for Reference {
    fn try_const_eval(&self, _target: &Type) -> ConstResult {
        ConstResult::NonConstant(format!("reference to '{}'", self.path.join(".")))
    }

    fn free_variables(&self, _type_hint: &Type, _expand_field_access: bool) -> Vec<VarRef> {
        vec![VarRef {
            path: self.path.clone(),
            ty: self.ty.clone(),
            kind: self.kind,
        }]
    }

    fn is_trivial(&self) -> bool {
        true
    }

    fn as_reference(&self) -> Option<Vec<String>> {
        Some(self.path.clone())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("."))
    }
}

impl Expression for FieldAccess {
    fn try_const_eval(&self, _target: &Type) -> ConstResult {
        ConstResult::NonConstant(format!("field read '.{}'", self.field))
    }

    fn free_variables(&self, type_hint: &Type, expand_field_access: bool) -> Vec<VarRef> {
        if expand_field_access
            && let Some(mut path) = self.base.as_reference()
        {
            path.push(self.field.clone());
            let kind = self
                .base
                .free_variables(type_hint, expand_field_access)
                .first()
                .map(|r| r.kind)
                .unwrap_or(RefKind::Required);
            return vec![VarRef {
                path,
                ty: self.ty.clone(),
                kind,
            }];
        }
        self.base.free_variables(type_hint, expand_field_access)
    }

    fn is_trivial(&self) -> bool {
        false
    }

    fn as_reference(&self) -> Option<Vec<String>> {
        None
    }
}

impl fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.base, self.field)
    }
}

impl Expression for ArrayLiteral {
    fn try_const_eval(&self, target: &Type) -> ConstResult {
        let item_target = match target.normalize() {
            Type::Array { item, .. } => *item,
            Type::Any => Type::Any,
            other => {
                return ConstResult::NonConstant(format!(
                    "array literal does not fit type {}",
                    other
                ));
            }
        };
        let mut values = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item.try_const_eval(&item_target) {
                ConstResult::Const(value) => values.push(value),
                non_constant @ ConstResult::NonConstant(_) => return non_constant,
            }
        }
        ConstResult::Const(Value::Array(values))
    }

    fn free_variables(&self, type_hint: &Type, expand_field_access: bool) -> Vec<VarRef> {
        self.items
            .iter()
            .flat_map(|item| item.free_variables(type_hint, expand_field_access))
            .collect()
    }

    fn is_trivial(&self) -> bool {
        // A literal collection of literals; references inside make the
        // array a runtime construction.
        self.items
            .iter()
            .all(|item| matches!(item.try_const_eval(&Type::Any), ConstResult::Const(_)))
    }

    fn as_reference(&self) -> Option<Vec<String>> {
        None
    }
}

impl fmt::Display for ArrayLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

impl ArrayLiteral {
    /// The declared item type.
    pub fn item_type(&self) -> &Type {
        &self.item_type
    }
}

impl Expression for BinaryOp {
    fn try_const_eval(&self, target: &Type) -> ConstResult {
        let lhs = match self.lhs.try_const_eval(&Type::Any) {
            ConstResult::Const(value) => value,
            non_constant => return non_constant,
        };
        let rhs = match self.rhs.try_const_eval(&Type::Any) {
            ConstResult::Const(value) => value,
            non_constant => return non_constant,
        };
        let folded = match (self.op.as_str(), &lhs, &rhs) {
            ("+", Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            ("-", Value::Int(a), Value::Int(b)) => Value::Int(a - b),
            ("*", Value::Int(a), Value::Int(b)) => Value::Int(a * b),
            ("+", Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            ("+", Value::String(a), Value::String(b)) => Value::String(format!("{}{}", a, b)),
            _ => {
                return ConstResult::NonConstant(format!(
                    "operator '{}' is not constant-foldable for {} and {}",
                    self.op, lhs, rhs
                ));
            }
        };
        match coerce_to(&folded, target) {
            Ok(value) => ConstResult::Const(value),
            Err(err) => ConstResult::NonConstant(err.to_string()),
        }
    }

    fn free_variables(&self, type_hint: &Type, expand_field_access: bool) -> Vec<VarRef> {
        let mut refs = self.lhs.free_variables(type_hint, expand_field_access);
        refs.extend(self.rhs.free_variables(type_hint, expand_field_access));
        refs
    }

    fn is_trivial(&self) -> bool {
        false
    }

    fn as_reference(&self) -> Option<Vec<String>> {
        None
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.lhs, self.op, self.rhs)
    }
}
