// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Language-neutral type model.
//!
//! Every source language (WDL, CWL) lowers its declared types into this one
//! vocabulary. The same types are used by the translators, the build request
//! renderer, and the runtime executors, so the model lives in the IR crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A type in the language-neutral model.
///
/// `Optional(Optional(_))` is never constructed by [`Type::normalize`];
/// callers that build types by hand should normalize before comparing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Type {
    /// True/false.
    Boolean,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    String,
    /// A platform file object or URI.
    File,
    /// A directory (folder URI, archive, or unmaterialized listing).
    Directory,
    /// Homogeneous array. `non_empty` carries the source language's
    /// non-empty quantifier (`Array[T]+` in WDL).
    Array {
        /// Element type.
        item: Box<Type>,
        /// Whether the source declared the array as non-empty.
        non_empty: bool,
    },
    /// A value that may be absent.
    Optional(Box<Type>),
    /// One of several alternative types (CWL unions). Members are distinct
    /// and non-optional after normalization.
    Multi(Vec<Type>),
    /// Any value at all; no coercion is performed.
    Any,
    /// A named record with ordered fields. An empty name denotes an
    /// anonymous schema (a plain hash).
    Schema(SchemaType),
    /// A closed set of string symbols.
    Enum {
        /// The allowed symbols, in declaration order.
        symbols: Vec<String>,
    },
}

/// A named record type with ordered fields.
///
/// Field order is preserved for display and wire layout, but equality is
/// order-insensitive: two schemas with the same name and the same
/// field-name-to-type mapping are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaType {
    /// Schema name; empty for anonymous hashes.
    pub name: String,
    /// Ordered `(field name, field type)` pairs.
    pub fields: Vec<(String, Type)>,
}

impl PartialEq for SchemaType {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.fields.len() != other.fields.len() {
            return false;
        }
        self.fields.iter().all(|(name, ty)| {
            other
                .fields
                .iter()
                .any(|(other_name, other_ty)| name == other_name && ty == other_ty)
        })
    }
}

impl SchemaType {
    /// An anonymous schema (hash) with the given fields.
    pub fn anonymous(fields: Vec<(String, Type)>) -> Self {
        Self {
            name: String::new(),
            fields,
        }
    }

    /// Look up a field type by name.
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, ty)| ty)
    }
}

impl Type {
    /// Whether this is one of the six platform primitives.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Boolean | Type::Int | Type::Float | Type::String | Type::File | Type::Directory
        )
    }

    /// Whether this type maps to a single platform parameter.
    ///
    /// Primitives, optionals of native types, and arrays of native types
    /// are native. Everything else uses the composite two-field wire
    /// encoding.
    pub fn is_native(&self) -> bool {
        match self {
            t if t.is_primitive() => true,
            Type::Optional(inner) => inner.is_native(),
            Type::Array { item, .. } => item.is_native(),
            _ => false,
        }
    }

    /// Whether this type is `Optional(_)`.
    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    /// Wrap in `Optional` unless already optional. Never double-wraps.
    pub fn ensure_optional(self) -> Type {
        match self {
            Type::Optional(_) => self,
            other => Type::Optional(Box::new(other)),
        }
    }

    /// Strip one level of `Optional`, if present.
    pub fn unwrap_optional(&self) -> &Type {
        match self {
            Type::Optional(inner) => inner,
            other => other,
        }
    }

    /// Canonical form of this type. Idempotent.
    ///
    /// Collapses nested optionals, deduplicates `Multi` members (hoisting
    /// member optionality onto the union itself), and clears a non-empty
    /// array quantifier whose item type can be absent.
    pub fn normalize(&self) -> Type {
        match self {
            Type::Optional(inner) => {
                let inner = inner.normalize();
                match inner {
                    Type::Optional(_) => inner,
                    other => Type::Optional(Box::new(other)),
                }
            }
            Type::Array { item, non_empty } => {
                let item = item.normalize();
                let non_empty = *non_empty && !item.admits_absence();
                Type::Array {
                    item: Box::new(item),
                    non_empty,
                }
            }
            Type::Multi(members) => {
                let mut optional = false;
                let mut distinct: Vec<Type> = Vec::new();
                for member in members {
                    let mut member = member.normalize();
                    if let Type::Optional(inner) = member {
                        optional = true;
                        member = *inner;
                    }
                    if !distinct.contains(&member) {
                        distinct.push(member);
                    }
                }
                let multi = if distinct.len() == 1 {
                    distinct.into_iter().next().expect("one member")
                } else {
                    Type::Multi(distinct)
                };
                if optional { multi.ensure_optional() } else { multi }
            }
            Type::Schema(schema) => Type::Schema(SchemaType {
                name: schema.name.clone(),
                fields: schema
                    .fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.normalize()))
                    .collect(),
            }),
            other => other.clone(),
        }
    }

    /// Whether a value of this type may be absent: the type itself is
    /// optional, or it is a union with an optional member.
    fn admits_absence(&self) -> bool {
        match self {
            Type::Optional(_) => true,
            Type::Multi(members) => members.iter().any(Type::admits_absence),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "Boolean"),
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::String => write!(f, "String"),
            Type::File => write!(f, "File"),
            Type::Directory => write!(f, "Directory"),
            Type::Array { item, non_empty } => {
                write!(f, "Array[{}]{}", item, if *non_empty { "+" } else { "" })
            }
            Type::Optional(inner) => write!(f, "{}?", inner),
            Type::Multi(members) => {
                write!(f, "Multi(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, ")")
            }
            Type::Any => write!(f, "Any"),
            Type::Schema(schema) if schema.name.is_empty() => write!(f, "Hash"),
            Type::Schema(schema) => write!(f, "{}", schema.name),
            Type::Enum { symbols } => write!(f, "Enum[{}]", symbols.join(",")),
        }
    }
}

/// Schema lowering of a source `Pair[L, R]`: fields `left` and `right`,
/// with the name the runtime recognizes for unpacking.
pub fn pair_schema(left: Type, right: Type) -> SchemaType {
    SchemaType {
        name: format!("Pair___({}, {})", left, right),
        fields: vec![("left".to_string(), left), ("right".to_string(), right)],
    }
}

/// Schema lowering of a source `Map[K, V]`: parallel `keys` and `values`
/// arrays of equal length, pairwise index defining the mapping.
pub fn map_schema(key: Type, value: Type) -> SchemaType {
    SchemaType {
        name: format!("Map___[{}, {}]", key, value),
        fields: vec![
            (
                "keys".to_string(),
                Type::Array {
                    item: Box::new(key),
                    non_empty: false,
                },
            ),
            (
                "values".to_string(),
                Type::Array {
                    item: Box::new(value),
                    non_empty: false,
                },
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(item: Type, non_empty: bool) -> Type {
        Type::Array {
            item: Box::new(item),
            non_empty,
        }
    }

    #[test]
    fn test_normalize_collapses_nested_optionals() {
        let nested = Type::Optional(Box::new(Type::Optional(Box::new(Type::Int))));
        assert_eq!(nested.normalize(), Type::Optional(Box::new(Type::Int)));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let types = vec![
            Type::Optional(Box::new(Type::Optional(Box::new(Type::String)))),
            array(Type::Optional(Box::new(Type::File)), true),
            Type::Multi(vec![Type::Int, Type::Int, Type::Optional(Box::new(Type::String))]),
        ];
        for ty in types {
            let once = ty.normalize();
            assert_eq!(once.normalize(), once);
        }
    }

    #[test]
    fn test_normalize_clears_non_empty_for_optional_items() {
        let ty = array(Type::Optional(Box::new(Type::Int)), true);
        match ty.normalize() {
            Type::Array { non_empty, .. } => assert!(!non_empty),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_keeps_non_empty_for_required_items() {
        let ty = array(Type::Int, true);
        match ty.normalize() {
            Type::Array { non_empty, .. } => assert!(non_empty),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_multi_dedupes_and_hoists_optional() {
        let ty = Type::Multi(vec![
            Type::Int,
            Type::Optional(Box::new(Type::String)),
            Type::Int,
        ]);
        assert_eq!(
            ty.normalize(),
            Type::Optional(Box::new(Type::Multi(vec![Type::Int, Type::String])))
        );
    }

    #[test]
    fn test_ensure_optional_never_double_wraps() {
        let once = Type::Int.ensure_optional();
        let twice = once.clone().ensure_optional();
        assert_eq!(once, twice);
        assert_eq!(twice, Type::Optional(Box::new(Type::Int)));
    }

    #[test]
    fn test_is_native() {
        assert!(Type::Int.is_native());
        assert!(Type::File.is_native());
        assert!(array(Type::String, false).is_native());
        assert!(Type::Optional(Box::new(array(Type::File, false))).is_native());
        // Nativeness is recursive: nested arrays and arrays of optionals
        // are still a single platform parameter.
        assert!(array(array(Type::Int, false), false).is_native());
        assert!(array(Type::Optional(Box::new(Type::Int)), false).is_native());

        assert!(!Type::Schema(SchemaType::anonymous(vec![])).is_native());
        assert!(!Type::Any.is_native());
        assert!(!Type::Multi(vec![Type::Int, Type::String]).is_native());
        assert!(!array(Type::Schema(SchemaType::anonymous(vec![])), false).is_native());
    }

    #[test]
    fn test_schema_equality_ignores_field_order() {
        let a = SchemaType {
            name: "Sample".to_string(),
            fields: vec![
                ("id".to_string(), Type::String),
                ("reads".to_string(), Type::File),
            ],
        };
        let b = SchemaType {
            name: "Sample".to_string(),
            fields: vec![
                ("reads".to_string(), Type::File),
                ("id".to_string(), Type::String),
            ],
        };
        assert_eq!(a, b);

        let c = SchemaType {
            name: "Sample".to_string(),
            fields: vec![
                ("id".to_string(), Type::String),
                ("reads".to_string(), Type::String),
            ],
        };
        assert_ne!(a, c);
    }

    #[test]
    fn test_pair_and_map_schema_names() {
        assert_eq!(pair_schema(Type::Int, Type::String).name, "Pair___(Int, String)");
        let map = map_schema(Type::String, Type::File);
        assert_eq!(map.name, "Map___[String, File]");
        assert_eq!(map.fields[0].0, "keys");
        assert_eq!(map.fields[1].0, "values");
    }

    #[test]
    fn test_display() {
        assert_eq!(array(Type::Int, true).to_string(), "Array[Int]+");
        assert_eq!(
            Type::Optional(Box::new(Type::File)).to_string(),
            "File?"
        );
        assert_eq!(
            Type::Schema(SchemaType::anonymous(vec![])).to_string(),
            "Hash"
        );
    }
}
