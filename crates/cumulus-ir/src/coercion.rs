// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Value-to-type coercion.
//!
//! The translators use these rules to fit constant-folded defaults to
//! declared types; the runtime executors apply the same rules when fitting
//! caller-supplied values to parameters, so both sides agree on what fits.
//!
//! # Supported coercions
//!
//! | From | To | Rule |
//! |------|-----|------|
//! | Null | Optional(T), Any | always |
//! | Int | Float | widening |
//! | Float | Int | only when exact |
//! | String | File / Directory | URI interpretation |
//! | File | String | only a bare URI (no contents, no secondaries) |
//! | Array | Array | item-wise; empty never fits non-empty |
//! | Hash | Schema | keys ⊆ fields, missing fields optional |

use crate::error::TypeError;
use crate::types::{SchemaType, Type};
use crate::value::Value;

/// Coerce `value` to fit `target`, or explain why it cannot.
///
/// Idempotent: coercing an already-coerced value is the identity.
pub fn coerce_to(value: &Value, target: &Type) -> Result<Value, TypeError> {
    match (value, target) {
        (v, Type::Any) => Ok(v.clone()),
        (Value::Null, Type::Optional(_)) => Ok(Value::Null),
        (v, Type::Optional(inner)) => coerce_to(v, inner),
        (Value::Null, other) => Err(TypeError::NullNotAllowed {
            target: other.to_string(),
        }),

        (Value::Boolean(b), Type::Boolean) => Ok(Value::Boolean(*b)),
        (Value::Int(i), Type::Int) => Ok(Value::Int(*i)),
        (Value::Int(i), Type::Float) => Ok(Value::Float(*i as f64)),
        (Value::Float(x), Type::Float) => Ok(Value::Float(*x)),
        (Value::Float(x), Type::Int) if x.fract() == 0.0 => Ok(Value::Int(*x as i64)),
        (Value::String(s), Type::String) => Ok(Value::String(s.clone())),

        (Value::String(s), Type::File) => Ok(Value::file(s.clone())),
        (Value::String(s), Type::Directory) => Ok(Value::Folder {
            uri: s.clone(),
            basename: None,
        }),
        (Value::File(file), Type::File) => Ok(Value::File(file.clone())),
        (Value::File(file), Type::String)
            if file.contents.is_none() && file.secondary_files.is_empty() =>
        {
            Ok(Value::String(file.uri.clone()))
        }
        (Value::Folder { uri, basename }, Type::Directory) => Ok(Value::Folder {
            uri: uri.clone(),
            basename: basename.clone(),
        }),
        (Value::Archive { uri, basename }, Type::Directory) => Ok(Value::Archive {
            uri: uri.clone(),
            basename: basename.clone(),
        }),
        (Value::Listing { basename, items }, Type::Directory) => Ok(Value::Listing {
            basename: basename.clone(),
            items: items.clone(),
        }),
        (Value::Folder { uri, .. }, Type::String) => Ok(Value::String(uri.clone())),

        (Value::String(s), Type::Enum { symbols }) if symbols.iter().any(|sym| sym == s) => {
            Ok(Value::String(s.clone()))
        }

        (Value::Array(items), Type::Array { item, non_empty }) => {
            if *non_empty && items.is_empty() {
                return Err(TypeError::EmptyNonEmptyArray {
                    target: target.to_string(),
                });
            }
            let coerced = items
                .iter()
                .map(|element| coerce_to(element, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(coerced))
        }

        (Value::Hash(pairs), Type::Schema(schema)) => coerce_hash(pairs, schema),

        (v, Type::Multi(members)) => members
            .iter()
            .find_map(|member| coerce_to(v, member).ok())
            .ok_or_else(|| TypeError::Mismatch {
                value: v.to_string(),
                target: target.to_string(),
            }),

        (v, t) => Err(TypeError::Mismatch {
            value: v.to_string(),
            target: t.to_string(),
        }),
    }
}

/// Fit a hash to a schema: every key must name a field, every absent field
/// must be optional. The result is reordered to schema field order.
fn coerce_hash(pairs: &[(String, Value)], schema: &SchemaType) -> Result<Value, TypeError> {
    let schema_display = if schema.name.is_empty() {
        "Hash".to_string()
    } else {
        schema.name.clone()
    };

    for (key, _) in pairs {
        if schema.field(key).is_none() {
            return Err(TypeError::UnknownField {
                field: key.clone(),
                schema: schema_display.clone(),
            });
        }
    }

    let mut coerced = Vec::with_capacity(schema.fields.len());
    for (field_name, field_type) in &schema.fields {
        match pairs.iter().find(|(key, _)| key == field_name) {
            Some((_, value)) => {
                coerced.push((field_name.clone(), coerce_to(value, field_type)?));
            }
            None if field_type.is_optional() => {}
            None => {
                return Err(TypeError::MissingField {
                    field: field_name.clone(),
                    schema: schema_display.clone(),
                });
            }
        }
    }
    Ok(Value::Hash(coerced))
}
