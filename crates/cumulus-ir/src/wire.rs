// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Serialization to and from the platform's JSON dialect.
//!
//! Two representations of parameter values flow between applets:
//!
//! - *Native* types (primitives, optionals and arrays of them) travel as
//!   the platform's natural JSON, with files as
//!   `{"$dnanexus_link": "file-xxxx"}` objects.
//! - *Composite* types (schemas, hashes, nested arrays, unions) travel as
//!   two sibling fields per logical parameter: `name` holds the value
//!   wrapped under the reserved `___` key, and `name___dxfiles` holds a
//!   flat array of every file link found inside, which the platform uses
//!   to stage and close files.

use crate::error::TypeError;
use crate::types::Type;
use crate::value::Value;
use serde_json::{Map, Value as JsonValue, json};

/// Reserved key wrapping a composite value.
pub const COMPOSITE_KEY: &str = "___";

/// Suffix of the sibling flat-file field of a composite parameter.
pub const FLAT_FILES_SUFFIX: &str = "___dxfiles";

/// Key of a platform object link.
pub const LINK_KEY: &str = "$dnanexus_link";

/// Scheme prefix of platform URIs (`dx://project-xxxx:file-yyyy`).
pub const PLATFORM_URI_PREFIX: &str = "dx://";

/// Render a file URI as a platform link when it addresses a platform
/// object, or as a plain string for external URLs.
pub fn file_link(uri: &str) -> JsonValue {
    if let Some(rest) = uri.strip_prefix(PLATFORM_URI_PREFIX) {
        match rest.split_once(':') {
            Some((project, id)) => json!({ LINK_KEY: { "project": project, "id": id } }),
            None => json!({ LINK_KEY: rest }),
        }
    } else if uri.starts_with("file-") {
        json!({ LINK_KEY: uri })
    } else {
        JsonValue::String(uri.to_string())
    }
}

/// Serialize a value of the given type into the platform JSON dialect.
///
/// The same encoding is used at both levels: natively-typed parameters
/// transmit this JSON directly, composite parameters wrap it under
/// [`COMPOSITE_KEY`].
pub fn value_to_wire(value: &Value, ty: &Type) -> Result<JsonValue, TypeError> {
    let fitted = crate::coercion::coerce_to(value, ty)?;
    Ok(render(&fitted))
}

fn render(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(x) => json!(x),
        Value::String(s) => json!(s),
        Value::File(file) => file_link(&file.uri),
        Value::Folder { uri, basename } => {
            let mut obj = Map::new();
            obj.insert("folder".to_string(), json!(uri));
            if let Some(basename) = basename {
                obj.insert("basename".to_string(), json!(basename));
            }
            JsonValue::Object(obj)
        }
        Value::Archive { uri, basename } => {
            let mut obj = Map::new();
            obj.insert("archive".to_string(), file_link(uri));
            if let Some(basename) = basename {
                obj.insert("basename".to_string(), json!(basename));
            }
            JsonValue::Object(obj)
        }
        Value::Listing { basename, items } => {
            json!({
                "basename": basename,
                "items": items.iter().map(render).collect::<Vec<_>>(),
            })
        }
        Value::Array(items) => JsonValue::Array(items.iter().map(render).collect()),
        Value::Hash(pairs) => {
            let mut obj = Map::new();
            for (key, item) in pairs {
                obj.insert(key.clone(), render(item));
            }
            JsonValue::Object(obj)
        }
    }
}

/// Render one logical parameter as its platform field(s).
///
/// Native types produce a single `(name, json)` field; composite types
/// produce the wrapped field plus the `name___dxfiles` sibling.
pub fn parameter_fields(
    name: &str,
    value: &Value,
    ty: &Type,
) -> Result<Vec<(String, JsonValue)>, TypeError> {
    let wire = value_to_wire(value, ty)?;
    if ty.is_native() {
        return Ok(vec![(name.to_string(), wire)]);
    }
    let links = extract_file_links(&wire);
    Ok(vec![
        (name.to_string(), json!({ COMPOSITE_KEY: wire })),
        (
            format!("{}{}", name, FLAT_FILES_SUFFIX),
            JsonValue::Array(links),
        ),
    ])
}

/// Collect every platform file link inside a wire value, depth-first.
pub fn extract_file_links(wire: &JsonValue) -> Vec<JsonValue> {
    let mut links = Vec::new();
    collect_links(wire, &mut links);
    links
}

fn collect_links(wire: &JsonValue, links: &mut Vec<JsonValue>) {
    match wire {
        JsonValue::Object(obj) if obj.contains_key(LINK_KEY) => {
            links.push(wire.clone());
        }
        JsonValue::Object(obj) => {
            for item in obj.values() {
                collect_links(item, links);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_links(item, links);
            }
        }
        _ => {}
    }
}

/// Deserialize a platform JSON value back into the value model.
pub fn value_from_wire(wire: &JsonValue, ty: &Type) -> Result<Value, TypeError> {
    let mismatch = || TypeError::Mismatch {
        value: wire.to_string(),
        target: ty.to_string(),
    };
    match (wire, ty) {
        (JsonValue::Null, Type::Optional(_)) => Ok(Value::Null),
        (JsonValue::Null, Type::Any) => Ok(Value::Null),
        (w, Type::Optional(inner)) => value_from_wire(w, inner),
        (w, Type::Any) => Ok(untyped_from_wire(w)),

        (JsonValue::Bool(b), Type::Boolean) => Ok(Value::Boolean(*b)),
        (JsonValue::Number(n), Type::Int) => {
            n.as_i64().map(Value::Int).ok_or_else(mismatch)
        }
        (JsonValue::Number(n), Type::Float) => {
            n.as_f64().map(Value::Float).ok_or_else(mismatch)
        }
        (JsonValue::String(s), Type::String) => Ok(Value::String(s.clone())),
        (JsonValue::String(s), Type::Enum { symbols }) if symbols.contains(s) => {
            Ok(Value::String(s.clone()))
        }

        (w, Type::File) => link_to_file(w).ok_or_else(mismatch),
        (JsonValue::String(s), Type::Directory) => Ok(Value::Folder {
            uri: s.clone(),
            basename: None,
        }),
        (JsonValue::Object(obj), Type::Directory) => {
            if let Some(JsonValue::String(uri)) = obj.get("folder") {
                Ok(Value::Folder {
                    uri: uri.clone(),
                    basename: obj
                        .get("basename")
                        .and_then(JsonValue::as_str)
                        .map(str::to_string),
                })
            } else if let Some(archive) = obj.get("archive") {
                let file = link_to_file(archive).ok_or_else(mismatch)?;
                let Value::File(file) = file else {
                    return Err(mismatch());
                };
                Ok(Value::Archive {
                    uri: file.uri,
                    basename: obj
                        .get("basename")
                        .and_then(JsonValue::as_str)
                        .map(str::to_string),
                })
            } else if let (Some(JsonValue::String(basename)), Some(JsonValue::Array(items))) =
                (obj.get("basename"), obj.get("items"))
            {
                let items = items
                    .iter()
                    .map(|item| {
                        // Listing entries are files or nested directories.
                        value_from_wire(item, &Type::File)
                            .or_else(|_| value_from_wire(item, &Type::Directory))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Listing {
                    basename: basename.clone(),
                    items,
                })
            } else {
                Err(mismatch())
            }
        }

        (JsonValue::Array(items), Type::Array { item, non_empty }) => {
            if *non_empty && items.is_empty() {
                return Err(TypeError::EmptyNonEmptyArray {
                    target: ty.to_string(),
                });
            }
            let values = items
                .iter()
                .map(|element| value_from_wire(element, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }

        (JsonValue::Object(obj), Type::Schema(schema)) => {
            let mut pairs = Vec::new();
            for (field_name, field_type) in &schema.fields {
                match obj.get(field_name) {
                    Some(field_wire) => pairs.push((
                        field_name.clone(),
                        value_from_wire(field_wire, field_type)?,
                    )),
                    None if field_type.is_optional() => {}
                    None => {
                        return Err(TypeError::MissingField {
                            field: field_name.clone(),
                            schema: schema.name.clone(),
                        });
                    }
                }
            }
            Ok(Value::Hash(pairs))
        }

        (w, Type::Multi(members)) => members
            .iter()
            .find_map(|member| value_from_wire(w, member).ok())
            .ok_or_else(mismatch),

        _ => Err(mismatch()),
    }
}

/// Unwrap a composite parameter field back into its wire value.
pub fn unwrap_composite(field: &JsonValue) -> Option<&JsonValue> {
    field.as_object().and_then(|obj| obj.get(COMPOSITE_KEY))
}

fn link_to_file(wire: &JsonValue) -> Option<Value> {
    match wire {
        JsonValue::String(uri) => Some(Value::file(uri.clone())),
        JsonValue::Object(obj) => match obj.get(LINK_KEY)? {
            JsonValue::String(id) => Some(Value::file(id.clone())),
            JsonValue::Object(link) => {
                let project = link.get("project")?.as_str()?;
                let id = link.get("id")?.as_str()?;
                Some(Value::file(format!(
                    "{}{}:{}",
                    PLATFORM_URI_PREFIX, project, id
                )))
            }
            _ => None,
        },
        _ => None,
    }
}

fn untyped_from_wire(wire: &JsonValue) -> Value {
    match wire {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(0.0))),
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(untyped_from_wire).collect()),
        JsonValue::Object(obj) if obj.contains_key(LINK_KEY) => {
            link_to_file(wire).unwrap_or(Value::Null)
        }
        JsonValue::Object(obj) => Value::Hash(
            obj.iter()
                .map(|(key, item)| (key.clone(), untyped_from_wire(item)))
                .collect(),
        ),
    }
}
