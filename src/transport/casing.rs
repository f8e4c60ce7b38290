//! Key-casing normalization between the caller's camelCase and the wire's snake_case.
//!
//! Only object keys are rewritten. Values of every other kind pass through.
//! `serde_json::Value` cannot be cyclic, but nesting past [`MAX_DEPTH`] is left as-is.

use serde_json::{Map, Value};

pub const MAX_DEPTH: usize = 128;

/// `chiefComplaint` -> `chief_complaint`, `UserId` -> `user_id`.
///
/// Only ASCII capitals start a new word, but every letter is lowercased.
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// `chief_complaint` -> `chiefComplaint`. An underscore not followed by a
/// lowercase ASCII letter is kept.
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('_', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn keys_to_snake(value: Value) -> Value {
    rewrite_keys(value, &camel_to_snake, 0)
}

pub fn keys_to_camel(value: Value) -> Value {
    rewrite_keys(value, &snake_to_camel, 0)
}

fn rewrite_keys(value: Value, rename: &dyn Fn(&str) -> String, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return value;
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                out.insert(rename(&key), rewrite_keys(inner, rename, depth + 1));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rewrite_keys(item, rename, depth + 1))
                .collect(),
        ),
        other => other,
    }
}
