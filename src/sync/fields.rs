//! Forgiving field decoders for upstream documents.
//!
//! A missing, null or wrongly-typed field takes its default instead of
//! failing the whole document. Use with `#[serde(default, deserialize_with = ..)]`.

use serde::de::{Deserializer, IgnoredAny};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Other(IgnoredAny),
}

/// Medal count or rank; 0 unless numeric, clamped to `u16`.
pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let n = match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => n,
        Some(Loose::Float(f)) => f as i64,
        _ => 0,
    };
    Ok(u16::try_from(n.max(0)).unwrap_or(u16::MAX))
}

/// Unix seconds; 0 unless numeric.
pub fn epoch<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => n,
        Some(Loose::Float(f)) => f as i64,
        _ => 0,
    })
}

/// String field; empty unless a JSON string.
pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => s,
        _ => String::new(),
    })
}

/// Boolean field; false unless a JSON boolean.
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(Option::<Loose>::deserialize(deserializer)?, Some(Loose::Bool(true))))
}
