//! Field-level tolerant deserializers for inbound payloads.
//!
//! Inbound messages are applied field by field: a field that is missing or has
//! the wrong shape becomes `None` instead of failing the whole message. Use with
//! `#[serde(default, deserialize_with = "...")]` on `Option` fields.
//!
//! Historical key spellings are folded onto the canonical key before typed
//! decoding (see [`Normalize`]), so a payload carrying both spellings of one
//! field still decodes.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::PlayerId;

/// `(canonical key, historical spellings)` pairs for one payload type.
pub type Aliases = &'static [(&'static str, &'static [&'static str])];

/// A payload decoded through [`decode`], with its historical key spellings.
pub trait Normalize: DeserializeOwned {
    const ALIASES: Aliases;
}

/// Rename historical keys to their canonical spelling.
///
/// The canonical key wins when it is present and not `null`; otherwise the
/// first listed alias that is. Every other spelling is removed.
pub fn fold_aliases(fields: &mut Map<String, Value>, aliases: Aliases) {
    for (canonical, spellings) in aliases {
        let mut chosen = fields.remove(*canonical).filter(|v| !v.is_null());
        for spelling in *spellings {
            match fields.remove(*spelling) {
                Some(value) if chosen.is_none() && !value.is_null() => chosen = Some(value),
                _ => {}
            }
        }
        if let Some(value) = chosen {
            fields.insert((*canonical).to_string(), value);
        }
    }
}

/// Decode a payload object after folding its aliases.
pub fn decode<T: Normalize>(mut value: Value) -> Result<T, serde_json::Error> {
    if let Value::Object(fields) = &mut value {
        fold_aliases(fields, T::ALIASES);
    }
    serde_json::from_value(value)
}

/// Deserialize any `T`, mapping a shape mismatch to `None`.
pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(from_value(value))
}

/// Deserialize a list, dropping elements that fail to decode.
///
/// A non-array value yields `None`.
pub fn list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    list_with(deserializer, from_value)
}

/// [`list`] for elements that carry their own key aliases.
pub fn normalized_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Normalize,
{
    list_with(deserializer, normalized)
}

fn list_with<'de, D, T>(
    deserializer: D,
    item: fn(Value) -> Option<T>,
) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(items.into_iter().filter_map(item).collect())),
        Value::Null => Ok(None),
        other => {
            tracing::debug!(value = %other, "Expected a list, ignoring field");
            Ok(None)
        }
    }
}

/// Deserialize a player roster sent either as a list of player objects or as
/// an object keyed by player id. For the keyed form, the key fills in a
/// missing `id`.
pub fn roster<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Normalize,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(items.into_iter().filter_map(normalized).collect())),
        Value::Object(entries) => Ok(Some(
            entries
                .into_iter()
                .filter_map(|(id, mut entry)| {
                    if let Value::Object(fields) = &mut entry {
                        fields.entry("id").or_insert_with(|| Value::String(id));
                    }
                    normalized(entry)
                })
                .collect(),
        )),
        Value::Null => Ok(None),
        other => {
            tracing::debug!(value = %other, "Expected a roster, ignoring field");
            Ok(None)
        }
    }
}

/// Deserialize a non-negative whole count (seconds, points).
///
/// Floats are truncated, negatives clamp to zero, numeric strings are parsed.
pub fn count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value))
}

/// Deserialize a signed whole number (score deltas).
pub fn signed<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Deserialize a `{ player_id: seconds }` map, skipping unusable entries.
pub fn seconds_by_player<'de, D>(deserializer: D) -> Result<Option<Vec<(PlayerId, u32)>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(entries) => Ok(Some(
            entries
                .into_iter()
                .filter_map(|(id, secs)| Some((PlayerId::new(id), count_from_value(&secs)?)))
                .collect(),
        )),
        _ => Ok(None),
    }
}

fn count_from_value(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.max(0.0).min(f64::from(u32::MAX)) as u32)
}

fn from_value<T: DeserializeOwned>(value: Value) -> Option<T> {
    keep(value, serde_json::from_value)
}

fn normalized<T: Normalize>(value: Value) -> Option<T> {
    keep(value, decode)
}

fn keep<T>(value: Value, decode: fn(Value) -> Result<T, serde_json::Error>) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match decode(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, "Dropping malformed field");
            None
        }
    }
}
