//! JSON payload path resolution.
//!
//! Paths are walked over borrowed [`RawValue`] nodes so the resolved value is
//! returned exactly as it appears in the payload: number spelling, key order,
//! and whitespace inside nested values are preserved.

use std::collections::BTreeMap;

use serde_json::value::RawValue;

use super::{RequestPart, not_found};
use crate::error::ExtractionError;

pub(super) fn extract(field: &str, payload: &[u8]) -> Result<String, ExtractionError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(not_found(field, RequestPart::Payload));
    }
    let unsupported = |reason: String| ExtractionError::UnsupportedType {
        field: field.to_owned(),
        reason,
    };
    let text = std::str::from_utf8(payload).map_err(|error| unsupported(error.to_string()))?;
    let document: &RawValue =
        serde_json::from_str(text).map_err(|error| unsupported(error.to_string()))?;
    let value = resolve(document, field).ok_or_else(|| not_found(field, RequestPart::Payload))?;
    render(value).map_err(|error| unsupported(error.to_string()))
}

/// Walks `path` through `document`.
///
/// Segments are separated by `.`; a numeric segment or a `[n]` suffix indexes
/// into an array.
fn resolve<'a>(document: &'a RawValue, path: &str) -> Option<&'a RawValue> {
    path.split('.').try_fold(document, |node, segment| {
        let (key, indexes) = split_indexes(segment)?;
        let mut current = if key.is_empty() {
            node
        } else {
            step(node, key)?
        };
        for index in indexes {
            current = element(current, index)?;
        }
        Some(current)
    })
}

fn step<'a>(node: &'a RawValue, key: &str) -> Option<&'a RawValue> {
    let text = node.get();
    if text.starts_with('{') {
        let mut map: BTreeMap<String, &'a RawValue> = serde_json::from_str(text).ok()?;
        map.remove(key)
    } else {
        key.parse::<usize>().ok().and_then(|index| element(node, index))
    }
}

fn element(node: &RawValue, index: usize) -> Option<&RawValue> {
    let text = node.get();
    if !text.starts_with('[') {
        return None;
    }
    let items: Vec<&RawValue> = serde_json::from_str(text).ok()?;
    items.get(index).copied()
}

/// Splits `items[0][1]` into `("items", [0, 1])`.
fn split_indexes(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let (key, mut rest) = segment.split_at(open);
    let mut indexes = Vec::new();
    while let Some(tail) = rest.strip_prefix('[') {
        let (digits, remainder) = tail.split_once(']')?;
        indexes.push(digits.parse().ok()?);
        rest = remainder;
    }
    rest.is_empty().then_some((key, indexes))
}

/// Strings are unescaped, `null` is empty, and anything else is the literal
/// payload text.
fn render(value: &RawValue) -> Result<String, serde_json::Error> {
    let text = value.get();
    if text.starts_with('"') {
        serde_json::from_str(text)
    } else if text == "null" {
        Ok(String::new())
    } else {
        Ok(text.to_owned())
    }
}
