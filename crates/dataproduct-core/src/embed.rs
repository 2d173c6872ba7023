//! Decoding of base64 text fields and inlining of style assets.
//!
//! Every function here is fail-soft: on malformed input a warning is logged
//! and the raw value is returned, so a broken field never aborts a tree.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dataproduct_schema::StyleAsset;
use serde_json::Value;
use tracing::warn;

/// Decode a base64-encoded UTF-8 string. `label` names the field in the
/// warning emitted on failure, in which case `encoded` is returned unchanged.
pub fn decode_base64_text(encoded: &str, label: &str) -> String {
    let compact: String = encoded.split_ascii_whitespace().collect();
    let bytes = match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("could not decode base64 value for {label}: {e}\n{encoded}");
            return encoded.to_owned();
        }
    };
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("base64 value for {label} is not valid UTF-8: {e}\n{encoded}");
            encoded.to_owned()
        }
    }
}

/// Pick the plain value if it is non-empty, else decode the encoded variant.
pub fn resolve_text(plain: Option<&str>, encoded: Option<&str>, label: &str) -> Option<String> {
    if let Some(text) = plain.filter(|s| !s.is_empty()) {
        return Some(text.to_owned());
    }
    encoded
        .filter(|s| !s.is_empty())
        .map(|value| decode_base64_text(value, label))
}

/// Replace every `v="<path>"` reference in a QML style document with the
/// embedded `v="base64:<payload>"` form. Assets whose path does not occur are
/// ignored.
pub fn inline_style_assets(document: &str, assets: &[StyleAsset]) -> String {
    let mut out = document.to_owned();
    for asset in assets {
        let pattern = format!("v=\"{}\"", asset.path);
        let replacement = format!("v=\"base64:{}\"", asset.base64);
        out = out.replace(&pattern, &replacement);
    }
    out
}

/// Metadata delivered as a JSON-encoded string is parsed into structured
/// JSON. Unparsable strings are kept as they are.
pub fn decode_embedded_metadata(value: Value, label: &str) -> Value {
    match value {
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("invalid JSON in {label}: {e}");
                Value::String(raw)
            }
        },
        other => other,
    }
}
