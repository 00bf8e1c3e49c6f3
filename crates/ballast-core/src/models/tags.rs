//! Tag list encoding.
//!
//! Tags travel as a JSON array of strings when stored as text. Decoding is
//! lenient: anything that is not a well-formed array of strings becomes an
//! empty list.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Encode tags to their stored text form.
#[must_use]
pub fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Decode stored tag text, falling back to an empty list on malformed data.
#[must_use]
pub fn decode_tags(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => tags,
        Err(error) => {
            tracing::warn!("Discarding malformed tag data: {}", error);
            Vec::new()
        }
    }
}

/// Trim tags and drop empty ones, keeping the caller's order.
#[must_use]
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Serde adapter accepting an array of strings or an encoded string.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(raw) => decode_tags(&raw),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(tag) => Some(tag),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_tags_returns_stored_order() {
        let tags = vec!["morning".to_string(), "after-run".to_string()];
        assert_eq!(decode_tags(&encode_tags(&tags)), tags);
    }

    #[test]
    fn decode_tags_degrades_malformed_text_to_empty() {
        assert!(decode_tags("not json").is_empty());
        assert!(decode_tags("{\"a\":1}").is_empty());
        assert!(decode_tags("[1, 2]").is_empty());
        assert!(decode_tags("").is_empty());
    }

    #[test]
    fn normalize_tags_trims_and_drops_empty() {
        let tags = normalize_tags(vec![" a ".to_string(), "  ".to_string(), "b".to_string()]);
        assert_eq!(tags, vec!["a", "b"]);
    }

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize_lenient")]
        tags: Vec<String>,
    }

    #[test]
    fn lenient_deserializer_accepts_arrays_and_strings() {
        let array: Holder = serde_json::from_str(r#"{"tags":["x","y"]}"#).unwrap();
        assert_eq!(array.tags, vec!["x", "y"]);

        let encoded: Holder = serde_json::from_str(r#"{"tags":"[\"z\"]"}"#).unwrap();
        assert_eq!(encoded.tags, vec!["z"]);

        let mixed: Holder = serde_json::from_str(r#"{"tags":["x",3]}"#).unwrap();
        assert!(mixed.tags.is_empty());

        let garbage: Holder = serde_json::from_str(r#"{"tags":42}"#).unwrap();
        assert!(garbage.tags.is_empty());
    }
}
