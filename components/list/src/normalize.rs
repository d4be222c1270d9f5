// Copyright 2024 glacier-list
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-field value normalization used by [crate::GlacierList::serialize]
//! and [crate::GlacierList::deserialize].

use glacier_types::{Record, Value};

/// Rewrites single field values. Applied to every field of every record.
pub trait Normalize: Send + Sync {
    fn normalize(&self, value: Value) -> Value;

    fn normalize_record(&self, record: Record) -> Record {
        record
            .into_iter()
            .map(|(k, v)| (k, self.normalize(v)))
            .collect()
    }
}

/// Turns containers and booleans into their JSON text; every other scalar
/// passes through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonNormalizer;

impl Normalize for JsonNormalizer {
    fn normalize(&self, value: Value) -> Value {
        match value {
            Value::Bool(_) | Value::List(_) | Value::Map(_) => Value::Text(value.to_json_string()),
            other => other,
        }
    }
}

/// The reverse of [JsonNormalizer]: text holding a JSON object, array or
/// boolean becomes a structured value again. Other text is left alone, so a
/// field that was the literal text `"true"` before normalizing comes back as
/// a boolean.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDenormalizer;

impl Normalize for JsonDenormalizer {
    fn normalize(&self, value: Value) -> Value {
        let parsed = match &value {
            Value::Text(text) if looks_structured(text) => Value::parse_json(text).ok(),
            _ => None,
        };
        match parsed {
            Some(v) if v.is_container() || v.as_bool().is_some() => v,
            _ => value,
        }
    }
}

fn looks_structured(text: &str) -> bool {
    let t = text.trim();
    t.starts_with('{') || t.starts_with('[') || t == "true" || t == "false"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> Record {
        Record::new()
            .with("id", 1)
            .with("config", Record::new().with("enabled", true).with("count", 5))
            .with("tags", vec!["tag1", "tag2"])
            .with("active", false)
            .with("score", 2.5)
            .with("note", Value::Null)
            .with("name", "Alice")
    }

    #[test]
    fn containers_and_bools_become_json_text() {
        let r = JsonNormalizer.normalize_record(contact());
        assert_eq!(r.get("config"), Some(&Value::from(r#"{"enabled":true,"count":5}"#)));
        assert_eq!(r.get("tags"), Some(&Value::from(r#"["tag1","tag2"]"#)));
        assert_eq!(r.get("active"), Some(&Value::from("false")));
        assert_eq!(r.get("id"), Some(&Value::Int(1)));
        assert_eq!(r.get("score"), Some(&Value::Float(2.5)));
        assert_eq!(r.get("note"), Some(&Value::Null));
        assert_eq!(r.get("name"), Some(&Value::from("Alice")));
        assert_eq!(r.keys().collect::<Vec<_>>(), contact().keys().collect::<Vec<_>>());
    }

    #[test]
    fn round_trip() {
        let back = JsonDenormalizer.normalize_record(JsonNormalizer.normalize_record(contact()));
        assert_eq!(back, contact());
    }

    #[test]
    fn plain_text_is_untouched() {
        for text in ["Alice", "[not json", "{", "42", "\"quoted\""] {
            assert_eq!(JsonDenormalizer.normalize(Value::from(text)), Value::from(text));
        }
    }
}
