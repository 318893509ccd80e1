use serde_json::Value;
use sha2::{Digest, Sha256};

/// Content digest of one API page, used to detect pagination stalls.
///
/// Each record is serialized canonically (object keys sorted at every depth),
/// the serialized records are sorted, and the sorted list is hashed with
/// SHA-256. The digest is therefore independent of key order and of record
/// order inside the page.
///
/// # Collisions
///
/// Two different pages sharing a digest would end the fetch early. The
/// outcome is a shorter window that the next cycle picks up again from the
/// high-water-mark; no data is written twice or lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageFingerprint(String);

impl PageFingerprint {
    /// Computes the fingerprint of a page of records.
    pub fn of_page(records: &[Value]) -> Self {
        let mut serialized: Vec<String> = records.iter().map(canonical_json).collect();
        serialized.sort_unstable();

        let mut hasher = Sha256::new();
        for item in &serialized {
            hasher.update(item.as_bytes());
            hasher.update(b"\n");
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex-encoded digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Serializes a JSON value with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"id":"1","pep":{"codigo":1,"descricao":"x"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"pep":{"descricao":"x","codigo":1},"id":"1"}"#).unwrap();

        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(PageFingerprint::of_page(&[a]), PageFingerprint::of_page(&[b]));
    }

    #[test]
    fn test_record_order_does_not_matter() {
        let page1 = vec![json!({"id": "1"}), json!({"id": "2"})];
        let page2 = vec![json!({"id": "2"}), json!({"id": "1"})];

        assert_eq!(PageFingerprint::of_page(&page1), PageFingerprint::of_page(&page2));
    }

    #[test]
    fn test_different_content_differs() {
        let page1 = vec![json!({"id": "1"})];
        let page2 = vec![json!({"id": "2"})];

        assert_ne!(PageFingerprint::of_page(&page1), PageFingerprint::of_page(&page2));
        assert_eq!(PageFingerprint::of_page(&page1).as_str().len(), 64);
    }

    #[test]
    fn test_canonical_json_nested() {
        let v = json!({"b": [ {"d": 1, "c": null} ], "a": "ã"});
        assert_eq!(canonical_json(&v), r#"{"a":"ã","b":[{"c":null,"d":1}]}"#);
    }
}
