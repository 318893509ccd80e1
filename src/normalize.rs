//! Flattening of nested API records into storage-safe columns.
//!
//! Nested objects are joined with `.` (`pessoaExpostaPoliticamente.descricao`)
//! and the resulting names are then sanitized so that anything outside
//! `[A-Za-z0-9_]` becomes `_` (`pessoaExpostaPoliticamente_descricao`).

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::models::{FlatRecord, RawSolicitation};

static ILLEGAL_COLUMN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("column regex"));

/// Flattens nested objects into dot-joined keys.
///
/// Arrays and scalars are kept as leaf values. A non-object record yields
/// a single `value` column so that nothing is silently dropped.
pub fn flatten_record(raw: &RawSolicitation) -> FlatRecord {
    let mut out = FlatRecord::new();
    match raw {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(&mut out, key, value);
            }
        }
        other => {
            out.insert("value".to_string(), other.clone());
        }
    }
    out
}

fn flatten_into(out: &mut FlatRecord, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(out, &format!("{}.{}", prefix, key), nested);
            }
        }
        // An empty object carries no fields; keep the column as null.
        Value::Object(_) => {
            out.insert(prefix.to_string(), Value::Null);
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

/// Replaces characters that are not valid in an unquoted column name.
pub fn sanitize_column_name(name: &str) -> String {
    ILLEGAL_COLUMN_CHARS.replace_all(name, "_").into_owned()
}

/// Renames every key of a flattened record with [`sanitize_column_name`].
///
/// When two keys collapse to the same column the first one wins.
pub fn sanitize_columns(record: FlatRecord) -> FlatRecord {
    let mut out = FlatRecord::new();
    for (key, value) in record {
        let column = sanitize_column_name(&key);
        if out.contains_key(&column) {
            tracing::warn!("Column {} already present, dropping field {}", column, key);
            continue;
        }
        out.insert(column, value);
    }
    out
}

/// Flattens and sanitizes a batch of raw solicitations.
pub fn normalize_batch(raw: &[RawSolicitation]) -> Vec<FlatRecord> {
    raw.iter()
        .map(|r| sanitize_columns(flatten_record(r)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_objects() {
        let raw = json!({
            "idSolicitacao": "A1",
            "inscricaoEmpregador": { "codigo": 1, "descricao": "CNPJ" },
            "pessoaExpostaPoliticamente": { "codigo": 2, "descricao": "Pessoa Não Exposta Politicamente" },
        });

        let flat = flatten_record(&raw);

        assert_eq!(flat["inscricaoEmpregador.codigo"], json!(1));
        assert_eq!(
            flat["pessoaExpostaPoliticamente.descricao"],
            json!("Pessoa Não Exposta Politicamente")
        );
        assert!(!flat.contains_key("inscricaoEmpregador"));
    }

    #[test]
    fn test_deep_nesting_and_arrays() {
        let raw = json!({ "a": { "b": { "c": [1, 2] } }, "empty": {} });
        let flat = flatten_record(&raw);

        assert_eq!(flat["a.b.c"], json!([1, 2]));
        assert_eq!(flat["empty"], Value::Null);
    }

    #[test]
    fn test_sanitize_column_name() {
        assert_eq!(
            sanitize_column_name("pessoaExpostaPoliticamente.descricao"),
            "pessoaExpostaPoliticamente_descricao"
        );
        assert_eq!(sanitize_column_name("valor-liberado (R$)"), "valor_liberado__R__");
        assert_eq!(sanitize_column_name("cpf"), "cpf");
    }

    #[test]
    fn test_normalize_batch() {
        let batch = vec![json!({ "id": "1", "pep": { "descricao": "x" } }), json!(7)];
        let rows = normalize_batch(&batch);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["pep_descricao"], json!("x"));
        assert_eq!(rows[1]["value"], json!(7));
    }
}
