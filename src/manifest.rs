//! Table manifests
//!
//! A manifest file holds either one table or a `tables:` list, in YAML or
//! JSON (chosen by extension, YAML otherwise).

use crate::model::TableSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Many { tables: Vec<TableSpec> },
    Single(Box<TableSpec>),
}

impl ManifestDocument {
    fn into_tables(self) -> Vec<TableSpec> {
        match self {
            Self::Many { tables } => tables,
            Self::Single(table) => vec![*table],
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parse manifest content; `json` selects the JSON parser
pub fn parse_manifest(content: &str, json: bool) -> Result<Vec<TableSpec>> {
    let document: ManifestDocument = if json {
        serde_json::from_str(content).context("Failed to parse JSON manifest")?
    } else {
        serde_yaml::from_str(content).context("Failed to parse YAML manifest")?
    };
    Ok(document.into_tables())
}

/// Load the tables declared in one manifest file
pub fn load_manifest(path: &Path) -> Result<Vec<TableSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let tables = parse_manifest(&content, is_json(path))
        .with_context(|| format!("Invalid manifest {}", path.display()))?;
    tracing::debug!("Loaded {} table(s) from {}", tables.len(), path.display());
    Ok(tables)
}

/// Load several manifests; a table name may only be declared once
pub fn load_manifests<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<TableSpec>> {
    let mut seen = HashSet::new();
    let mut tables = Vec::new();

    for path in paths {
        for table in load_manifest(path.as_ref())? {
            if !seen.insert(table.table_name.clone()) {
                anyhow::bail!(
                    "Table '{}' is declared more than once (last in {})",
                    table.table_name,
                    path.as_ref().display()
                );
            }
            tables.push(table);
        }
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_single_table_yaml() {
        let yaml = r#"
tableName: orders
keySchema:
  - attributeName: pk
    keyType: HASH
"#;
        let tables = parse_manifest(yaml, false).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].table_name, "orders");
    }

    #[test]
    fn test_table_list_yaml() {
        let yaml = r#"
tables:
  - tableName: orders
    keySchema:
      - attributeName: pk
        keyType: HASH
  - tableName: users
    keySchema:
      - attributeName: id
        keyType: HASH
      - attributeName: created
        keyType: RANGE
"#;
        let tables = parse_manifest(yaml, false).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(names, vec!["orders", "users"]);
        assert_eq!(tables[1].key_schema.len(), 2);
    }

    #[test]
    fn test_json_manifest() {
        let json = r#"{"tableName": "orders", "keySchema": [{"attributeName": "pk", "keyType": "HASH"}]}"#;
        let tables = parse_manifest(json, true).unwrap();
        assert_eq!(tables[0].table_name, "orders");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_manifest("just a string", false).is_err());
        assert!(parse_manifest("{", true).is_err());
    }

    #[test]
    fn test_extension_selects_parser() {
        assert!(is_json(&PathBuf::from("tables.JSON")));
        assert!(!is_json(&PathBuf::from("tables.yaml")));
        assert!(!is_json(&PathBuf::from("tables")));
    }

    #[test]
    fn test_duplicate_tables_across_manifests() {
        let dir = std::env::temp_dir().join(format!("tablesync-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let doc = "tableName: orders\nkeySchema:\n  - attributeName: pk\n    keyType: HASH\n";
        let a = dir.join("a.yaml");
        let b = dir.join("b.yaml");
        std::fs::write(&a, doc).unwrap();
        std::fs::write(&b, doc).unwrap();

        let err = load_manifests(&[a.clone(), b]).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
        assert_eq!(load_manifests(&[a]).unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
