//! Source relation metadata and primary-key descriptors.
//!
//! Schema provisioning and config validation both operate on a snapshot
//! of the source relation's live metadata, never on a hard-coded key
//! shape. Composite keys of arbitrary column count and type are first
//! class.

use serde::{Deserialize, Serialize};

/// One column of a resolved primary key, in key order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkColumn {
    /// Column name as declared on the source relation.
    pub name: String,
    /// Declared type (e.g. `INTEGER`, `TEXT`).
    pub decl_type: String,
    /// Zero-based position within the primary key.
    pub position: usize,
}

/// Ordered list of primary-key columns resolved from live metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyDescriptor {
    /// Key columns in key order.
    pub columns: Vec<PkColumn>,
}

impl PrimaryKeyDescriptor {
    /// Build a descriptor from `(name, decl_type)` pairs in key order.
    pub fn new<S: Into<String>>(columns: Vec<(S, S)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .enumerate()
                .map(|(position, (name, decl_type))| PkColumn {
                    name: name.into(),
                    decl_type: decl_type.into(),
                    position,
                })
                .collect(),
        }
    }

    /// Column names in key order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of key columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the descriptor has no columns (invalid for provisioning).
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One column of the source relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub decl_type: String,
    /// Position within the primary key (1-based per SQLite), 0 if not a key column.
    pub pk_position: usize,
}

/// Snapshot of a source relation's columns, used for config validation
/// and schema provisioning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchemaInfo {
    /// Relation name.
    pub table: String,
    /// All columns in declaration order.
    pub columns: Vec<ColumnInfo>,
}

impl SourceSchemaInfo {
    /// Whether the relation has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// All column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The primary key as an ordered descriptor, or `None` if the
    /// relation has no declared key.
    pub fn primary_key(&self) -> Option<PrimaryKeyDescriptor> {
        let mut key: Vec<&ColumnInfo> =
            self.columns.iter().filter(|c| c.pk_position > 0).collect();
        if key.is_empty() {
            return None;
        }
        key.sort_by_key(|c| c.pk_position);
        Some(PrimaryKeyDescriptor {
            columns: key
                .into_iter()
                .enumerate()
                .map(|(position, c)| PkColumn {
                    name: c.name.clone(),
                    decl_type: c.decl_type.clone(),
                    position,
                })
                .collect(),
        })
    }
}

/// Primary-key values for one source row, in key order.
///
/// Values are held as JSON so they can be persisted in error records
/// and logs; the store layer converts to and from SQL values.
pub type PkValues = Vec<serde_json::Value>;
