//! Live source-relation metadata resolution.
//!
//! Schema provisioning and config validation both run against the
//! relation's actual catalog entries, resolved once per call — never a
//! hard-coded key shape.

use rusqlite::Connection;
use vecsync_core::{ColumnInfo, PrimaryKeyDescriptor, SourceSchemaInfo};

use crate::errors::{Result, StoreError};

/// Whether a table with this name exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether any schema object (table, view, index, trigger) with this
/// name exists.
pub fn object_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Resolve a source relation's columns from `pragma_table_info`.
pub fn source_schema(conn: &Connection, table: &str) -> Result<SourceSchemaInfo> {
    if !table_exists(conn, table)? {
        return Err(StoreError::NotFound(table.to_string()));
    }

    let mut stmt =
        conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns: Vec<ColumnInfo> = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                decl_type: row.get(1)?,
                pk_position: row.get::<_, i64>(2)?.max(0) as usize,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;

    Ok(SourceSchemaInfo { table: table.to_string(), columns })
}

/// Resolve the source relation's primary key, erroring if it has none.
pub fn primary_key(conn: &Connection, table: &str) -> Result<PrimaryKeyDescriptor> {
    let info = source_schema(conn, table)?;
    info.primary_key()
        .ok_or_else(|| StoreError::MissingPrimaryKey { table: table.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn missing_table_errors() {
        let conn = conn();
        assert!(matches!(
            source_schema(&conn, "nope"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn single_integer_key() {
        let conn = conn();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, body TEXT)").unwrap();
        let pk = primary_key(&conn, "t").unwrap();
        assert_eq!(pk.names(), vec!["id"]);
        assert_eq!(pk.columns[0].decl_type, "INTEGER");
    }

    #[test]
    fn composite_key_ordered() {
        let conn = conn();
        conn.execute_batch(
            "CREATE TABLE t (body TEXT, tenant TEXT, n INTEGER, PRIMARY KEY (tenant, n))",
        )
        .unwrap();
        let pk = primary_key(&conn, "t").unwrap();
        assert_eq!(pk.names(), vec!["tenant", "n"]);
        assert_eq!(pk.columns[1].decl_type, "INTEGER");
    }

    #[test]
    fn no_primary_key_errors() {
        let conn = conn();
        conn.execute_batch("CREATE TABLE t (a TEXT)").unwrap();
        assert!(matches!(
            primary_key(&conn, "t"),
            Err(StoreError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn all_columns_resolved_in_order() {
        let conn = conn();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, title TEXT, body TEXT)")
            .unwrap();
        let info = source_schema(&conn, "t").unwrap();
        assert_eq!(info.column_names(), vec!["id", "title", "body"]);
    }
}
