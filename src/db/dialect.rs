//! Catalog queries per SQL dialect.

use super::Value;

/// Column holding a table name in the list-tables query.
pub const NAME_COLUMN: &str = "NAME";

/// Column holding one line of DDL source in the table-definition query.
pub const SOURCE_COLUMN: &str = "SRCDTA";

const DB2I_LIST_TABLES: &str = r#"
SELECT TABLE_NAME AS NAME, TABLE_TYPE
FROM QSYS2.SYSTABLES
WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'T'
ORDER BY TABLE_NAME
"#;

const DB2I_TABLE_DEFINITION: &str = r#"
CALL QSYS2.GENERATE_SQL(
    DATABASE_OBJECT_NAME => ?,
    DATABASE_OBJECT_LIBRARY_NAME => ?,
    DATABASE_OBJECT_TYPE => 'TABLE',
    CREATE_OR_REPLACE_OPTION => '1',
    PRIVILEGES_OPTION => '0',
    STATEMENT_FORMATTING_OPTION => '0',
    SOURCE_STREAM_FILE_END_OF_LINE => 'LF',
    SOURCE_STREAM_FILE_CCSID => 1208
)
"#;

const SQLITE_LIST_TABLES: &str = r#"
SELECT name AS NAME, type AS TABLE_TYPE
FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
ORDER BY name
"#;

const SQLITE_TABLE_DEFINITION: &str = r#"
SELECT sql AS SRCDTA
FROM sqlite_master
WHERE type = 'table' AND name = ?
"#;

/// SQL dialect spoken by a daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Db2 for i through Mapepire.
    Db2i,
    /// SQLite (the `main` schema of a database file).
    Sqlite,
}

/// A catalog statement with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub sql: &'static str,
    pub params: Vec<Value>,
}

impl Dialect {
    /// Query listing base tables (no views) of `schema`, ordered by name.
    pub fn list_tables(&self, schema: &str) -> CatalogQuery {
        match self {
            Self::Db2i => CatalogQuery {
                sql: DB2I_LIST_TABLES,
                params: vec![Value::from(schema)],
            },
            Self::Sqlite => CatalogQuery {
                sql: SQLITE_LIST_TABLES,
                params: Vec::new(),
            },
        }
    }

    /// Query returning the CREATE TABLE source of `table` in `schema`, one line per row.
    pub fn table_definition(&self, table: &str, schema: &str) -> CatalogQuery {
        match self {
            Self::Db2i => CatalogQuery {
                sql: DB2I_TABLE_DEFINITION,
                params: vec![Value::from(table), Value::from(schema)],
            },
            Self::Sqlite => CatalogQuery {
                sql: SQLITE_TABLE_DEFINITION,
                params: vec![Value::from(table)],
            },
        }
    }
}
