//! MySQL catalog introspection.
//!
//! Every query reads `information_schema` through a connection the caller
//! already holds, so introspection runs inside the same scoped session (and
//! read-only contract) as ordinary queries.

use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDefinition, ForeignKey, IndexInfo, ReferentialAction, SchemaInfo, TableInfo, TableKind,
    TableSchema, TableStorage, typed_default,
};
use chrono::NaiveDateTime;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlConnection, Row};
use tracing::debug;

// Catalog text columns are converted to utf8mb4 because some servers report
// them as VARBINARY. A NULL schema binding falls back to the connection's
// default database.
mod sql {
    pub const SCHEMAS: &str = r#"
        SELECT
            CONVERT(SCHEMA_NAME USING utf8mb4) AS name,
            CONVERT(DEFAULT_CHARACTER_SET_NAME USING utf8mb4) AS charset,
            CONVERT(DEFAULT_COLLATION_NAME USING utf8mb4) AS collation
        FROM information_schema.SCHEMATA
        ORDER BY SCHEMA_NAME
        "#;

    /// Binds: schema, include_views.
    pub const TABLES: &str = r#"
        SELECT
            CONVERT(TABLE_SCHEMA USING utf8mb4) AS table_schema,
            CONVERT(TABLE_NAME USING utf8mb4) AS name,
            CONVERT(TABLE_TYPE USING utf8mb4) AS kind,
            CONVERT(ENGINE USING utf8mb4) AS engine,
            CONVERT(TABLE_COLLATION USING utf8mb4) AS collation,
            DATA_LENGTH AS data_bytes,
            INDEX_LENGTH AS index_bytes,
            TABLE_ROWS AS estimated_rows,
            CREATE_TIME AS created_at,
            UPDATE_TIME AS updated_at,
            CONVERT(TABLE_COMMENT USING utf8mb4) AS comment
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
        AND (TABLE_TYPE = 'BASE TABLE' OR (? AND TABLE_TYPE IN ('VIEW', 'SYSTEM VIEW')))
        ORDER BY TABLE_NAME
        "#;

    /// Binds: table, schema.
    pub const COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8mb4) AS name,
            CONVERT(COLUMN_TYPE USING utf8mb4) AS column_type,
            CONVERT(IS_NULLABLE USING utf8mb4) AS nullable,
            CONVERT(COLUMN_DEFAULT USING utf8mb4) AS column_default,
            CONVERT(COLUMN_KEY USING utf8mb4) AS column_key,
            CONVERT(EXTRA USING utf8mb4) AS extra,
            CONVERT(COLLATION_NAME USING utf8mb4) AS collation,
            CONVERT(COLUMN_COMMENT USING utf8mb4) AS comment
        FROM information_schema.COLUMNS
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = COALESCE(?, DATABASE())
        ORDER BY ORDINAL_POSITION
        "#;

    /// Binds: table, schema.
    pub const FOREIGN_KEYS: &str = r#"
        SELECT
            CONVERT(k.CONSTRAINT_NAME USING utf8mb4) AS constraint_name,
            CONVERT(k.COLUMN_NAME USING utf8mb4) AS column_name,
            CONVERT(k.REFERENCED_TABLE_NAME USING utf8mb4) AS referenced_table,
            CONVERT(k.REFERENCED_COLUMN_NAME USING utf8mb4) AS referenced_column,
            CONVERT(r.UPDATE_RULE USING utf8mb4) AS on_update,
            CONVERT(r.DELETE_RULE USING utf8mb4) AS on_delete
        FROM information_schema.KEY_COLUMN_USAGE k
        LEFT JOIN information_schema.REFERENTIAL_CONSTRAINTS r
            ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
            AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
        WHERE k.TABLE_NAME = ?
        AND k.TABLE_SCHEMA = COALESCE(?, DATABASE())
        AND k.REFERENCED_TABLE_NAME IS NOT NULL
        ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION
        "#;

    /// Binds: table, schema.
    pub const INDEXES: &str = r#"
        SELECT
            CONVERT(INDEX_NAME USING utf8mb4) AS name,
            CONVERT(GROUP_CONCAT(COLUMN_NAME ORDER BY SEQ_IN_INDEX) USING utf8mb4) AS columns,
            CAST(MIN(NON_UNIQUE) = 0 AS SIGNED) AS is_unique,
            CONVERT(INDEX_TYPE USING utf8mb4) AS method
        FROM information_schema.STATISTICS
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = COALESCE(?, DATABASE())
        GROUP BY INDEX_NAME, INDEX_TYPE
        ORDER BY INDEX_NAME = 'PRIMARY' DESC, INDEX_NAME
        "#;
}

/// Text column, accepting VARBINARY when the server reports one. Empty
/// strings are treated as absent.
fn text(row: &MySqlRow, column: &str) -> Option<String> {
    let value = match row.try_get::<Option<String>, _>(column) {
        Ok(value) => value,
        Err(_) => row
            .try_get::<Option<Vec<u8>>, _>(column)
            .ok()
            .flatten()
            .and_then(|bytes| String::from_utf8(bytes).ok()),
    };
    value.filter(|v| !v.is_empty())
}

/// Counter column. Its SQL type differs between MySQL 5.x (signed) and 8.x
/// (unsigned).
fn counter(row: &MySqlRow, column: &str) -> Option<u64> {
    match row.try_get::<Option<u64>, _>(column) {
        Ok(value) => value,
        Err(_) => row
            .try_get::<Option<i64>, _>(column)
            .ok()
            .flatten()
            .and_then(|v| u64::try_from(v).ok()),
    }
}

fn timestamp(row: &MySqlRow, column: &str) -> Option<String> {
    row.try_get::<Option<NaiveDateTime>, _>(column)
        .ok()
        .flatten()
        .map(|t| t.and_utc().to_rfc3339())
}

pub struct SchemaInspector;

impl SchemaInspector {
    /// Schemas visible to the connected user.
    pub async fn list_schemas(conn: &mut MySqlConnection) -> DbResult<Vec<SchemaInfo>> {
        let rows = sqlx::query(sql::SCHEMAS).fetch_all(&mut *conn).await?;

        let schemas: Vec<SchemaInfo> = rows
            .iter()
            .filter_map(|row| {
                Some(SchemaInfo::new(
                    text(row, "name")?,
                    text(row, "charset"),
                    text(row, "collation"),
                ))
            })
            .collect();

        debug!(count = schemas.len(), "Listed schemas");
        Ok(schemas)
    }

    /// Tables (and optionally views) of `schema`, or of the connection's
    /// default database.
    pub async fn list_tables(
        conn: &mut MySqlConnection,
        schema: Option<&str>,
        include_views: bool,
    ) -> DbResult<Vec<TableInfo>> {
        let rows = sqlx::query(sql::TABLES)
            .bind(schema)
            .bind(include_views)
            .fetch_all(&mut *conn)
            .await?;

        let tables: Vec<TableInfo> = rows.iter().filter_map(table_from_row).collect();

        debug!(count = tables.len(), schema = ?schema, "Listed tables");
        Ok(tables)
    }

    /// Columns, primary key, foreign keys and indexes of one table.
    pub async fn describe_table(
        conn: &mut MySqlConnection,
        table: &str,
        schema: Option<&str>,
    ) -> DbResult<TableSchema> {
        let columns: Vec<ColumnDefinition> = sqlx::query(sql::COLUMNS)
            .bind(table)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .filter_map(column_from_row)
            .collect();

        if columns.is_empty() {
            let qualified = match schema {
                Some(schema) => format!("{schema}.{table}"),
                None => table.to_string(),
            };
            return Err(DbError::schema(
                format!("Table '{qualified}' not found"),
                table,
            ));
        }

        let foreign_keys = sqlx::query(sql::FOREIGN_KEYS)
            .bind(table)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .filter_map(foreign_key_from_row)
            .collect();

        let indexes = sqlx::query(sql::INDEXES)
            .bind(table)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .filter_map(index_from_row)
            .collect();

        Ok(TableSchema::assemble(
            table.to_string(),
            schema.map(str::to_string),
            columns,
            foreign_keys,
            indexes,
        ))
    }
}

fn table_from_row(row: &MySqlRow) -> Option<TableInfo> {
    let kind = TableKind::from_catalog(&text(row, "kind").unwrap_or_default());

    let storage = (kind == TableKind::Table).then(|| {
        let data_bytes = counter(row, "data_bytes");
        let index_bytes = counter(row, "index_bytes");
        TableStorage {
            engine: text(row, "engine"),
            collation: text(row, "collation"),
            data_bytes,
            index_bytes,
            total_size: TableStorage::total_size(data_bytes, index_bytes),
            estimated_rows: counter(row, "estimated_rows"),
            created_at: timestamp(row, "created_at"),
            updated_at: timestamp(row, "updated_at"),
        }
    });

    Some(TableInfo {
        name: text(row, "name")?,
        kind,
        schema: text(row, "table_schema"),
        comment: text(row, "comment"),
        storage,
    })
}

fn column_from_row(row: &MySqlRow) -> Option<ColumnDefinition> {
    let column_type = text(row, "column_type").unwrap_or_default();
    // COLUMN_DEFAULT is NULL when there is no default; an empty string
    // default is real and must survive.
    let default = row
        .try_get::<Option<String>, _>("column_default")
        .ok()
        .flatten()
        .map(|raw| typed_default(&raw, &column_type));

    Some(ColumnDefinition {
        name: text(row, "name")?,
        nullable: text(row, "nullable").as_deref() == Some("YES"),
        primary_key: text(row, "column_key").as_deref() == Some("PRI"),
        default,
        collation: text(row, "collation"),
        extra: text(row, "extra"),
        comment: text(row, "comment"),
        references: None,
        column_type,
    })
}

fn foreign_key_from_row(row: &MySqlRow) -> Option<ForeignKey> {
    Some(ForeignKey {
        constraint: text(row, "constraint_name")?,
        column: text(row, "column_name")?,
        referenced_table: text(row, "referenced_table")?,
        referenced_column: text(row, "referenced_column")?,
        on_update: ReferentialAction::from_catalog(text(row, "on_update").as_deref()),
        on_delete: ReferentialAction::from_catalog(text(row, "on_delete").as_deref()),
    })
}

fn index_from_row(row: &MySqlRow) -> Option<IndexInfo> {
    let name = text(row, "name")?;
    let primary = name == "PRIMARY";
    let columns = text(row, "columns")?
        .split(',')
        .map(str::to_string)
        .collect();
    let unique = primary || row.try_get::<i64, _>("is_unique").unwrap_or(0) != 0;

    Some(IndexInfo {
        name,
        columns,
        unique,
        primary,
        method: text(row, "method"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::sql_validator::is_single_statement;

    #[test]
    fn test_catalog_queries_are_single_statements() {
        for q in [sql::SCHEMAS, sql::TABLES, sql::COLUMNS, sql::FOREIGN_KEYS, sql::INDEXES] {
            assert!(is_single_statement(q), "{q}");
        }
    }

    #[test]
    fn test_table_scoped_queries_fall_back_to_default_database() {
        for q in [sql::TABLES, sql::COLUMNS, sql::FOREIGN_KEYS, sql::INDEXES] {
            assert!(q.contains("COALESCE(?, DATABASE())"));
        }
    }

    #[test]
    fn test_tables_query_binds_include_views() {
        assert_eq!(sql::TABLES.matches('?').count(), 2);
        assert!(sql::TABLES.contains("'BASE TABLE'"));
    }
}
