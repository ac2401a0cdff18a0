//! MySQL catalog metadata.
//!
//! These types are read from `information_schema` and serialized as-is in
//! the schema tool responses.

use schemars::JsonSchema;
use serde::Serialize;

/// A schema (MySQL database) on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SchemaInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// mysql, information_schema, performance_schema or sys
    pub is_system: bool,
}

impl SchemaInfo {
    pub fn new(name: String, charset: Option<String>, collation: Option<String>) -> Self {
        let is_system = is_system_schema(&name);
        Self {
            name,
            charset,
            collation,
            is_system,
        }
    }
}

pub fn is_system_schema(name: &str) -> bool {
    ["mysql", "information_schema", "performance_schema", "sys"]
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Table,
    View,
    SystemView,
}

impl TableKind {
    /// Map a `TABLE_TYPE` value; unknown kinds count as tables.
    pub fn from_catalog(value: &str) -> Self {
        if value.eq_ignore_ascii_case("VIEW") {
            Self::View
        } else if value.eq_ignore_ascii_case("SYSTEM VIEW") {
            Self::SystemView
        } else {
            Self::Table
        }
    }
}

/// Storage footprint of a base table as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct TableStorage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Data bytes, excluding indexes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_bytes: Option<u64>,
    /// Data plus indexes, e.g. "1.50 MB"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,
    /// Engine estimate, not an exact count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_rows: Option<u64>,
    /// RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl TableStorage {
    /// Human-readable sum of data and index bytes, if either is known.
    pub fn total_size(data_bytes: Option<u64>, index_bytes: Option<u64>) -> Option<String> {
        if data_bytes.is_none() && index_bytes.is_none() {
            return None;
        }
        let total = data_bytes.unwrap_or(0) + index_bytes.unwrap_or(0);
        Some(humansize::format_size(total, humansize::WINDOWS))
    }
}

/// One entry of `list_tables`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TableKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Absent for views
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<TableStorage>,
}

/// Full structure of one table, returned by `describe_table`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSchema {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub columns: Vec<ColumnDefinition>,
    /// Primary key columns in key order
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexInfo>,
}

impl TableSchema {
    /// Assemble a table description, deriving the primary key from the
    /// PRIMARY index and pointing each referencing column at its target.
    pub fn assemble(
        table: String,
        schema: Option<String>,
        mut columns: Vec<ColumnDefinition>,
        foreign_keys: Vec<ForeignKey>,
        indexes: Vec<IndexInfo>,
    ) -> Self {
        let primary_key = match indexes.iter().find(|i| i.primary) {
            Some(pk) => pk.columns.clone(),
            None => columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| c.name.clone())
                .collect(),
        };

        for column in &mut columns {
            column.references = foreign_keys
                .iter()
                .find(|fk| fk.column == column.name)
                .map(|fk| ColumnRef {
                    table: fk.referenced_table.clone(),
                    column: fk.referenced_column.clone(),
                });
        }

        Self {
            table,
            schema,
            columns,
            primary_key,
            foreign_keys,
            indexes,
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.table),
            None => self.table.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[schemars(inline)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnDefinition {
    pub name: String,
    /// Full column type, e.g. `varchar(30)` or `bigint unsigned`
    pub column_type: String,
    pub nullable: bool,
    /// Typed by the column: numbers for numeric columns, strings otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    pub primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// auto_increment, DEFAULT_GENERATED and similar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ColumnRef>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ForeignKey {
    pub constraint: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_update: ReferentialAction,
    pub on_delete: ReferentialAction,
}

/// `UPDATE_RULE` / `DELETE_RULE` of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, JsonSchema)]
pub enum ReferentialAction {
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    pub fn from_catalog(rule: Option<&str>) -> Self {
        let Some(rule) = rule else {
            return Self::NoAction;
        };
        match rule.trim().to_ascii_uppercase().as_str() {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct IndexInfo {
    pub name: String,
    /// Key columns in index order
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
    /// BTREE, HASH, FULLTEXT or SPATIAL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Type a `COLUMN_DEFAULT` by its column type.
///
/// Integer and floating point defaults become JSON numbers, `tinyint(1)` and
/// `bool` become booleans and `json` defaults are parsed. DECIMAL keeps its
/// exact text, as do expressions like `CURRENT_TIMESTAMP`.
pub fn typed_default(raw: &str, column_type: &str) -> serde_json::Value {
    use serde_json::Value;

    let ty = column_type.to_ascii_lowercase();
    let base = ty.split(['(', ' ']).next().unwrap_or_default();

    if ty.starts_with("tinyint(1)") || base == "bool" || base == "boolean" {
        match raw {
            "0" => return Value::Bool(false),
            "1" => return Value::Bool(true),
            _ => {}
        }
    }

    match base {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
            if let Ok(n) = raw.parse::<i64>() {
                return Value::from(n);
            }
            if let Ok(n) = raw.parse::<u64>() {
                return Value::from(n);
            }
        }
        "float" | "double" | "real" => {
            if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                return Value::Number(n);
            }
        }
        "json" => {
            if let Ok(parsed) = serde_json::from_str(raw) {
                return parsed;
            }
        }
        _ => {}
    }

    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, primary_key: bool) -> ColumnDefinition {
        ColumnDefinition {
            name: name.into(),
            column_type: "bigint".into(),
            nullable: false,
            default: None,
            primary_key,
            collation: None,
            extra: None,
            comment: None,
            references: None,
        }
    }

    fn index(name: &str, columns: &[&str], primary: bool) -> IndexInfo {
        IndexInfo {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: primary,
            primary,
            method: Some("BTREE".into()),
        }
    }

    #[test]
    fn test_table_kind_from_catalog() {
        assert_eq!(TableKind::from_catalog("BASE TABLE"), TableKind::Table);
        assert_eq!(TableKind::from_catalog("view"), TableKind::View);
        assert_eq!(TableKind::from_catalog("SYSTEM VIEW"), TableKind::SystemView);
    }

    #[test]
    fn test_referential_action_from_catalog() {
        assert_eq!(
            ReferentialAction::from_catalog(Some("set null")),
            ReferentialAction::SetNull
        );
        assert_eq!(
            ReferentialAction::from_catalog(Some("CASCADE")),
            ReferentialAction::Cascade
        );
        assert_eq!(ReferentialAction::from_catalog(None), ReferentialAction::NoAction);
        assert_eq!(
            serde_json::to_value(ReferentialAction::SetDefault).unwrap(),
            json!("SET DEFAULT")
        );
    }

    #[test]
    fn test_system_schema_detection() {
        assert!(SchemaInfo::new("mysql".into(), None, None).is_system);
        assert!(SchemaInfo::new("INFORMATION_SCHEMA".into(), None, None).is_system);
        assert!(!SchemaInfo::new("shop".into(), None, None).is_system);
    }

    #[test]
    fn test_total_size() {
        assert_eq!(TableStorage::total_size(None, None), None);
        assert_eq!(
            TableStorage::total_size(Some(16384), Some(16384)).as_deref(),
            Some("32 kB")
        );
        assert_eq!(
            TableStorage::total_size(Some(1024 * 1024 + 512 * 1024), None).as_deref(),
            Some("1.50 MB")
        );
    }

    #[test]
    fn test_assemble_links_foreign_keys_and_primary_key() {
        let fk = ForeignKey {
            constraint: "fk_orders_user".into(),
            column: "user_id".into(),
            referenced_table: "users".into(),
            referenced_column: "id".into(),
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::Cascade,
        };
        let schema = TableSchema::assemble(
            "orders".into(),
            Some("shop".into()),
            vec![column("tenant", true), column("id", true), column("user_id", false)],
            vec![fk],
            vec![index("PRIMARY", &["id", "tenant"], true)],
        );

        assert_eq!(schema.qualified_name(), "shop.orders");
        assert_eq!(schema.primary_key, vec!["id", "tenant"]);
        assert!(schema.columns[0].references.is_none());
        let target = schema.columns[2].references.as_ref().unwrap();
        assert_eq!(target.table, "users");

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["foreign_keys"][0]["on_delete"], "CASCADE");
        assert!(json["columns"][0].get("default").is_none());
    }

    #[test]
    fn test_assemble_without_primary_index_uses_column_keys() {
        let schema = TableSchema::assemble(
            "t".into(),
            None,
            vec![column("id", true), column("v", false)],
            vec![],
            vec![],
        );
        assert_eq!(schema.primary_key, vec!["id"]);
        assert_eq!(schema.qualified_name(), "t");
    }

    #[test]
    fn test_view_serialization_omits_storage() {
        let view = TableInfo {
            name: "active_users".into(),
            kind: TableKind::View,
            schema: None,
            comment: None,
            storage: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "view");
        assert!(json.get("storage").is_none());
        assert!(json.get("schema").is_none());
    }

    #[test]
    fn test_typed_default_numbers() {
        assert_eq!(typed_default("42", "int"), json!(42));
        assert_eq!(typed_default("-100", "bigint"), json!(-100));
        assert_eq!(
            typed_default("18446744073709551615", "bigint unsigned"),
            json!(18446744073709551615u64)
        );
        assert_eq!(typed_default("1.5", "double"), json!(1.5));
        assert_eq!(typed_default("9.99", "decimal(10,2)"), json!("9.99"));
    }

    #[test]
    fn test_typed_default_bool_json_and_expressions() {
        assert_eq!(typed_default("1", "tinyint(1)"), json!(true));
        assert_eq!(typed_default("0", "tinyint(1)"), json!(false));
        assert_eq!(typed_default("7", "tinyint(4)"), json!(7));
        assert_eq!(typed_default(r#"{"k":"v"}"#, "json"), json!({"k": "v"}));
        assert_eq!(typed_default("not json", "json"), json!("not json"));
        assert_eq!(
            typed_default("CURRENT_TIMESTAMP", "timestamp"),
            json!("CURRENT_TIMESTAMP")
        );
        // "point" contains "int" but is not an integer type.
        assert_eq!(typed_default("0", "point"), json!("0"));
    }
}
