//! Table schemas and per-field coercion for snapshot artifacts

use crate::records::{ApiRecord, ContentBlock};
use rusqlite::types::Value as SqlValue;
use thiserror::Error;

/// Current artifact schema version
pub const SCHEMA_VERSION: i64 = 1;

/// Table holding Markdown/MDX content blocks
pub const CONTENT_BLOCKS_TABLE: &str = "content_blocks";

/// Table holding operation and schema records
pub const API_SPECS_TABLE: &str = "api_specs";

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    /// Serialized JSON stored as TEXT
    Json,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text | ColumnType::Json => "TEXT",
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType, nullable: bool) -> Column {
    Column { name, ty, nullable }
}

/// Column set of a table
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub columns: &'static [Column],
}

pub const CONTENT_BLOCK_SCHEMA: TableSchema = TableSchema {
    columns: &[
        col("filePath", ColumnType::Text, false),
        col("fileName", ColumnType::Text, false),
        col("heading1", ColumnType::Text, true),
        col("heading2", ColumnType::Text, true),
        col("heading3", ColumnType::Text, true),
        col("contentType", ColumnType::Text, false),
        col("language", ColumnType::Text, true),
        col("content", ColumnType::Text, false),
        col("lineNumber", ColumnType::Integer, false),
        col("order", ColumnType::Integer, false),
    ],
};

pub const API_SPEC_SCHEMA: TableSchema = TableSchema {
    columns: &[
        col("type", ColumnType::Text, false),
        col("filePath", ColumnType::Text, false),
        col("fileName", ColumnType::Text, false),
        col("apiPath", ColumnType::Text, true),
        col("method", ColumnType::Text, true),
        col("operationId", ColumnType::Text, true),
        col("summary", ColumnType::Text, true),
        col("description", ColumnType::Text, true),
        col("schemaName", ColumnType::Text, true),
        col("title", ColumnType::Text, true),
        col("content", ColumnType::Text, false),
        col("schemaDefinition", ColumnType::Text, true),
        col("usedBy", ColumnType::Json, true),
    ],
};

impl TableSchema {
    pub fn create_sql(&self, table: &str) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "" } else { " NOT NULL" };
                format!("{} {}{}", quote_ident(c.name), c.ty.sql(), null)
            })
            .collect();
        format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", "))
    }

    pub fn insert_sql(&self, table: &str) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(c.name)).collect();
        let params: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            names.join(", "),
            params.join(", ")
        )
    }

    /// Quoted, comma-separated column list for SELECTs
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Double-quote an SQL identifier ("order" is a keyword)
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL for the per-artifact metadata table
pub const INDEX_STATE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS index_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// A record field before coercion to its column type
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Real(f64),
    Bool(bool),
    Json(serde_json::Value),
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Unsigned(value as u64)
    }
}

/// Why a field could not be encoded for its column
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("column {0} is not nullable")]
    NullNotAllowed(&'static str),

    #[error("column {column}: cannot store {found} as {expected:?}")]
    TypeMismatch {
        column: &'static str,
        expected: ColumnType,
        found: String,
    },

    #[error("column {0}: integer out of range")]
    OutOfRange(&'static str),

    #[error("column {0}: non-finite real")]
    NonFinite(&'static str),
}

/// Coerce one field to the storage value of `column`
pub fn coerce(value: FieldValue, column: &Column) -> Result<SqlValue, EncodeError> {
    let mismatch = |found: &dyn std::fmt::Debug| EncodeError::TypeMismatch {
        column: column.name,
        expected: column.ty,
        found: format!("{:?}", found),
    };

    match (value, column.ty) {
        (FieldValue::Null, _) if column.nullable => Ok(SqlValue::Null),
        (FieldValue::Null, _) => Err(EncodeError::NullNotAllowed(column.name)),

        (FieldValue::Text(s), ColumnType::Text) => Ok(SqlValue::Text(s)),
        (FieldValue::Integer(i), ColumnType::Text) => Ok(SqlValue::Text(i.to_string())),
        (FieldValue::Unsigned(u), ColumnType::Text) => Ok(SqlValue::Text(u.to_string())),
        (FieldValue::Real(r), ColumnType::Text) => Ok(SqlValue::Text(r.to_string())),
        (FieldValue::Bool(b), ColumnType::Text) => Ok(SqlValue::Text(b.to_string())),
        (FieldValue::Json(j), ColumnType::Text | ColumnType::Json) => Ok(SqlValue::Text(j.to_string())),

        (FieldValue::Integer(i), ColumnType::Integer) => Ok(SqlValue::Integer(i)),
        (FieldValue::Unsigned(u), ColumnType::Integer) => i64::try_from(u)
            .map(SqlValue::Integer)
            .map_err(|_| EncodeError::OutOfRange(column.name)),
        (FieldValue::Bool(b), ColumnType::Integer | ColumnType::Boolean) => {
            Ok(SqlValue::Integer(i64::from(b)))
        }
        (FieldValue::Text(s), ColumnType::Integer) => {
            s.trim().parse::<i64>().map(SqlValue::Integer).map_err(|_| mismatch(&s))
        }

        (FieldValue::Real(r), ColumnType::Real) if r.is_finite() => Ok(SqlValue::Real(r)),
        (FieldValue::Real(_), ColumnType::Real) => Err(EncodeError::NonFinite(column.name)),
        (FieldValue::Integer(i), ColumnType::Real) => Ok(SqlValue::Real(i as f64)),
        (FieldValue::Unsigned(u), ColumnType::Real) => Ok(SqlValue::Real(u as f64)),

        (FieldValue::Integer(i @ (0 | 1)), ColumnType::Boolean) => Ok(SqlValue::Integer(i)),
        (FieldValue::Text(s), ColumnType::Boolean) => match s.as_str() {
            "true" => Ok(SqlValue::Integer(1)),
            "false" => Ok(SqlValue::Integer(0)),
            _ => Err(mismatch(&s)),
        },

        (FieldValue::Text(s), ColumnType::Json) => {
            serde_json::from_str::<serde_json::Value>(&s).map_err(|_| mismatch(&s))?;
            Ok(SqlValue::Text(s))
        }

        (other, _) => Err(mismatch(&other)),
    }
}

/// A record that can be written as one table row
pub trait TableRow {
    fn field(&self, column: &str) -> FieldValue;

    /// Encode every column of `schema`, failing on the first bad field
    fn encode(&self, schema: &TableSchema) -> Result<Vec<SqlValue>, EncodeError> {
        schema
            .columns
            .iter()
            .map(|c| coerce(self.field(c.name), c))
            .collect()
    }
}

impl TableRow for ContentBlock {
    fn field(&self, column: &str) -> FieldValue {
        match column {
            "filePath" => self.file_path.as_str().into(),
            "fileName" => self.file_name.as_str().into(),
            "heading1" => self.heading1.clone().into(),
            "heading2" => self.heading2.clone().into(),
            "heading3" => self.heading3.clone().into(),
            "contentType" => self.content_type.as_str().into(),
            "language" => self.language.clone().into(),
            "content" => self.content.as_str().into(),
            "lineNumber" => self.line_number.into(),
            "order" => self.order.into(),
            _ => FieldValue::Null,
        }
    }
}

impl TableRow for ApiRecord {
    fn field(&self, column: &str) -> FieldValue {
        if column == "type" {
            return self.type_tag().into();
        }

        match self {
            ApiRecord::Operation(op) => match column {
                "filePath" => op.file_path.as_str().into(),
                "fileName" => op.file_name.as_str().into(),
                "apiPath" => op.api_path.as_str().into(),
                "method" => op.method.as_str().into(),
                "operationId" => op.operation_id.clone().into(),
                "summary" => op.summary.clone().into(),
                "description" => op.description.clone().into(),
                "content" => op.content.as_str().into(),
                _ => FieldValue::Null,
            },
            ApiRecord::Schema(schema) => match column {
                "filePath" => schema.file_path.as_str().into(),
                "fileName" => schema.file_name.as_str().into(),
                "schemaName" => schema.schema_name.clone().into(),
                "title" => schema.title.clone().into(),
                "description" => schema.description.clone().into(),
                "content" => schema.content.as_str().into(),
                "schemaDefinition" => schema.schema_definition.as_str().into(),
                "usedBy" => serde_json::to_value(&schema.used_by)
                    .map(FieldValue::Json)
                    .unwrap_or(FieldValue::Null),
                _ => FieldValue::Null,
            },
        }
    }
}
