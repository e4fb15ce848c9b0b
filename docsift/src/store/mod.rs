//! Snapshot artifact store
//!
//! Every ingestion pass writes each table into its own SQLite file under the
//! index directory:
//! - `content_blocks.sqlite` holds Markdown/MDX blocks
//! - `api_specs.sqlite` holds operation and schema records
//!
//! A table is staged in memory, exported with `VACUUM INTO` next to the
//! final artifact and renamed over it, so readers never observe a partial
//! table. Artifacts are opened read-only on the query side.

pub mod schema;

use crate::error::{Error, Result};
use crate::records::{
    ApiRecord, ContentBlock, ContentType, OperationRecord, SchemaRecord, UsageRef,
};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

pub use schema::{
    quote_ident, FieldValue, TableRow, TableSchema, API_SPECS_TABLE, API_SPEC_SCHEMA,
    CONTENT_BLOCKS_TABLE, CONTENT_BLOCK_SCHEMA, SCHEMA_VERSION,
};

/// Outcome of writing one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub artifact: PathBuf,
    pub written: usize,
    pub skipped: usize,
}

/// Metadata recorded alongside each table
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexState {
    pub schema_version: i64,
    pub built_at: String,
    pub row_count: usize,
}

/// Writer for snapshot artifacts in one index directory
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the artifact holding `table`
    pub fn artifact_path(&self, table: &str) -> PathBuf {
        artifact_path(&self.dir, table)
    }

    /// Replace `table` with `records`.
    ///
    /// Rows that fail to encode are logged and skipped. Failing to create the
    /// table or export the artifact aborts with [`Error::Artifact`] and leaves
    /// any previous artifact in place.
    pub fn write<R, I>(&self, table: &str, schema: &TableSchema, records: I) -> Result<WriteStats>
    where
        R: TableRow,
        I: IntoIterator<Item = R>,
    {
        let artifact_err =
            |what: &str, err: &dyn std::fmt::Display| Error::Artifact(format!("{} {}: {}", what, table, err));

        std::fs::create_dir_all(&self.dir).map_err(|e| artifact_err("cannot create index directory for", &e))?;

        let mut conn = Connection::open_in_memory().map_err(|e| artifact_err("cannot stage", &e))?;
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}; {}; {}",
            quote_ident(table),
            schema.create_sql(table),
            schema::INDEX_STATE_SQL
        ))
        .map_err(|e| artifact_err("cannot create table", &e))?;

        let mut written = 0;
        let mut skipped = 0;
        {
            let tx = conn.transaction()?;
            {
                let mut insert = tx.prepare(&schema.insert_sql(table))?;
                for (position, record) in records.into_iter().enumerate() {
                    let row = match record.encode(schema) {
                        Ok(row) => row,
                        Err(e) => {
                            tracing::warn!("Skipping row {} of {}: {}", position, table, e);
                            skipped += 1;
                            continue;
                        }
                    };
                    match insert.execute(params_from_iter(row)) {
                        Ok(_) => written += 1,
                        Err(e) => {
                            tracing::warn!("Skipping row {} of {}: {}", position, table, e);
                            skipped += 1;
                        }
                    }
                }
            }

            let now = Utc::now().to_rfc3339();
            let mut state = tx.prepare("INSERT OR REPLACE INTO index_state (key, value) VALUES (?1, ?2)")?;
            state.execute(params!["schema_version", SCHEMA_VERSION.to_string()])?;
            state.execute(params!["built_at", now])?;
            state.execute(params!["row_count", written.to_string()])?;
            drop(state);
            tx.commit()?;
        }

        let artifact = self.artifact_path(table);
        self.export(&conn, table, &artifact)
            .map_err(|e| artifact_err("cannot export", &e))?;

        tracing::info!(
            "Wrote {} rows to {} ({} skipped)",
            written,
            artifact.display(),
            skipped
        );

        Ok(WriteStats {
            artifact,
            written,
            skipped,
        })
    }

    fn export(&self, conn: &Connection, table: &str, artifact: &Path) -> Result<()> {
        let staging = self.dir.join(format!(".{}.sqlite.tmp", table));
        if staging.exists() {
            std::fs::remove_file(&staging)?;
        }

        let target = staging.to_string_lossy().replace('\'', "''");
        if let Err(e) = conn.execute_batch(&format!("VACUUM INTO '{}'", target)) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        if let Err(e) = std::fs::rename(&staging, artifact) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Path of the artifact holding `table` inside `dir`
pub fn artifact_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.sqlite", table))
}

/// Read-only view of one artifact
pub struct Artifact {
    conn: Connection,
}

impl Artifact {
    /// Open an existing artifact read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::ArtifactMissing(path));
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Metadata written with the table, if present
    pub fn state(&self) -> Result<Option<IndexState>> {
        let value = |key: &str| -> Result<Option<String>> {
            Ok(self
                .conn
                .query_row("SELECT value FROM index_state WHERE key = ?1", [key], |row| row.get(0))
                .optional()?)
        };

        let (Some(version), Some(built_at), Some(count)) =
            (value("schema_version")?, value("built_at")?, value("row_count")?)
        else {
            return Ok(None);
        };

        Ok(Some(IndexState {
            schema_version: parse_state_value(&version)?,
            built_at,
            row_count: parse_state_value(&count)?,
        }))
    }

    /// All content blocks in ingestion order
    pub fn content_blocks(&self) -> Result<Vec<ContentBlock>> {
        self.blocks_where(None)
    }

    /// Content blocks of one file, in document order
    pub fn content_blocks_for(&self, file_path: &str) -> Result<Vec<ContentBlock>> {
        self.blocks_where(Some(file_path))
    }

    fn blocks_where(&self, file_path: Option<&str>) -> Result<Vec<ContentBlock>> {
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY rowid",
            CONTENT_BLOCK_SCHEMA.select_list(),
            quote_ident(CONTENT_BLOCKS_TABLE),
            if file_path.is_some() { "WHERE \"filePath\" = ?1" } else { "" }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match file_path {
            Some(path) => stmt.query_map([path], block_from_row)?,
            None => stmt.query_map([], block_from_row)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// All operation and schema records in ingestion order
    pub fn api_records(&self) -> Result<Vec<ApiRecord>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            API_SPEC_SCHEMA.select_list(),
            quote_ident(API_SPECS_TABLE)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], api_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn parse_state_value<T>(value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            .into()
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<ContentBlock> {
    let content_type: String = row.get("contentType")?;
    let content_type = parse_content_type(&content_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown content type {}", content_type).into(),
        )
    })?;

    Ok(ContentBlock {
        file_path: row.get("filePath")?,
        file_name: row.get("fileName")?,
        heading1: row.get("heading1")?,
        heading2: row.get("heading2")?,
        heading3: row.get("heading3")?,
        content_type,
        language: row.get("language")?,
        content: row.get("content")?,
        line_number: row.get::<_, i64>("lineNumber")? as usize,
        order: row.get::<_, i64>("order")? as usize,
    })
}

fn parse_content_type(name: &str) -> Option<ContentType> {
    [
        ContentType::Paragraph,
        ContentType::Code,
        ContentType::ListItem,
        ContentType::TableCell,
        ContentType::Blockquote,
    ]
    .into_iter()
    .find(|t| t.as_str() == name)
}

fn api_from_row(row: &Row<'_>) -> rusqlite::Result<ApiRecord> {
    let kind: String = row.get("type")?;
    if kind == "schema" {
        let used_by: Vec<UsageRef> = match row.get::<_, Option<String>>("usedBy")? {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    12,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            None => Vec::new(),
        };

        Ok(ApiRecord::Schema(SchemaRecord {
            file_path: row.get("filePath")?,
            file_name: row.get("fileName")?,
            schema_name: row.get("schemaName")?,
            title: row.get("title")?,
            description: row.get("description")?,
            content: row.get("content")?,
            schema_definition: row
                .get::<_, Option<String>>("schemaDefinition")?
                .unwrap_or_default(),
            used_by,
        }))
    } else {
        Ok(ApiRecord::Operation(OperationRecord {
            file_path: row.get("filePath")?,
            file_name: row.get("fileName")?,
            api_path: row.get::<_, Option<String>>("apiPath")?.unwrap_or_default(),
            method: row.get::<_, Option<String>>("method")?.unwrap_or_default(),
            operation_id: row.get("operationId")?,
            summary: row.get("summary")?,
            description: row.get("description")?,
            content: row.get("content")?,
        }))
    }
}
