//! libSQL storage layer for control documents and the audit log.
//!
//! The [`Storage`] struct wraps an embedded libSQL database holding the
//! control catalogue (family, control id, name, generated questions) and the
//! optional audit log of pipeline responses.
//!
//! **Access rules:**
//! - CLI import and pipeline audit writes: read-write via [`Storage::open`]
//! - Read-only consumers: [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use controlqa_shared::{AuditRecord, ControlDocument, ControlQaError, Result};
use libsql::{Connection, Database, Row, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> ControlQaError {
    ControlQaError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ControlQaError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ControlQaError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ControlQaError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ControlQaError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Control operations
    // -----------------------------------------------------------------------

    /// Insert a control, replacing name and questions if it already exists.
    pub async fn upsert_control(&self, doc: &ControlDocument) -> Result<()> {
        self.check_writable()?;
        upsert_on(&self.conn, doc, &Utc::now().to_rfc3339()).await
    }

    /// Look up a control by exact family and control id.
    pub async fn get_control(
        &self,
        family: &str,
        control_id: &str,
    ) -> Result<Option<ControlDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT family, control_id, name, generated_questions
                 FROM controls WHERE family = ?1 AND control_id = ?2
                 ORDER BY rowid LIMIT 1",
                params![family, control_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_control(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List all controls ordered by family, then numeric control id.
    pub async fn list_controls(&self) -> Result<Vec<ControlDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT family, control_id, name, generated_questions
                 FROM controls ORDER BY family, CAST(control_id AS INTEGER), control_id",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_control(&row)?);
        }
        Ok(results)
    }

    /// Upsert a batch of controls in one transaction. Returns the count written.
    pub async fn import_controls(&self, docs: &[ControlDocument]) -> Result<usize> {
        self.check_writable()?;
        for doc in docs {
            validate_document(doc)?;
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        for doc in docs {
            upsert_on(&tx, doc, &now).await?;
        }
        tx.commit().await.map_err(storage_err)?;

        tracing::info!(count = docs.len(), "imported controls");
        Ok(docs.len())
    }

    // -----------------------------------------------------------------------
    // Audit log
    // -----------------------------------------------------------------------

    /// Append an audit record.
    pub async fn insert_audit(&self, record: &AuditRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO audit_log (id, content, created_at) VALUES (?1, ?2, ?3)",
                params![
                    record.id.to_string(),
                    record.content.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent audit records first.
    pub async fn list_audit(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, content, created_at FROM audit_log
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
                params![i64::from(limit)],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let id: String = row.get(0).map_err(storage_err)?;
            let created_at: String = row.get(2).map_err(storage_err)?;
            results.push(AuditRecord {
                id: id
                    .parse()
                    .map_err(|e| ControlQaError::Storage(format!("bad audit id {id}: {e}")))?,
                content: row.get(1).map_err(storage_err)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map_err(storage_err)?
                    .with_timezone(&Utc),
            });
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Import files
// ---------------------------------------------------------------------------

/// Read a JSON array of control documents from disk.
pub fn read_import_file(path: &Path) -> Result<Vec<ControlDocument>> {
    let content = std::fs::read_to_string(path).map_err(|e| ControlQaError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ControlQaError::validation(format!("failed to parse {}: {e}", path.display()))
    })
}

const UPSERT_CONTROL_SQL: &str =
    "INSERT INTO controls (family, control_id, name, generated_questions, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(family, control_id) DO UPDATE SET
       name = excluded.name,
       generated_questions = excluded.generated_questions,
       updated_at = excluded.updated_at";

/// Upsert one control on `conn`, which may be a transaction.
async fn upsert_on(conn: &Connection, doc: &ControlDocument, now: &str) -> Result<()> {
    conn.execute(
        UPSERT_CONTROL_SQL,
        params![
            doc.family.as_str(),
            doc.control_id.as_str(),
            doc.name.as_str(),
            doc.generated_questions.as_str(),
            now,
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

fn validate_document(doc: &ControlDocument) -> Result<()> {
    if doc.family.trim().is_empty() || doc.control_id.trim().is_empty() {
        return Err(ControlQaError::validation(format!(
            "control '{}' is missing Family or ControlID",
            doc.name
        )));
    }
    Ok(())
}

fn row_to_control(row: &Row) -> Result<ControlDocument> {
    Ok(ControlDocument {
        family: row.get(0).map_err(storage_err)?,
        control_id: row.get(1).map_err(storage_err)?,
        name: row.get(2).map_err(storage_err)?,
        generated_questions: row.get(3).map_err(storage_err)?,
    })
}
