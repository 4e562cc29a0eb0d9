//! SQL migration definitions for the ControlQA database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: controls",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per (family, control_id); question text kept as stored upstream
CREATE TABLE IF NOT EXISTS controls (
    family              TEXT NOT NULL,
    control_id          TEXT NOT NULL,
    name                TEXT NOT NULL,
    generated_questions TEXT NOT NULL DEFAULT '',
    updated_at          TEXT NOT NULL,
    UNIQUE(family, control_id)
);

CREATE INDEX IF NOT EXISTS idx_controls_family ON controls(family);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Audit log of pipeline responses",
            sql: r#"
CREATE TABLE IF NOT EXISTS audit_log (
    id         TEXT PRIMARY KEY,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_log_created ON audit_log(created_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
