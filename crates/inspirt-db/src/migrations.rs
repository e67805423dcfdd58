use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE accounts (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                credits     INTEGER NOT NULL DEFAULT 10,
                is_admin    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE access_codes (
                id          TEXT PRIMARY KEY,
                code        TEXT NOT NULL UNIQUE,
                is_used     INTEGER NOT NULL DEFAULT 0,
                used_by     TEXT REFERENCES accounts(id),
                used_at     TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE replicas (
                id                       TEXT PRIMARY KEY,
                account_id               TEXT NOT NULL REFERENCES accounts(id),
                name                     TEXT NOT NULL,
                voice_id                 TEXT,
                personality_description  TEXT,
                personality_traits       TEXT,
                photos                   TEXT,
                is_generated             INTEGER NOT NULL DEFAULT 0,
                created_at               TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_replicas_account ON replicas(account_id);

            CREATE TABLE chat_messages (
                id             TEXT PRIMARY KEY,
                replica_id     TEXT NOT NULL REFERENCES replicas(id),
                role           TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content        TEXT NOT NULL,
                audio_url      TEXT,
                feedback       TEXT,
                feedback_text  TEXT,
                created_at     TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_replica ON chat_messages(replica_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
