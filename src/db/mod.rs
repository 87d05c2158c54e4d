//! Presentation record persistence.
//!
//! Raw SQL with rusqlite, no ORM. Handlers open a fresh connection per
//! operation inside `spawn_blocking`; migrations run on open.

pub mod presentations;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub use presentations::PresentationRepository;

pub fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS presentations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            pdf_key TEXT NOT NULL,
            preset_json TEXT NOT NULL,
            slides_status TEXT NOT NULL,
            slides_json TEXT NOT NULL,
            presentation_status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create presentations table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_presentations_user ON presentations(user_id)",
        [],
    )
    .context("Failed to create index on user_id")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS clips (
            presentation_id TEXT NOT NULL,
            slide_index INTEGER NOT NULL,
            video_key TEXT NOT NULL,
            audio_key TEXT NOT NULL,
            feedback_json TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(presentation_id, slide_index)
        )",
        [],
    )
    .context("Failed to create clips table")?;

    Ok(())
}
