use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::internal_error::InternalResult;

pub type DBConnection = Arc<Mutex<Connection>>;

pub const DEFAULT_TASK_TYPES: [&str; 3] = ["Task1", "Task2", "Task3"];

const SCHEMA: [&str; 7] = [
    "CREATE TABLE IF NOT EXISTS users (username TEXT NOT NULL UNIQUE, password_hash TEXT NOT NULL, created_at TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS task_types (name TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS categories (name TEXT NOT NULL, description TEXT, task_type_id INTEGER NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS task_items (
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        task_type_id INTEGER NOT NULL,
        category_id INTEGER,
        max_text_boxes INTEGER NOT NULL DEFAULT 1,
        show_navigation INTEGER NOT NULL DEFAULT 0,
        max_audio_recordings INTEGER NOT NULL DEFAULT 3,
        recording_time_limit INTEGER NOT NULL DEFAULT 120,
        replacement_allowed INTEGER NOT NULL DEFAULT 1,
        mastery_level INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS task_text_boxes (task_id INTEGER, text TEXT, created_at TEXT, updated_at TEXT, num INTEGER)",
    "CREATE TABLE IF NOT EXISTS task_media (task_id INTEGER, kind TEXT, path TEXT, num INTEGER)",
    "CREATE TABLE IF NOT EXISTS task_notes (task_id INTEGER, kind TEXT, content TEXT, num INTEGER)",
];

pub fn open_database(path: &Path) -> InternalResult<Connection> {
    let connection = Connection::open(path)?;
    init_database(&connection)?;
    Ok(connection)
}

pub fn init_database(connection: &Connection) -> InternalResult<()> {
    for statement in SCHEMA.iter() {
        connection.execute(statement, [])?;
    }

    seed_task_types(connection)?;

    Ok(())
}

/// Inserts the fixed task types on a fresh database. Returns how many were added.
pub fn seed_task_types(connection: &Connection) -> InternalResult<usize> {
    let existing: i64 =
        connection.query_row("SELECT COUNT(*) FROM task_types", [], |row| row.get(0))?;

    if existing > 0 {
        return Ok(0);
    }

    for name in DEFAULT_TASK_TYPES.iter() {
        connection.execute("INSERT INTO task_types VALUES (?1)", params![name])?;
    }
    tracing::info!("Seeded {} task types", DEFAULT_TASK_TYPES.len());

    Ok(DEFAULT_TASK_TYPES.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_types_are_seeded_once() {
        let connection = Connection::open_in_memory().unwrap();
        init_database(&connection).unwrap();

        assert_eq!(seed_task_types(&connection).unwrap(), 0);
        init_database(&connection).unwrap();

        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM task_types", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
