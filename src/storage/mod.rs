use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::config::{ConfigPaths, StorageOptions};
use crate::model::Note;

mod schema;

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn fetch_all_notes(&self) -> Result<Vec<Note>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id, title, content FROM notes ORDER BY id")?;
            let notes = stmt
                .query_map([], note_from_row)?
                .collect::<Result<Vec<_>, _>>()
                .context("fetching all notes")?;
            Ok(notes)
        })
    }

    pub fn fetch_note(&self, note_id: i64) -> Result<Option<Note>> {
        self.with_connection(|conn| fetch_note_with(conn, note_id))
    }

    pub fn insert_note(&self, title: &str, content: &str) -> Result<Note> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO notes (title, content) VALUES (?1, ?2)",
                params![title, content],
            )
            .context("inserting note")?;
            Ok(Note {
                id: conn.last_insert_rowid(),
                title: title.to_string(),
                content: content.to_string(),
            })
        })
    }

    /// Replaces the given fields in one statement and returns the stored row,
    /// or `None` when no note has `note_id`.
    pub fn update_note(
        &self,
        note_id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Note>> {
        self.with_connection(|conn| {
            let updated = conn
                .execute(
                    "UPDATE notes
                     SET title = COALESCE(?1, title),
                         content = COALESCE(?2, content)
                     WHERE id = ?3",
                    params![title, content, note_id],
                )
                .context("updating note")?;
            if updated == 0 {
                return Ok(None);
            }
            fetch_note_with(conn, note_id)
        })
    }

    pub fn delete_note(&self, note_id: i64) -> Result<bool> {
        self.with_connection(|conn| {
            let deleted = conn
                .execute("DELETE FROM notes WHERE id = ?1", params![note_id])
                .context("deleting note")?;
            Ok(deleted > 0)
        })
    }
}

fn fetch_note_with(conn: &Connection, note_id: i64) -> Result<Option<Note>> {
    conn.query_row(
        "SELECT id, title, content FROM notes WHERE id = ?1",
        params![note_id],
        note_from_row,
    )
    .optional()
    .with_context(|| format!("fetching note {note_id}"))
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
    })
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        paths.database_path.clone()
    } else {
        storage.database_path.clone()
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    tracing::info!(path = %db_path.display(), "database initialised");
    Ok(StorageHandle {
        db_path: Arc::new(db_path),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))
        .context("setting busy timeout")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::temp_storage;
    use super::*;

    #[test]
    fn ids_are_never_reused_after_delete() -> anyhow::Result<()> {
        let (_temp, storage) = temp_storage()?;
        let first = storage.insert_note("one", "")?;
        let second = storage.insert_note("two", "")?;
        assert!(storage.delete_note(second.id)?);

        let third = storage.insert_note("three", "")?;
        assert!(third.id > second.id, "id {} reused", third.id);
        assert!(second.id > first.id);
        Ok(())
    }

    #[test]
    fn update_missing_row_returns_none() -> anyhow::Result<()> {
        let (_temp, storage) = temp_storage()?;
        assert!(storage.update_note(42, Some("t"), None)?.is_none());
        assert!(storage.fetch_all_notes()?.is_empty());
        Ok(())
    }

    #[test]
    fn update_replaces_only_given_fields() -> anyhow::Result<()> {
        let (_temp, storage) = temp_storage()?;
        let note = storage.insert_note("title", "content")?;

        let updated = storage
            .update_note(note.id, Some("renamed"), None)?
            .expect("note present");
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.content, "content");
        Ok(())
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() -> anyhow::Result<()> {
        let (_temp, storage) = temp_storage()?;
        let note = storage.insert_note("title", "")?;
        assert!(storage.delete_note(note.id)?);
        assert!(!storage.delete_note(note.id)?);
        assert!(storage.fetch_note(note.id)?.is_none());
        Ok(())
    }

    #[test]
    fn schema_survives_reopen() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let paths = testing::temp_paths(&temp);
        paths.ensure_directories()?;
        let note = {
            let storage = init(&paths, &StorageOptions::default())?;
            storage.insert_note("persisted", "yes")?
        };
        let reopened = init(&paths, &StorageOptions::default())?;
        assert_eq!(reopened.fetch_note(note.id)?, Some(note));
        Ok(())
    }
}
