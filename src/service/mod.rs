use thiserror::Error;

use crate::model::{NewNote, Note, NotePatch};
use crate::storage::StorageHandle;

/// Failure taxonomy shared by every [`NotesApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("note {0} not found")]
    NotFound(i64),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl NoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NoteError::NotFound(_))
    }
}

pub type NoteResult<T> = Result<T, NoteError>;

/// Create/read/update/delete over the note store.
///
/// Implemented in-process by [`LocalNotes`] and over HTTP by
/// [`crate::client::HttpNotes`]; front-end state only ever talks to this trait.
pub trait NotesApi: Send + Sync {
    fn list(&self) -> NoteResult<Vec<Note>>;
    fn get(&self, id: i64) -> NoteResult<Note>;
    fn create(&self, note: &NewNote) -> NoteResult<Note>;
    fn update(&self, id: i64, patch: &NotePatch) -> NoteResult<Note>;
    fn delete(&self, id: i64) -> NoteResult<()>;
}

/// Service over the local SQLite store. The backend's request handlers
/// delegate here.
#[derive(Clone)]
pub struct LocalNotes {
    storage: StorageHandle,
}

impl LocalNotes {
    pub fn new(storage: StorageHandle) -> Self {
        Self { storage }
    }
}

impl NotesApi for LocalNotes {
    fn list(&self) -> NoteResult<Vec<Note>> {
        self.storage.fetch_all_notes().map_err(transport)
    }

    fn get(&self, id: i64) -> NoteResult<Note> {
        self.storage
            .fetch_note(id)
            .map_err(transport)?
            .ok_or(NoteError::NotFound(id))
    }

    fn create(&self, note: &NewNote) -> NoteResult<Note> {
        let (title, content) = validate_new_note(note)?;
        let note = self
            .storage
            .insert_note(title, content)
            .map_err(transport)?;
        tracing::debug!(note_id = note.id, "note created");
        Ok(note)
    }

    fn update(&self, id: i64, patch: &NotePatch) -> NoteResult<Note> {
        self.storage
            .update_note(id, patch.title.as_deref(), patch.content.as_deref())
            .map_err(transport)?
            .ok_or(NoteError::NotFound(id))
    }

    fn delete(&self, id: i64) -> NoteResult<()> {
        if self.storage.delete_note(id).map_err(transport)? {
            tracing::debug!(note_id = id, "note deleted");
            Ok(())
        } else {
            Err(NoteError::NotFound(id))
        }
    }
}

pub const MISSING_FIELDS_MESSAGE: &str = "Title and content are required";

/// Title must be present and non-blank; content must be present but may be empty.
fn validate_new_note(note: &NewNote) -> NoteResult<(&str, &str)> {
    match (note.title.as_deref(), note.content.as_deref()) {
        (Some(title), Some(content)) if !title.trim().is_empty() => Ok((title, content)),
        _ => Err(NoteError::InvalidInput(MISSING_FIELDS_MESSAGE.to_string())),
    }
}

fn transport(err: anyhow::Error) -> NoteError {
    tracing::error!(error = ?err, "note store failure");
    NoteError::Transport(format!("{err:#}"))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Wraps [`LocalNotes`], counting calls and failing on demand.
    pub struct RecordingNotes {
        inner: LocalNotes,
        failing: AtomicBool,
        calls: Mutex<Vec<&'static str>>,
        lists: AtomicUsize,
    }

    impl RecordingNotes {
        pub fn new(inner: LocalNotes) -> Self {
            Self {
                inner,
                failing: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
                lists: AtomicUsize::new(0),
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Mutating calls in order, e.g. `["create", "update"]`.
        pub fn writes(&self) -> Vec<&'static str> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }

        pub fn list_calls(&self) -> usize {
            self.lists.load(Ordering::SeqCst)
        }

        pub fn inner(&self) -> &LocalNotes {
            &self.inner
        }

        fn check(&self) -> NoteResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(NoteError::Transport("backend unreachable".into()))
            } else {
                Ok(())
            }
        }

        fn record(&self, call: &'static str) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }
    }

    impl NotesApi for RecordingNotes {
        fn list(&self) -> NoteResult<Vec<Note>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.list()
        }

        fn get(&self, id: i64) -> NoteResult<Note> {
            self.check()?;
            self.inner.get(id)
        }

        fn create(&self, note: &NewNote) -> NoteResult<Note> {
            self.record("create");
            self.check()?;
            self.inner.create(note)
        }

        fn update(&self, id: i64, patch: &NotePatch) -> NoteResult<Note> {
            self.record("update");
            self.check()?;
            self.inner.update(id, patch)
        }

        fn delete(&self, id: i64) -> NoteResult<()> {
            self.record("delete");
            self.check()?;
            self.inner.delete(id)
        }
    }
}
