use std::collections::HashSet;

use indexmap::IndexMap;

use crate::editor::EditorSession;
use crate::model::Note;
use crate::service::{NoteError, NoteResult, NotesApi};

use super::input::TextCursor;

pub const LIST_LOAD_ERROR: &str = "Failed to load notes. Make sure the server is running.";
pub const DELETE_ERROR: &str = "Failed to delete the note. Please try again.";
pub const DETAIL_LOAD_ERROR: &str = "Could not load note details. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// Whether a list fetch replaces the screen with a spinner or refreshes in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Initial,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyPending,
    /// The list was refetched; carries the message to show.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteSettled {
    Removed,
    NeedsRefetch(String),
}

/// The notes list: a cache of the backend list, refetched whenever the list
/// regains focus and invalidated wholesale when a delete fails.
#[derive(Debug)]
pub struct NotesListView {
    notes: IndexMap<i64, Note>,
    load_state: LoadState,
    refreshing: bool,
    pending_deletes: HashSet<i64>,
    selected: usize,
}

impl Default for NotesListView {
    fn default() -> Self {
        Self::new()
    }
}

impl NotesListView {
    pub fn new() -> Self {
        Self {
            notes: IndexMap::new(),
            load_state: LoadState::Loading,
            refreshing: false,
            pending_deletes: HashSet::new(),
            selected: 0,
        }
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.notes.contains_key(&id)
    }

    pub fn is_delete_pending(&self, id: i64) -> bool {
        self.pending_deletes.contains(&id)
    }

    pub fn selected_index(&self) -> Option<usize> {
        (!self.notes.is_empty()).then_some(self.selected)
    }

    pub fn selected(&self) -> Option<&Note> {
        self.notes.get_index(self.selected).map(|(_, note)| note)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.notes.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn begin_load(&mut self, kind: LoadKind) {
        match kind {
            LoadKind::Initial => self.load_state = LoadState::Loading,
            LoadKind::Refresh => self.refreshing = true,
        }
    }

    pub fn finish_load(&mut self, kind: LoadKind, result: NoteResult<Vec<Note>>) {
        match result {
            Ok(notes) => {
                let selected_id = self.selected().map(|note| note.id);
                self.notes = notes.into_iter().map(|note| (note.id, note)).collect();
                self.selected = selected_id
                    .and_then(|id| self.notes.get_index_of(&id))
                    .unwrap_or(self.selected);
                self.clamp_selection();
                self.load_state = LoadState::Ready;
            }
            Err(err) => {
                tracing::warn!(%err, "fetching notes failed");
                self.load_state = LoadState::Failed(LIST_LOAD_ERROR.to_string());
            }
        }
        if kind == LoadKind::Refresh {
            self.refreshing = false;
        }
    }

    fn fetch(&mut self, api: &dyn NotesApi, kind: LoadKind) {
        self.begin_load(kind);
        let result = api.list();
        self.finish_load(kind, result);
    }

    /// The list screen became visible again.
    pub fn on_focus(&mut self, api: &dyn NotesApi) {
        self.fetch(api, LoadKind::Initial);
    }

    /// Pull-to-refresh: keeps the current list on screen while fetching.
    pub fn refresh(&mut self, api: &dyn NotesApi) {
        self.fetch(api, LoadKind::Refresh);
    }

    pub fn retry(&mut self, api: &dyn NotesApi) {
        self.fetch(api, LoadKind::Initial);
    }

    /// Marks `id` as being deleted. Returns false when a delete for it is
    /// already in flight, in which case no request should be sent.
    pub fn begin_delete(&mut self, id: i64) -> bool {
        self.pending_deletes.insert(id)
    }

    /// Applies a delete result without touching the network.
    pub fn settle_delete(&mut self, id: i64, result: NoteResult<()>) -> DeleteSettled {
        self.pending_deletes.remove(&id);
        match result {
            Ok(()) => {
                self.notes.shift_remove(&id);
                self.clamp_selection();
                DeleteSettled::Removed
            }
            Err(err) => {
                tracing::warn!(%err, note_id = id, "delete failed");
                DeleteSettled::NeedsRefetch(DELETE_ERROR.to_string())
            }
        }
    }

    /// Applies a delete result; on failure the whole list is refetched.
    pub fn finish_delete(
        &mut self,
        id: i64,
        result: NoteResult<()>,
        api: &dyn NotesApi,
    ) -> DeleteOutcome {
        match self.settle_delete(id, result) {
            DeleteSettled::Removed => DeleteOutcome::Deleted,
            DeleteSettled::NeedsRefetch(message) => {
                self.fetch(api, LoadKind::Initial);
                DeleteOutcome::Failed(message)
            }
        }
    }

    pub fn delete(&mut self, api: &dyn NotesApi, id: i64) -> DeleteOutcome {
        if !self.begin_delete(id) {
            return DeleteOutcome::AlreadyPending;
        }
        let result = api.delete(id);
        self.finish_delete(id, result, api)
    }

    fn clamp_selection(&mut self) {
        if self.notes.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.notes.len() {
            self.selected = self.notes.len() - 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailState {
    Loading,
    Loaded(Note),
    Failed(String),
}

/// A single note, refetched on every focus. A missing note and an unreachable
/// backend land in the same retryable state.
#[derive(Debug)]
pub struct NoteDetailView {
    note_id: i64,
    state: DetailState,
}

impl NoteDetailView {
    pub fn new(note_id: i64) -> Self {
        Self {
            note_id,
            state: DetailState::Loading,
        }
    }

    pub fn note_id(&self) -> i64 {
        self.note_id
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn note(&self) -> Option<&Note> {
        match &self.state {
            DetailState::Loaded(note) => Some(note),
            _ => None,
        }
    }

    pub fn begin_load(&mut self) {
        self.state = DetailState::Loading;
    }

    pub fn finish_load(&mut self, result: NoteResult<Note>) {
        self.state = match result {
            Ok(note) => DetailState::Loaded(note),
            Err(err) => {
                match &err {
                    NoteError::NotFound(_) => {
                        tracing::debug!(note_id = self.note_id, "note no longer exists")
                    }
                    _ => tracing::warn!(%err, note_id = self.note_id, "fetching note failed"),
                }
                DetailState::Failed(DETAIL_LOAD_ERROR.to_string())
            }
        };
    }

    pub fn on_focus(&mut self, api: &dyn NotesApi) {
        self.begin_load();
        let result = api.get(self.note_id);
        self.finish_load(result);
    }

    pub fn retry(&mut self, api: &dyn NotesApi) {
        self.on_focus(api);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorField {
    Title,
    Content,
}

/// The editor screen: a session plus per-field cursors.
#[derive(Debug)]
pub struct EditorScreen {
    pub session: EditorSession,
    pub session_id: u64,
    pub focus: EditorField,
    pub title_cursor: TextCursor,
    pub content_cursor: TextCursor,
}

impl EditorScreen {
    pub fn new(session: EditorSession, session_id: u64) -> Self {
        let draft = session.draft();
        let title_cursor = TextCursor::at_end(&draft.title);
        let content_cursor = TextCursor::at_end(&draft.content);
        let focus = if draft.title.is_empty() {
            EditorField::Title
        } else {
            EditorField::Content
        };
        Self {
            session,
            session_id,
            focus,
            title_cursor,
            content_cursor,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            EditorField::Title => EditorField::Content,
            EditorField::Content => EditorField::Title,
        };
    }

    pub fn focused_text(&self) -> &str {
        let draft = self.session.draft();
        match self.focus {
            EditorField::Title => &draft.title,
            EditorField::Content => &draft.content,
        }
    }

    pub fn focused_cursor(&self) -> TextCursor {
        match self.focus {
            EditorField::Title => self.title_cursor,
            EditorField::Content => self.content_cursor,
        }
    }

    pub fn focused_cursor_mut(&mut self) -> &mut TextCursor {
        match self.focus {
            EditorField::Title => &mut self.title_cursor,
            EditorField::Content => &mut self.content_cursor,
        }
    }

    /// Re-seats both cursors after undo/redo swapped the text.
    pub fn clamp_cursors(&mut self) {
        let draft = self.session.draft();
        self.title_cursor.clamp(&draft.title);
        self.content_cursor.clamp(&draft.content);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    ConfirmDelete { note_id: i64, title: String },
    Alert { title: String, message: String },
    Help,
}
