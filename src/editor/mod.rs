use std::time::Instant;

use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{AutoSaveConfig, EditorConfig};
use crate::model::{NewNote, Note, NotePatch};
use crate::service::{NoteError, NoteResult, NotesApi};

pub mod autosave;
pub mod history;

pub use autosave::{AutoSaveStatus, AutoSaveTimer};
pub use history::UndoHistory;

/// In-progress title and content of the note being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
}

impl Draft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn from_note(note: &Note) -> Self {
        Self::new(note.title.clone(), note.content.clone())
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// Content length in user-perceived characters.
    pub fn char_count(&self) -> usize {
        grapheme_len(&self.content)
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

fn grapheme_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// One edit; `None` leaves that field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftChange {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl DraftChange {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Field {
    Title,
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditRejection {
    #[error("{field} is limited to {limit} characters")]
    LimitExceeded { field: Field, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The change left the draft as it was; nothing recorded.
    Unchanged,
    Rejected(EditRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    New,
    Existing(i64),
}

/// A save taken off the session, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub target: SaveTarget,
    pub draft: Draft,
}

impl PendingSave {
    pub fn dispatch(&self, api: &dyn NotesApi) -> NoteResult<Note> {
        match self.target {
            SaveTarget::New => api.create(&NewNote::new(
                self.draft.title.clone(),
                self.draft.content.clone(),
            )),
            SaveTarget::Existing(id) => api.update(
                id,
                &NotePatch::full(self.draft.title.clone(), self.draft.content.clone()),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    #[error("Please enter a title for the note.")]
    TitleRequired,
    #[error("A save is already in progress.")]
    InFlight,
    #[error("The note could not be saved: {0}")]
    Api(#[from] NoteError),
}

/// What leaving the editor did with unsaved changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Clean,
    Flushed(Note),
    FlushFailed(NoteError),
    Discarded,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    title: usize,
    content: Option<usize>,
}

/// Editing state for a single note: draft, undo/redo and debounced saving.
///
/// Time is passed in by the caller so the terminal loop and tests drive the
/// debounce the same way.
#[derive(Debug)]
pub struct EditorSession {
    target: SaveTarget,
    draft: Draft,
    history: UndoHistory<Draft>,
    timer: AutoSaveTimer,
    limits: Limits,
    autosave_new: bool,
}

impl EditorSession {
    pub fn new_note(editor: &EditorConfig, auto_save: &AutoSaveConfig) -> Self {
        Self::with_target(SaveTarget::New, Draft::default(), editor, auto_save)
    }

    pub fn for_note(note: &Note, editor: &EditorConfig, auto_save: &AutoSaveConfig) -> Self {
        Self::with_target(
            SaveTarget::Existing(note.id),
            Draft::from_note(note),
            editor,
            auto_save,
        )
    }

    fn with_target(
        target: SaveTarget,
        draft: Draft,
        editor: &EditorConfig,
        auto_save: &AutoSaveConfig,
    ) -> Self {
        Self {
            target,
            timer: AutoSaveTimer::new(auto_save, draft.clone()),
            draft,
            history: UndoHistory::new(editor.undo_limit),
            limits: Limits {
                title: editor.title_max_length,
                content: editor.max_length,
            },
            autosave_new: auto_save.on_new_notes,
        }
    }

    pub fn target(&self) -> SaveTarget {
        self.target
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn history(&self) -> &UndoHistory<Draft> {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn content_limit(&self) -> Option<usize> {
        self.limits.content
    }

    pub fn is_dirty(&self) -> bool {
        self.timer.differs_from_saved(&self.draft)
    }

    pub fn autosave_status(&self) -> AutoSaveStatus {
        self.timer.status(&self.draft)
    }

    pub fn is_saving(&self) -> bool {
        self.timer.is_in_flight()
    }

    fn autosave_applies(&self) -> bool {
        self.timer.is_enabled() && (self.autosave_new || self.target != SaveTarget::New)
    }

    pub fn set_title(&mut self, title: impl Into<String>, now: Instant) -> EditOutcome {
        self.edit(DraftChange::title(title), now)
    }

    pub fn set_content(&mut self, content: impl Into<String>, now: Instant) -> EditOutcome {
        self.edit(DraftChange::content(content), now)
    }

    pub fn edit(&mut self, change: DraftChange, now: Instant) -> EditOutcome {
        // Text already over a limit may still shrink towards it.
        if let Some(title) = &change.title {
            let len = grapheme_len(title);
            if len > self.limits.title && len > grapheme_len(&self.draft.title) {
                return EditOutcome::Rejected(EditRejection::LimitExceeded {
                    field: Field::Title,
                    limit: self.limits.title,
                });
            }
        }
        if let (Some(content), Some(limit)) = (&change.content, self.limits.content) {
            let len = grapheme_len(content);
            if len > limit && len > grapheme_len(&self.draft.content) {
                return EditOutcome::Rejected(EditRejection::LimitExceeded {
                    field: Field::Content,
                    limit,
                });
            }
        }

        let mut next = self.draft.clone();
        if let Some(title) = change.title {
            next.title = title;
        }
        if let Some(content) = change.content {
            next.content = content;
        }
        if next == self.draft {
            return EditOutcome::Unchanged;
        }

        let previous = std::mem::replace(&mut self.draft, next);
        self.history.record(previous);
        self.schedule(now);
        EditOutcome::Applied
    }

    pub fn undo(&mut self, now: Instant) -> bool {
        match self.history.undo(self.draft.clone()) {
            Some(previous) => {
                self.draft = previous;
                self.schedule(now);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        match self.history.redo(self.draft.clone()) {
            Some(next) => {
                self.draft = next;
                self.schedule(now);
                true
            }
            None => false,
        }
    }

    fn schedule(&mut self, now: Instant) {
        if self.autosave_applies() {
            self.timer.arm(now);
        }
    }

    /// Takes the due auto-save, if any. The caller sends it and reports back
    /// through [`EditorSession::finish_save`].
    pub fn poll_due(&mut self, now: Instant) -> Option<PendingSave> {
        if !self.timer.is_due(now) {
            return None;
        }
        self.timer.cancel();
        if !self.is_dirty() || !self.autosave_applies() {
            return None;
        }
        if self.target == SaveTarget::New && !self.draft.has_title() {
            return None;
        }
        self.timer.begin();
        Some(PendingSave {
            target: self.target,
            draft: self.draft.clone(),
        })
    }

    /// Records an auto-save result. Failures are logged and kept for the
    /// status line only.
    pub fn finish_save(&mut self, pending: PendingSave, result: NoteResult<Note>) {
        match result {
            Ok(note) => {
                if pending.target == SaveTarget::New {
                    tracing::info!(note_id = note.id, "draft auto-saved as new note");
                    self.target = SaveTarget::Existing(note.id);
                } else {
                    tracing::debug!(note_id = note.id, "note auto-saved");
                }
                self.timer.mark_saved(pending.draft, &self.draft);
            }
            Err(err) => {
                tracing::warn!(%err, target = ?pending.target, "auto-save failed");
                self.timer.mark_failed(err.to_string());
            }
        }
    }

    /// Synchronous auto-save tick: dispatches on `api` when due.
    pub fn poll_autosave(&mut self, api: &dyn NotesApi, now: Instant) -> Option<NoteResult<Note>> {
        let pending = self.poll_due(now)?;
        let result = pending.dispatch(api);
        self.finish_save(pending, result.clone());
        Some(result)
    }

    /// Manual save. Runs regardless of auto-save state; on failure the draft
    /// is left untouched so the user can retry.
    pub fn save_now(&mut self, api: &dyn NotesApi) -> Result<Note, SaveError> {
        if !self.draft.has_title() {
            return Err(SaveError::TitleRequired);
        }
        if self.timer.is_in_flight() {
            return Err(SaveError::InFlight);
        }
        self.timer.cancel();
        let pending = PendingSave {
            target: self.target,
            draft: self.draft.clone(),
        };
        self.timer.begin();
        match pending.dispatch(api) {
            Ok(note) => {
                self.target = SaveTarget::Existing(note.id);
                self.timer.mark_saved(pending.draft, &self.draft);
                tracing::info!(note_id = note.id, "note saved");
                Ok(note)
            }
            Err(err) => {
                self.timer.release();
                tracing::warn!(%err, "manual save failed");
                Err(SaveError::Api(err))
            }
        }
    }

    /// Leaves the editor. With auto-save on, unsaved changes get one final
    /// save (a new draft only once it has a title); otherwise they are
    /// discarded.
    pub fn close(mut self, api: &dyn NotesApi) -> CloseOutcome {
        self.timer.cancel();
        if !self.is_dirty() {
            return CloseOutcome::Clean;
        }
        let flush = match self.target {
            SaveTarget::Existing(_) => self.autosave_applies(),
            SaveTarget::New => self.autosave_applies() && self.draft.has_title(),
        };
        if !flush {
            tracing::debug!("unsaved draft discarded");
            return CloseOutcome::Discarded;
        }
        let pending = PendingSave {
            target: self.target,
            draft: self.draft.clone(),
        };
        match pending.dispatch(api) {
            Ok(note) => {
                tracing::debug!(note_id = note.id, "flushed on close");
                CloseOutcome::Flushed(note)
            }
            Err(err) => {
                tracing::warn!(%err, "final save on close failed");
                CloseOutcome::FlushFailed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::service::testing::RecordingNotes;
    use crate::service::LocalNotes;
    use crate::storage::testing::temp_storage;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn configs(on_new_notes: bool) -> (EditorConfig, AutoSaveConfig) {
        let auto_save = AutoSaveConfig {
            on_new_notes,
            ..AutoSaveConfig::default()
        };
        (EditorConfig::default(), auto_save)
    }

    fn recording() -> anyhow::Result<(TempDir, RecordingNotes)> {
        let (temp, storage) = temp_storage()?;
        Ok((temp, RecordingNotes::new(LocalNotes::new(storage))))
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn edits_record_previous_state_and_clear_redo() {
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::new_note(&editor, &auto_save);
        let now = Instant::now();

        assert_eq!(session.set_title("a", now), EditOutcome::Applied);
        assert_eq!(session.set_title("ab", now), EditOutcome::Applied);
        assert!(session.undo(now));
        assert_eq!(session.draft().title, "a");
        assert!(session.can_redo());

        session.set_content("body", now);
        assert!(!session.can_redo());
        assert!(!session.redo(now));
        assert_eq!(session.draft(), &Draft::new("a", "body"));
    }

    #[test]
    fn identical_edit_is_not_recorded() {
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::new_note(&editor, &auto_save);
        let now = Instant::now();
        session.set_title("same", now);
        assert_eq!(session.set_title("same", now), EditOutcome::Unchanged);
        assert_eq!(session.history().undo_len(), 1);
    }

    #[test]
    fn over_limit_content_is_rejected_untouched() {
        let editor = EditorConfig {
            max_length: Some(5),
            ..EditorConfig::default()
        };
        let mut session = EditorSession::new_note(&editor, &AutoSaveConfig::default());
        let now = Instant::now();

        assert_eq!(session.set_content("hello", now), EditOutcome::Applied);
        let outcome = session.set_content("hello!", now);
        assert_matches!(
            outcome,
            EditOutcome::Rejected(EditRejection::LimitExceeded {
                field: Field::Content,
                limit: 5
            })
        );
        assert_eq!(session.draft().content, "hello");
        assert_eq!(session.history().undo_len(), 1);
    }

    #[test]
    fn overlong_title_can_still_be_shortened() {
        let long = "x".repeat(250);
        let note = Note {
            id: 1,
            title: long.clone(),
            content: String::new(),
        };
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::for_note(&note, &editor, &auto_save);
        let now = Instant::now();

        assert_eq!(session.set_title(&long[..249], now), EditOutcome::Applied);
        assert_matches!(
            session.set_title(format!("{}y", &long[..249]) + "z", now),
            EditOutcome::Rejected(EditRejection::LimitExceeded {
                field: Field::Title,
                limit: 200
            })
        );
        assert_eq!(session.draft().title.len(), 249);
    }

    #[test]
    fn rapid_edits_produce_one_save_with_final_state() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let note = api.inner().create(&NewNote::new("title", "v0"))?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::for_note(&note, &editor, &auto_save);
        let start = Instant::now();

        for step in 1..=10u64 {
            let now = start + ms(step * 100);
            session.set_content(format!("v{step}"), now);
            assert!(session.poll_autosave(&api, now).is_none());
        }
        assert!(session.poll_autosave(&api, start + ms(2500)).is_none());
        assert!(session.poll_autosave(&api, start + ms(3000)).is_some());
        assert!(session.poll_autosave(&api, start + ms(9000)).is_none());

        assert_eq!(api.writes(), vec!["update"]);
        assert_eq!(api.inner().get(note.id)?.content, "v10");
        assert!(!session.is_dirty());
        Ok(())
    }

    #[test]
    fn undo_back_to_saved_state_skips_the_save() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let note = api.inner().create(&NewNote::new("title", "body"))?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::for_note(&note, &editor, &auto_save);
        let start = Instant::now();

        session.set_content("changed", start);
        session.undo(start + ms(100));
        assert!(session.poll_autosave(&api, start + ms(5000)).is_none());
        assert!(api.writes().is_empty());
        Ok(())
    }

    #[test]
    fn edits_during_in_flight_save_go_out_next_cycle() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let note = api.inner().create(&NewNote::new("title", "a"))?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::for_note(&note, &editor, &auto_save);
        let start = Instant::now();

        session.set_content("b", start);
        let first = session.poll_due(start + ms(2000)).expect("due");
        session.set_content("c", start + ms(2100));
        assert!(session.poll_due(start + ms(4200)).is_none());

        let result = first.dispatch(&api);
        session.finish_save(first, result);
        assert!(session.is_dirty());

        let second = session.poll_due(start + ms(4200)).expect("due again");
        assert_eq!(second.draft.content, "c");
        Ok(())
    }

    #[test]
    fn autosave_failure_is_swallowed_and_reported() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let note = api.inner().create(&NewNote::new("title", "a"))?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::for_note(&note, &editor, &auto_save);
        let start = Instant::now();
        api.set_failing(true);

        session.set_content("b", start);
        let result = session.poll_autosave(&api, start + ms(2000));
        assert_matches!(result, Some(Err(NoteError::Transport(_))));
        assert_matches!(session.autosave_status(), AutoSaveStatus::Error { .. });
        assert_eq!(session.draft().content, "b");
        assert_eq!(session.set_content("bc", start + ms(2100)), EditOutcome::Applied);
        Ok(())
    }

    #[test]
    fn new_draft_is_not_autosaved_by_default() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::new_note(&editor, &auto_save);
        let start = Instant::now();

        session.set_title("Groceries", start);
        assert!(session.poll_autosave(&api, start + ms(10_000)).is_none());
        assert_eq!(session.close(&api), CloseOutcome::Discarded);
        assert!(api.writes().is_empty());
        Ok(())
    }

    #[test]
    fn autosave_on_new_creates_once_then_updates() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let (editor, auto_save) = configs(true);
        let mut session = EditorSession::new_note(&editor, &auto_save);
        let start = Instant::now();

        session.set_content("no title yet", start);
        assert!(session.poll_autosave(&api, start + ms(2000)).is_none());

        session.set_title("Groceries", start + ms(2100));
        let created = session
            .poll_autosave(&api, start + ms(4100))
            .expect("save fired")?;
        assert_eq!(session.target(), SaveTarget::Existing(created.id));

        session.set_content("milk", start + ms(4200));
        session.poll_autosave(&api, start + ms(6200));
        assert_eq!(api.writes(), vec!["create", "update"]);
        assert_eq!(api.inner().list()?.len(), 1);
        Ok(())
    }

    #[test]
    fn manual_save_requires_title() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::new_note(&editor, &auto_save);
        session.set_content("body only", Instant::now());

        assert_eq!(session.save_now(&api), Err(SaveError::TitleRequired));
        assert!(api.writes().is_empty());
        Ok(())
    }

    #[test]
    fn manual_save_failure_keeps_draft() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::new_note(&editor, &auto_save);
        let now = Instant::now();
        session.set_title("Trip", now);
        session.set_content("pack bags", now);

        api.set_failing(true);
        assert_matches!(session.save_now(&api), Err(SaveError::Api(_)));
        assert_eq!(session.draft(), &Draft::new("Trip", "pack bags"));
        assert_eq!(session.target(), SaveTarget::New);

        api.set_failing(false);
        let saved = session.save_now(&api)?;
        assert_eq!(saved.title, "Trip");
        assert_eq!(session.target(), SaveTarget::Existing(saved.id));
        Ok(())
    }

    #[test]
    fn close_flushes_pending_changes_to_existing_note() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let note = api.inner().create(&NewNote::new("title", "a"))?;
        let (editor, auto_save) = configs(false);
        let mut session = EditorSession::for_note(&note, &editor, &auto_save);
        session.set_content("typed just before leaving", Instant::now());

        let outcome = session.close(&api);
        assert_matches!(outcome, CloseOutcome::Flushed(saved) if saved.content == "typed just before leaving");
        assert_eq!(api.writes(), vec!["update"]);
        Ok(())
    }

    #[test]
    fn close_without_changes_is_clean() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let note = api.inner().create(&NewNote::new("title", "a"))?;
        let (editor, auto_save) = configs(false);
        let session = EditorSession::for_note(&note, &editor, &auto_save);
        assert_eq!(session.close(&api), CloseOutcome::Clean);
        assert!(api.writes().is_empty());
        Ok(())
    }

    #[test]
    fn close_with_autosave_off_discards_changes() -> anyhow::Result<()> {
        let (_temp, api) = recording()?;
        let note = api.inner().create(&NewNote::new("title", "a"))?;
        let auto_save = AutoSaveConfig {
            enabled: false,
            ..AutoSaveConfig::default()
        };
        let mut session = EditorSession::for_note(&note, &EditorConfig::default(), &auto_save);
        session.set_content("never saved", Instant::now());

        assert_eq!(session.close(&api), CloseOutcome::Discarded);
        assert!(api.writes().is_empty());
        assert_eq!(api.inner().get(note.id)?.content, "a");
        Ok(())
    }

    #[test]
    fn counters_follow_content() {
        let draft = Draft::new("t", "two  words\nhere ");
        assert_eq!(draft.word_count(), 3);
        assert_eq!(Draft::new("t", "héllo").char_count(), 5);
    }

    proptest! {
        #[test]
        fn n_edits_then_n_undos_restore_initial(
            edits in proptest::collection::vec(("[a-z]{0,6}", "[a-z ]{0,12}"), 1..=50)
        ) {
            let (editor, auto_save) = configs(false);
            let initial = Note { id: 1, title: "start".into(), content: "body".into() };
            let mut session = EditorSession::for_note(&initial, &editor, &auto_save);
            let now = Instant::now();
            let mut applied = 0;
            for (title, content) in edits {
                let change = DraftChange { title: Some(title), content: Some(content) };
                if session.edit(change, now) == EditOutcome::Applied {
                    applied += 1;
                }
            }
            for _ in 0..applied {
                prop_assert!(session.undo(now));
            }
            prop_assert_eq!(session.draft(), &Draft::from_note(&initial));
        }

        #[test]
        fn undo_depth_is_capped(count in 51usize..120) {
            let (editor, auto_save) = configs(false);
            let mut session = EditorSession::new_note(&editor, &auto_save);
            let now = Instant::now();
            for step in 0..count {
                session.set_content(step.to_string(), now);
            }
            prop_assert_eq!(session.history().undo_len(), 50);
        }
    }
}
