use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::context::AppContext;
use crate::editor::{CloseOutcome, EditOutcome, EditorSession, SaveError, SaveTarget};
use crate::service::NotesApi;
use crate::ui;

mod actions;
pub mod input;
pub mod state;

use actions::{Request, Response, Worker};
pub use state::{
    DeleteSettled, DetailState, EditorField, EditorScreen, LoadKind, LoadState, NoteDetailView,
    NotesListView, Overlay,
};

pub enum Screen {
    List,
    Detail(NoteDetailView),
    Editor(EditorScreen),
}

pub struct App {
    ctx: AppContext,
    api: Arc<dyn NotesApi>,
    worker: Worker,
    list: NotesListView,
    list_state: ListState,
    screen: Screen,
    overlay: Option<Overlay>,
    status: Option<String>,
    should_quit: bool,
    tick_rate: Duration,
    next_session_id: u64,
}

impl App {
    pub fn new(ctx: AppContext, api: Arc<dyn NotesApi>) -> Result<Self> {
        let worker = Worker::spawn(Arc::clone(&api))?;
        let mut app = Self {
            ctx,
            api,
            worker,
            list: NotesListView::new(),
            list_state: ListState::default(),
            screen: Screen::List,
            overlay: None,
            status: None,
            should_quit: false,
            tick_rate: Duration::from_millis(100),
            next_session_id: 0,
        };
        app.focus_list(LoadKind::Initial);
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let palette = self.ctx.palette();
        let show_word_count = self.ctx.config.editor.show_word_count;
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    self.list_state.select(self.list.selected_index());
                    let view = ui::View {
                        palette,
                        screen: match &self.screen {
                            Screen::List => ui::ScreenView::List(&self.list),
                            Screen::Detail(detail) => ui::ScreenView::Detail(detail),
                            Screen::Editor(editor) => ui::ScreenView::Editor(editor),
                        },
                        overlay: self.overlay.as_ref(),
                        status: self.status.as_deref(),
                        show_word_count,
                    };
                    ui::draw(frame, &view, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        while let Some(response) = self.worker.try_recv() {
            self.handle_response(response);
        }
        if let Screen::Editor(editor) = &mut self.screen {
            if let Some(pending) = editor.session.poll_due(Instant::now()) {
                self.worker.submit(Request::AutoSave {
                    session_id: editor.session_id,
                    pending,
                });
            }
        }
    }

    fn handle_response(&mut self, response: Response) {
        match response {
            Response::Notes { kind, result } => self.list.finish_load(kind, result),
            Response::Note { id, result } => {
                if let Screen::Detail(detail) = &mut self.screen {
                    if detail.note_id() == id {
                        detail.finish_load(result);
                    }
                }
            }
            Response::Deleted { id, result } => match self.list.settle_delete(id, result) {
                DeleteSettled::Removed => self.set_status("Note deleted"),
                DeleteSettled::NeedsRefetch(message) => {
                    self.overlay = Some(Overlay::Alert {
                        title: "Delete Failed".into(),
                        message,
                    });
                    self.request_list(LoadKind::Initial);
                }
            },
            Response::AutoSaved {
                session_id,
                pending,
                result,
            } => match &mut self.screen {
                Screen::Editor(editor) if editor.session_id == session_id => {
                    editor.session.finish_save(pending, result);
                }
                _ => {
                    if let Err(err) = result {
                        tracing::warn!(%err, session_id, "auto-save for closed editor failed");
                    }
                }
            },
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.overlay.is_some() {
            self.handle_overlay_key(key);
            return;
        }
        if matches!(self.screen, Screen::Editor(_)) {
            self.handle_editor_key(key);
            return;
        }
        if matches!(self.screen, Screen::Detail(_)) {
            self.handle_detail_key(key);
            return;
        }
        self.handle_list_key(key);
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.list.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.list.select_previous(),
            KeyCode::Char('r') => {
                if matches!(self.list.load_state(), LoadState::Failed(_)) {
                    self.focus_list(LoadKind::Initial);
                } else {
                    self.focus_list(LoadKind::Refresh);
                }
            }
            KeyCode::Char('a') => self.open_new_note(),
            KeyCode::Char('?') => self.overlay = Some(Overlay::Help),
            KeyCode::Enter => {
                if let Some(note) = self.list.selected() {
                    let id = note.id;
                    self.open_detail(id);
                }
            }
            KeyCode::Char('d') => {
                let Some(note) = self.list.selected() else {
                    return;
                };
                if self.list.is_delete_pending(note.id) {
                    self.set_status("Already deleting this note");
                    return;
                }
                self.overlay = Some(Overlay::ConfirmDelete {
                    note_id: note.id,
                    title: note.title.clone(),
                });
            }
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        let Screen::Detail(detail) = &self.screen else {
            return;
        };
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.focus_list(LoadKind::Initial),
            KeyCode::Char('r') => {
                let id = detail.note_id();
                self.open_detail(id);
            }
            KeyCode::Char('e') => {
                let Some(note) = detail.note() else {
                    self.set_status("Note is not loaded yet");
                    return;
                };
                let session = EditorSession::for_note(
                    note,
                    &self.ctx.config.editor,
                    &self.ctx.config.auto_save,
                );
                self.open_editor(session);
            }
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => self.manual_save(),
                KeyCode::Char('z') => {
                    if let Screen::Editor(editor) = &mut self.screen {
                        let undone = editor.session.undo(now);
                        editor.clamp_cursors();
                        self.set_status(if undone { "Undid change" } else { "Nothing to undo" });
                    }
                }
                KeyCode::Char('y') => {
                    if let Screen::Editor(editor) = &mut self.screen {
                        let redone = editor.session.redo(now);
                        editor.clamp_cursors();
                        self.set_status(if redone { "Redid change" } else { "Nothing to redo" });
                    }
                }
                _ => {}
            }
            return;
        }

        if key.code == KeyCode::Esc {
            self.leave_editor();
            return;
        }

        let Screen::Editor(editor) = &mut self.screen else {
            return;
        };
        let text = editor.focused_text().to_string();
        let cursor = editor.focused_cursor();
        let pending = match key.code {
            KeyCode::Tab | KeyCode::BackTab => {
                editor.toggle_focus();
                return;
            }
            KeyCode::Left => {
                editor.focused_cursor_mut().move_left(&text);
                return;
            }
            KeyCode::Right => {
                editor.focused_cursor_mut().move_right(&text);
                return;
            }
            KeyCode::Home => {
                editor.focused_cursor_mut().move_home(&text);
                return;
            }
            KeyCode::End => {
                editor.focused_cursor_mut().move_end(&text);
                return;
            }
            KeyCode::Enter if editor.focus == EditorField::Title => {
                editor.toggle_focus();
                return;
            }
            KeyCode::Enter => Some(cursor.insert(&text, '\n')),
            KeyCode::Backspace => cursor.backspace(&text),
            KeyCode::Delete => cursor.delete(&text),
            KeyCode::Char(ch) if !key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER) => {
                Some(cursor.insert(&text, ch))
            }
            _ => None,
        };
        let Some(pending) = pending else {
            return;
        };

        let outcome = match editor.focus {
            EditorField::Title => editor.session.set_title(pending.text, now),
            EditorField::Content => editor.session.set_content(pending.text, now),
        };
        match outcome {
            EditOutcome::Applied | EditOutcome::Unchanged => {
                *editor.focused_cursor_mut() = pending.cursor;
            }
            EditOutcome::Rejected(rejection) => {
                self.overlay = Some(Overlay::Alert {
                    title: "Limit Reached".into(),
                    message: rejection.to_string(),
                });
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        let Some(overlay) = self.overlay.take() else {
            return;
        };
        match overlay {
            Overlay::ConfirmDelete { note_id, title } => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    if self.list.begin_delete(note_id) {
                        self.worker.submit(Request::DeleteNote(note_id));
                        self.set_status(format!("Deleting \"{title}\"..."));
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => {}
                _ => self.overlay = Some(Overlay::ConfirmDelete { note_id, title }),
            },
            Overlay::Alert { .. } | Overlay::Help => {}
        }
    }

    fn open_new_note(&mut self) {
        let session =
            EditorSession::new_note(&self.ctx.config.editor, &self.ctx.config.auto_save);
        self.open_editor(session);
    }

    fn open_editor(&mut self, session: EditorSession) {
        self.next_session_id += 1;
        self.screen = Screen::Editor(EditorScreen::new(session, self.next_session_id));
        self.status = None;
    }

    fn open_detail(&mut self, id: i64) {
        let mut detail = NoteDetailView::new(id);
        detail.begin_load();
        self.screen = Screen::Detail(detail);
        self.worker.submit(Request::GetNote(id));
    }

    fn focus_list(&mut self, kind: LoadKind) {
        self.screen = Screen::List;
        self.request_list(kind);
    }

    fn request_list(&mut self, kind: LoadKind) {
        self.list.begin_load(kind);
        self.worker.submit(Request::ListNotes(kind));
    }

    /// Blocks until the editor's in-flight auto-save has come back, so a
    /// following synchronous save cannot be overtaken by an older one.
    fn await_autosave(&mut self) {
        let deadline = Instant::now() + self.ctx.config.client.request_timeout();
        loop {
            let saving = matches!(&self.screen, Screen::Editor(editor) if editor.session.is_saving());
            if !saving {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!("gave up waiting for in-flight auto-save");
                return;
            }
            if let Some(response) = self.worker.recv_timeout(remaining) {
                self.handle_response(response);
            }
        }
    }

    fn manual_save(&mut self) {
        self.await_autosave();
        let Screen::Editor(editor) = &mut self.screen else {
            return;
        };
        let was_new = editor.session.target() == SaveTarget::New;
        match editor.session.save_now(self.api.as_ref()) {
            Ok(note) => {
                self.set_status(format!("Saved \"{}\"", note.title));
                if was_new {
                    self.focus_list(LoadKind::Initial);
                } else {
                    self.open_detail(note.id);
                }
            }
            Err(SaveError::TitleRequired) => {
                self.overlay = Some(Overlay::Alert {
                    title: "Title Required".into(),
                    message: SaveError::TitleRequired.to_string(),
                });
            }
            Err(err) => {
                self.overlay = Some(Overlay::Alert {
                    title: "Save Error".into(),
                    message: err.to_string(),
                });
            }
        }
    }

    fn leave_editor(&mut self) {
        self.await_autosave();
        let screen = std::mem::replace(&mut self.screen, Screen::List);
        let Screen::Editor(editor) = screen else {
            self.screen = screen;
            return;
        };
        let target = editor.session.target();
        match editor.session.close(self.api.as_ref()) {
            CloseOutcome::Clean => {}
            CloseOutcome::Flushed(_) => self.set_status("Changes saved"),
            CloseOutcome::FlushFailed(_) => self.set_status("Could not save latest changes"),
            CloseOutcome::Discarded => self.set_status("Draft discarded"),
        }
        match target {
            SaveTarget::Existing(id) => self.open_detail(id),
            SaveTarget::New => self.focus_list(LoadKind::Initial),
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal backend")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
