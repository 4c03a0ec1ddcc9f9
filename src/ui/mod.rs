use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::{
    DetailState, EditorField, EditorScreen, LoadState, NoteDetailView, NotesListView, Overlay,
};
use crate::config::themes::Palette;
use crate::editor::AutoSaveStatus;

const PREVIEW_WIDTH: usize = 60;

pub struct View<'a> {
    pub palette: Palette,
    pub screen: ScreenView<'a>,
    pub overlay: Option<&'a Overlay>,
    pub status: Option<&'a str>,
    pub show_word_count: bool,
}

pub enum ScreenView<'a> {
    List(&'a NotesListView),
    Detail(&'a NoteDetailView),
    Editor(&'a EditorScreen),
}

pub fn draw(frame: &mut Frame, view: &View<'_>, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.size());

    let hints = match &view.screen {
        ScreenView::List(list) => {
            draw_list(frame, vertical[0], list, list_state, &view.palette);
            "j/k move • Enter open • a add • d delete • r refresh • ? help • q quit"
        }
        ScreenView::Detail(detail) => {
            draw_detail(frame, vertical[0], detail, &view.palette);
            "e edit • r reload • Esc back"
        }
        ScreenView::Editor(editor) => {
            draw_editor(frame, vertical[0], editor, &view.palette);
            "Tab switch field • Ctrl-z undo • Ctrl-y redo • Ctrl-s save • Esc back"
        }
    };

    let mut lines = vec![Line::from(Span::styled(hints, Style::default().fg(view.palette.muted)))];
    let mut second = Vec::new();
    if let ScreenView::Editor(editor) = &view.screen {
        second.extend(editor_status_spans(editor, view.show_word_count, &view.palette));
    }
    if let Some(status) = view.status {
        if !second.is_empty() {
            second.push(Span::raw(" | "));
        }
        second.push(Span::styled(status.to_string(), Style::default().fg(view.palette.text)));
    }
    lines.push(Line::from(second));
    let footer = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, vertical[1]);

    if let Some(overlay) = view.overlay {
        render_overlay(frame, overlay, &view.palette);
    }
}

fn draw_list(
    frame: &mut Frame,
    area: Rect,
    list: &NotesListView,
    list_state: &mut ListState,
    palette: &Palette,
) {
    let title = if list.is_refreshing() {
        "Notes (refreshing...)".to_string()
    } else {
        format!("Notes ({})", list.len())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    match list.load_state() {
        LoadState::Loading => {
            let paragraph = Paragraph::new("Loading notes...")
                .style(Style::default().fg(palette.muted))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }
        LoadState::Failed(message) => {
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(message.clone(), Style::default().fg(palette.error))),
                Line::from(""),
                Line::from(Span::styled("Press r to retry", Style::default().fg(palette.muted))),
            ])
            .block(block)
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
            return;
        }
        LoadState::Ready => {}
    }

    if list.is_empty() {
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(
                "No Notes Yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Press a to create your first note",
                Style::default().fg(palette.muted),
            )),
        ])
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = list
        .notes()
        .map(|note| {
            let mut title = vec![Span::styled(
                note.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if list.is_delete_pending(note.id) {
                title.push(Span::styled(
                    "  deleting...",
                    Style::default()
                        .fg(palette.warning)
                        .add_modifier(Modifier::ITALIC),
                ));
            }
            let preview = preview_line(&note.content, PREVIEW_WIDTH);
            ListItem::new(vec![
                Line::from(title),
                Line::from(Span::styled(preview, Style::default().fg(palette.muted))),
            ])
        })
        .collect();

    let widget = List::new(items).block(block).highlight_style(
        Style::default()
            .fg(palette.selection_fg)
            .bg(palette.selection_bg),
    );
    frame.render_stateful_widget(widget, area, list_state);
}

fn draw_detail(frame: &mut Frame, area: Rect, detail: &NoteDetailView, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));
    let paragraph = match detail.state() {
        DetailState::Loading => Paragraph::new("Loading note...")
            .style(Style::default().fg(palette.muted))
            .block(block.title("Note")),
        DetailState::Failed(message) => Paragraph::new(vec![
            Line::from(Span::styled(message.clone(), Style::default().fg(palette.error))),
            Line::from(""),
            Line::from(Span::styled("Press r to retry", Style::default().fg(palette.muted))),
        ])
        .block(block.title("Note")),
        DetailState::Loaded(note) => {
            let mut lines = Vec::new();
            for line in note.content.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(palette.text),
                )));
            }
            if lines.is_empty() {
                lines.push(Line::from(Span::styled(
                    "(empty)",
                    Style::default().fg(palette.muted),
                )));
            }
            Paragraph::new(lines).block(block.title(note.title.clone()))
        }
    };
    frame.render_widget(paragraph.wrap(Wrap { trim: false }), area);
}

fn draw_editor(frame: &mut Frame, area: Rect, editor: &EditorScreen, palette: &Palette) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);
    let draft = editor.session.draft();

    let field_style = |field: EditorField| {
        if editor.focus == field {
            Style::default().fg(palette.accent)
        } else {
            Style::default().fg(palette.muted)
        }
    };

    let title = Paragraph::new(draft.title.clone()).block(
        Block::default()
            .title("Title")
            .borders(Borders::ALL)
            .border_style(field_style(EditorField::Title)),
    );
    frame.render_widget(title, chunks[0]);

    let content_title = match editor.session.content_limit() {
        Some(limit) => format!("Content ({}/{limit})", draft.char_count()),
        None => "Content".to_string(),
    };
    let content = Paragraph::new(draft.content.clone())
        .block(
            Block::default()
                .title(content_title)
                .borders(Borders::ALL)
                .border_style(field_style(EditorField::Content)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(content, chunks[1]);

    let (area, text, cursor) = match editor.focus {
        EditorField::Title => (chunks[0], draft.title.as_str(), editor.title_cursor.position()),
        EditorField::Content => (
            chunks[1],
            draft.content.as_str(),
            editor.content_cursor.position(),
        ),
    };
    if let Some((x, y)) = cursor_screen_position(text, cursor, area) {
        frame.set_cursor(x, y);
    }
}

fn editor_status_spans(
    editor: &EditorScreen,
    show_word_count: bool,
    palette: &Palette,
) -> Vec<Span<'static>> {
    let session = &editor.session;
    let mut spans = Vec::new();
    if show_word_count {
        let draft = session.draft();
        spans.push(Span::raw(format!(
            "{} words • {} chars",
            draft.word_count(),
            draft.char_count()
        )));
        spans.push(Span::raw(" | "));
    }
    let undo_style = |enabled: bool| {
        if enabled {
            Style::default().fg(palette.text)
        } else {
            Style::default().fg(palette.muted).add_modifier(Modifier::DIM)
        }
    };
    spans.push(Span::styled("undo", undo_style(session.can_undo())));
    spans.push(Span::raw(" "));
    spans.push(Span::styled("redo", undo_style(session.can_redo())));
    spans.push(Span::raw(" | "));

    let (label, style) = match session.autosave_status() {
        AutoSaveStatus::Disabled => ("Auto-save off".to_string(), Style::default().fg(palette.muted)),
        AutoSaveStatus::Idle { last_saved_at } => (
            last_saved_at
                .map(|at| format!("Saved {}", format_time_short(at)))
                .unwrap_or_else(|| "No changes".to_string()),
            Style::default().fg(palette.muted),
        ),
        AutoSaveStatus::Pending { .. } => (
            "Unsaved changes".to_string(),
            Style::default().fg(palette.warning),
        ),
        AutoSaveStatus::Saving => ("Saving...".to_string(), Style::default().fg(palette.accent)),
        // Auto-save failures stay quiet; the next edit retries.
        AutoSaveStatus::Error { .. } => (
            "Unsaved changes".to_string(),
            Style::default().fg(palette.warning),
        ),
    };
    spans.push(Span::styled(label, style));
    spans
}

fn render_overlay(frame: &mut Frame, overlay: &Overlay, palette: &Palette) {
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    let (title, lines, border) = match overlay {
        Overlay::ConfirmDelete { title, .. } => (
            "Delete Note",
            vec![
                Line::from(format!("Delete \"{title}\"?")),
                Line::from("This action cannot be undone."),
                Line::from(""),
                Line::from(Span::styled(
                    "y to delete • n to cancel",
                    Style::default().fg(palette.muted),
                )),
            ],
            palette.error,
        ),
        Overlay::Alert { title, message } => (
            title.as_str(),
            vec![
                Line::from(message.clone()),
                Line::from(""),
                Line::from(Span::styled(
                    "Press any key to dismiss",
                    Style::default().fg(palette.muted),
                )),
            ],
            palette.warning,
        ),
        Overlay::Help => (
            "Help",
            vec![
                Line::from("List: j/k move, Enter open, a add, d delete, r refresh, q quit"),
                Line::from("Note: e edit, r reload, Esc back"),
                Line::from("Editor: Tab switch field, Ctrl-z undo, Ctrl-y redo"),
                Line::from("        Ctrl-s save, Esc save and leave"),
            ],
            palette.accent,
        ),
    };
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// First line of `content`, cut to `width` columns.
fn preview_line(content: &str, width: usize) -> String {
    let first = content.lines().next().unwrap_or("");
    let mut preview = String::new();
    let mut used = 0;
    for grapheme in first.graphemes(true) {
        let glyph = UnicodeWidthStr::width(grapheme);
        if used + glyph > width {
            preview.push('…');
            break;
        }
        used += glyph;
        preview.push_str(grapheme);
    }
    preview
}

fn cursor_screen_position(text: &str, cursor: usize, area: Rect) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 {
        return None;
    }
    let mut row: u16 = 0;
    let mut col = 0usize;
    let cursor = cursor.min(text.len());
    for grapheme in text[..cursor].graphemes(true) {
        if grapheme == "\n" {
            row += 1;
            col = 0;
            continue;
        }
        let glyph = UnicodeWidthStr::width(grapheme);
        if glyph > 0 && col + glyph > inner_width {
            row += 1;
            col = 0;
        }
        col += glyph;
    }
    let row = row.min(inner_height - 1);
    let col = col.min(inner_width - 1) as u16;
    Some((area.x + 1 + col, area.y + 1 + row))
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
