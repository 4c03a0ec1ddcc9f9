use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::app::App;
use crate::client::HttpNotes;
use crate::context::AppContext;
use crate::model::{NewNote, Note, NotePatch};
use crate::server;
use crate::service::NotesApi;

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on (falls back to server.port in the config)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Note identifier
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note
    pub title: String,
    /// Note content inline. If omitted, reads from stdin.
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Note identifier
    pub id: i64,
    /// Replace the title
    #[arg(long)]
    pub title: Option<String>,
    /// Replace the content
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Note identifier
    pub id: i64,
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

pub fn serve(ctx: AppContext, args: ServeArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(server::serve(ctx, args.port))
}

pub fn run_tui(ctx: AppContext) -> Result<()> {
    let api: Arc<dyn NotesApi> = Arc::new(HttpNotes::new(&ctx.config.client)?);
    let mut app = App::new(ctx, api)?;
    app.run()
}

pub fn http_client(ctx: &AppContext) -> Result<HttpNotes> {
    HttpNotes::new(&ctx.config.client)
}

pub fn list_notes(api: &dyn NotesApi, out: &mut impl Write) -> Result<()> {
    let notes = api.list().context("listing notes")?;
    out.write_all(format_note_list(&notes).as_bytes())?;
    Ok(())
}

pub fn show_note(api: &dyn NotesApi, args: ShowArgs, out: &mut impl Write) -> Result<()> {
    let note = api
        .get(args.id)
        .with_context(|| format!("fetching note {}", args.id))?;
    out.write_all(format_note(&note).as_bytes())?;
    Ok(())
}

pub fn new_note(
    api: &dyn NotesApi,
    args: NewArgs,
    stdin: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    let title = args.title.trim().to_owned();
    if title.is_empty() {
        bail!("note title cannot be empty");
    }
    let content = args.content.or(stdin).unwrap_or_default();
    let note = api
        .create(&NewNote::new(title, content))
        .context("creating note")?;
    writeln!(out, "Created note #{}", note.id)?;
    Ok(())
}

pub fn update_note(api: &dyn NotesApi, args: UpdateArgs, out: &mut impl Write) -> Result<()> {
    let patch = NotePatch {
        title: args.title,
        content: args.content,
    };
    if patch.is_empty() {
        bail!("nothing to update: pass --title and/or --content");
    }
    let note = api
        .update(args.id, &patch)
        .with_context(|| format!("updating note {}", args.id))?;
    writeln!(out, "Updated note #{}", note.id)?;
    Ok(())
}

pub fn delete_note<F>(
    api: &dyn NotesApi,
    args: DeleteArgs,
    confirm: F,
    out: &mut impl Write,
) -> Result<()>
where
    F: FnOnce(&Note) -> Result<bool>,
{
    if !args.yes {
        let note = api
            .get(args.id)
            .with_context(|| format!("fetching note {}", args.id))?;
        if !confirm(&note)? {
            writeln!(out, "Cancelled")?;
            return Ok(());
        }
    }
    api.delete(args.id)
        .with_context(|| format!("deleting note {}", args.id))?;
    writeln!(out, "Deleted note #{}", args.id)?;
    Ok(())
}

pub fn confirm_on_terminal(note: &Note) -> Result<bool> {
    let answer = prompt(&format!(
        "Delete \"{}\"? This action cannot be undone. [y/N]",
        note.title
    ))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn format_note_list(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No notes yet.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let _ = writeln!(&mut out, "#{:<4} {}", note.id, note.title);
        if let Some(first) = note.content.lines().find(|line| !line.trim().is_empty()) {
            let _ = writeln!(&mut out, "      {}", first.trim());
        }
    }
    out
}

fn format_note(note: &Note) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "#{} {}", note.id, note.title);
    out.push('\n');
    out.push_str(&note.content);
    if !note.content.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{label} ")?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

pub fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading note content from stdin")?;
    Ok(Some(buf))
}
