use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::context::AppContext;

pub mod commands;

use self::commands::{DeleteArgs, NewArgs, ServeArgs, ShowArgs, UpdateArgs};

const LOG_FILE: &str = "pocketnotes.log";

#[derive(Parser, Debug)]
#[command(
    name = "pocketnotes",
    version,
    about = "Personal notes: a small REST backend over SQLite and a terminal client"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over POCKETNOTES_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over POCKETNOTES_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP backend
    Serve(ServeArgs),
    /// Launch the terminal client (default)
    Tui,
    /// Print all notes
    List,
    /// Print one note
    Show(ShowArgs),
    /// Create a note
    New(NewArgs),
    /// Change a note's title and/or content
    Update(UpdateArgs),
    /// Delete a note
    Delete(DeleteArgs),
}

/// Where log lines go. The terminal client owns the screen, so it logs to a file.
#[derive(Debug, Clone)]
pub enum LogSink {
    Stderr,
    File(PathBuf),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();

    let command = cli.command.unwrap_or(Commands::Tui);
    let sink = match command {
        Commands::Tui => LogSink::File(paths.log_dir.join(LOG_FILE)),
        _ => LogSink::Stderr,
    };
    init_tracing(&cli.log_level, sink)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = loader.load_or_init()?;
    let ctx = AppContext::new(config, paths);
    let mut stdout = io::stdout().lock();

    match command {
        Commands::Serve(args) => commands::serve(ctx, args),
        Commands::Tui => commands::run_tui(ctx),
        Commands::List => commands::list_notes(&commands::http_client(&ctx)?, &mut stdout),
        Commands::Show(args) => {
            commands::show_note(&commands::http_client(&ctx)?, args, &mut stdout)
        }
        Commands::New(args) => {
            let stdin = if args.content.is_none() {
                commands::read_stdin()?
            } else {
                None
            };
            commands::new_note(&commands::http_client(&ctx)?, args, stdin, &mut stdout)
        }
        Commands::Update(args) => {
            commands::update_note(&commands::http_client(&ctx)?, args, &mut stdout)
        }
        Commands::Delete(args) => commands::delete_note(
            &commands::http_client(&ctx)?,
            args,
            commands::confirm_on_terminal,
            &mut stdout,
        ),
    }
}

pub fn init_tracing(level: &str, sink: LogSink) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match sink {
            LogSink::Stderr => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(io::stderr)
                    .with_ansi(atty::is(atty::Stream::Stderr))
                    .init();
            }
            LogSink::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
