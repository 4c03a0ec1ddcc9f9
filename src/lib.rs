pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod editor;
pub mod model;
pub mod server;
pub mod service;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use context::AppContext;
pub use model::{NewNote, Note, NotePatch};
pub use service::{LocalNotes, NoteError, NotesApi};
