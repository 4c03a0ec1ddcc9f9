use std::net::SocketAddr;
use std::thread;

use anyhow::{Context, Result};
use assert_matches::assert_matches;
use tempfile::TempDir;

use pocketnotes::client::HttpNotes;
use pocketnotes::config::{ClientConfig, ConfigPaths, StorageOptions};
use pocketnotes::{storage, LocalNotes, NewNote, NoteError, NotePatch, NotesApi};

struct TestServer {
    _temp: TempDir,
    client: HttpNotes,
}

fn paths_in(temp: &TempDir) -> ConfigPaths {
    let base = temp.path();
    ConfigPaths {
        config_dir: base.join("config"),
        config_file: base.join("config").join("config.toml"),
        data_dir: base.join("data"),
        database_path: base.join("data").join("notes.db"),
        log_dir: base.join("state").join("logs"),
        state_dir: base.join("state"),
    }
}

/// Starts the backend on an ephemeral port in a background runtime. The
/// server lives until the test process exits.
fn start_server() -> Result<TestServer> {
    let temp = TempDir::new()?;
    let paths = paths_in(&temp);
    paths.ensure_directories()?;
    let storage = storage::init(&paths, &StorageOptions::default())?;

    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    listener.set_nonblocking(true)?;
    let addr: SocketAddr = listener.local_addr()?;

    thread::Builder::new()
        .name(format!("test-server-{}", addr.port()))
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
                pocketnotes::server::serve_listener(
                    listener,
                    LocalNotes::new(storage),
                    std::future::pending(),
                )
                .await
                .expect("server");
            });
        })
        .context("spawning server thread")?;

    let client = HttpNotes::new(&ClientConfig {
        base_url: format!("http://{addr}/"),
        request_timeout_ms: 5_000,
    })?;
    Ok(TestServer {
        _temp: temp,
        client,
    })
}

#[test]
fn create_then_get_returns_same_note() -> Result<()> {
    let server = start_server()?;
    let created = server.client.create(&NewNote::new("A", "B"))?;
    assert_eq!(created.title, "A");
    assert_eq!(created.content, "B");

    let fetched = server.client.get(created.id)?;
    assert_eq!(fetched, created);
    assert_eq!(server.client.list()?, vec![created]);
    Ok(())
}

#[test]
fn create_with_empty_title_is_invalid_and_not_persisted() -> Result<()> {
    let server = start_server()?;
    let err = server.client.create(&NewNote::new("", "B")).unwrap_err();
    assert_eq!(
        err,
        NoteError::InvalidInput("Title and content are required".into())
    );

    let missing_content = NewNote {
        title: Some("A".into()),
        content: None,
    };
    assert_matches!(
        server.client.create(&missing_content),
        Err(NoteError::InvalidInput(_))
    );
    assert!(server.client.list()?.is_empty());
    Ok(())
}

#[test]
fn update_of_missing_note_is_not_found() -> Result<()> {
    let server = start_server()?;
    let kept = server.client.create(&NewNote::new("kept", "as is"))?;

    let err = server
        .client
        .update(kept.id + 1, &NotePatch::full("x", "y"))
        .unwrap_err();
    assert_eq!(err, NoteError::NotFound(kept.id + 1));
    assert_eq!(server.client.list()?, vec![kept]);
    Ok(())
}

#[test]
fn partial_update_changes_only_given_field() -> Result<()> {
    let server = start_server()?;
    let note = server.client.create(&NewNote::new("title", "body"))?;
    let patch = NotePatch {
        title: Some("renamed".into()),
        content: None,
    };
    let updated = server.client.update(note.id, &patch)?;
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.content, "body");
    Ok(())
}

#[test]
fn delete_then_get_is_not_found() -> Result<()> {
    let server = start_server()?;
    let note = server.client.create(&NewNote::new("short lived", ""))?;
    server.client.delete(note.id)?;

    assert_matches!(server.client.get(note.id), Err(NoteError::NotFound(id)) if id == note.id);
    assert_matches!(server.client.delete(note.id), Err(NoteError::NotFound(_)));
    Ok(())
}

#[test]
fn ids_are_not_reused_after_delete() -> Result<()> {
    let server = start_server()?;
    let first = server.client.create(&NewNote::new("one", ""))?;
    server.client.delete(first.id)?;
    let second = server.client.create(&NewNote::new("two", ""))?;
    assert!(second.id > first.id);
    Ok(())
}
