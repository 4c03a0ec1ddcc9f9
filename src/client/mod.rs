use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::model::{NewNote, Note, NotePatch};
use crate::server::ApiError;
use crate::service::{NoteError, NoteResult, NotesApi};

/// [`NotesApi`] over the backend's REST endpoints.
///
/// Uses the blocking reqwest client; callers on the terminal client run it
/// from a worker thread so the UI never waits on the network.
#[derive(Clone)]
pub struct HttpNotes {
    client: Client,
    base_url: String,
}

impl HttpNotes {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn note_url(&self, id: i64) -> String {
        self.url(&format!("/notes/{id}"))
    }
}

impl NotesApi for HttpNotes {
    fn list(&self) -> NoteResult<Vec<Note>> {
        let response = send(self.client.get(self.url("/notes")))?;
        decode(check(response, None)?)
    }

    fn get(&self, id: i64) -> NoteResult<Note> {
        let response = send(self.client.get(self.note_url(id)))?;
        decode(check(response, Some(id))?)
    }

    fn create(&self, note: &NewNote) -> NoteResult<Note> {
        let response = send(self.client.post(self.url("/notes")).json(note))?;
        decode(check(response, None)?)
    }

    fn update(&self, id: i64, patch: &NotePatch) -> NoteResult<Note> {
        let response = send(self.client.put(self.note_url(id)).json(patch))?;
        decode(check(response, Some(id))?)
    }

    fn delete(&self, id: i64) -> NoteResult<()> {
        let response = send(self.client.delete(self.note_url(id)))?;
        check(response, Some(id))?;
        Ok(())
    }
}

fn send(request: RequestBuilder) -> NoteResult<Response> {
    request.send().map_err(|err| {
        tracing::warn!(%err, "request to notes backend failed");
        NoteError::Transport(err.to_string())
    })
}

/// Maps non-success statuses onto [`NoteError`]. `id` is the note the request
/// addressed, if any; a 404 without one is a routing problem, not a missing note.
fn check(response: Response, id: Option<i64>) -> NoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ApiError>()
        .map(|body| body.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
    match (status, id) {
        (StatusCode::BAD_REQUEST, _) => Err(NoteError::InvalidInput(message)),
        (StatusCode::NOT_FOUND, Some(id)) => Err(NoteError::NotFound(id)),
        _ => Err(NoteError::Transport(format!("HTTP {}: {message}", status.as_u16()))),
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> NoteResult<T> {
    response
        .json::<T>()
        .map_err(|err| NoteError::Transport(format!("unexpected response: {err}")))
}
