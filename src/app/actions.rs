use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::editor::PendingSave;
use crate::model::Note;
use crate::service::{NoteResult, NotesApi};

use super::state::LoadKind;

#[derive(Debug)]
pub enum Request {
    ListNotes(LoadKind),
    GetNote(i64),
    DeleteNote(i64),
    AutoSave { session_id: u64, pending: PendingSave },
}

#[derive(Debug)]
pub enum Response {
    Notes {
        kind: LoadKind,
        result: NoteResult<Vec<Note>>,
    },
    Note {
        id: i64,
        result: NoteResult<Note>,
    },
    Deleted {
        id: i64,
        result: NoteResult<()>,
    },
    AutoSaved {
        session_id: u64,
        pending: PendingSave,
        result: NoteResult<Note>,
    },
}

/// Runs backend calls off the UI thread, one at a time and in submission
/// order, so the terminal keeps redrawing while a request is outstanding.
pub struct Worker {
    requests: Option<Sender<Request>>,
    responses: Receiver<Response>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(api: Arc<dyn NotesApi>) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<Request>();
        let (response_tx, response_rx) = unbounded::<Response>();
        let handle = thread::Builder::new()
            .name("pocketnotes-worker".into())
            .spawn(move || {
                for request in request_rx {
                    let response = execute(api.as_ref(), request);
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
                tracing::debug!("worker exiting");
            })
            .context("spawning request worker")?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, request: Request) {
        let Some(requests) = &self.requests else {
            return;
        };
        if let Err(err) = requests.send(request) {
            tracing::error!(request = ?err.0, "worker is gone; request dropped");
        }
    }

    pub fn try_recv(&self) -> Option<Response> {
        self.responses.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Response> {
        match self.responses.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("worker disconnected");
                None
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

fn execute(api: &dyn NotesApi, request: Request) -> Response {
    match request {
        Request::ListNotes(kind) => Response::Notes {
            kind,
            result: api.list(),
        },
        Request::GetNote(id) => Response::Note {
            id,
            result: api.get(id),
        },
        Request::DeleteNote(id) => Response::Deleted {
            id,
            result: api.delete(id),
        },
        Request::AutoSave {
            session_id,
            pending,
        } => {
            let result = pending.dispatch(api);
            Response::AutoSaved {
                session_id,
                pending,
                result,
            }
        }
    }
}
