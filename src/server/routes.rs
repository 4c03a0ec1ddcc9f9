use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::model::{NewNote, Note, NotePatch};
use crate::service::{LocalNotes, NoteResult, NotesApi};

use super::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct NotesState {
    service: LocalNotes,
}

impl NotesState {
    pub fn new(service: LocalNotes) -> Self {
        Self { service }
    }
}

/// GET /notes
pub async fn list_notes(State(state): State<NotesState>) -> ApiResult<Json<Vec<Note>>> {
    let notes = run_blocking(&state, |service| service.list()).await?;
    Ok(Json(notes))
}

/// GET /notes/:id
pub async fn get_note(
    State(state): State<NotesState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Note>> {
    let id = parse_id(&raw_id)?;
    let note = run_blocking(&state, move |service| service.get(id)).await?;
    Ok(Json(note))
}

/// POST /notes
pub async fn create_note(
    State(state): State<NotesState>,
    payload: Result<Json<NewNote>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new_note) = payload.map_err(reject_body)?;
    let note = run_blocking(&state, move |service| service.create(&new_note)).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// PUT /notes/:id
pub async fn update_note(
    State(state): State<NotesState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<NotePatch>, JsonRejection>,
) -> ApiResult<Json<Note>> {
    let id = parse_id(&raw_id)?;
    let Json(patch) = payload.map_err(reject_body)?;
    let note = run_blocking(&state, move |service| service.update(id, &patch)).await?;
    Ok(Json(note))
}

/// DELETE /notes/:id
pub async fn delete_note(
    State(state): State<NotesState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id)?;
    run_blocking(&state, move |service| service.delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// An id that is not an integer cannot name any note.
fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse().map_err(|_| ApiError::note_not_found())
}

fn reject_body(rejection: JsonRejection) -> ApiError {
    tracing::debug!(%rejection, "rejected request body");
    ApiError::invalid_input(rejection.body_text())
}

async fn run_blocking<T, F>(state: &NotesState, op: F) -> ApiResult<T>
where
    F: FnOnce(&LocalNotes) -> NoteResult<T> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|err| {
            tracing::error!(?err, "note store task aborted");
            ApiError::internal("Internal server error")
        })?
        .map_err(ApiError::from)
}
