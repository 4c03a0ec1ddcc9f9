use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::Request,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::context::AppContext;
use crate::service::LocalNotes;
use crate::storage;

pub mod error;
pub mod routes;

pub use error::{ApiError, ApiResult, ErrorCode};

/// Builds the `/notes` router over the given service.
pub fn router(service: LocalNotes) -> Router {
    Router::new()
        .route("/notes", get(routes::list_notes).post(routes::create_note))
        .route(
            "/notes/:id",
            get(routes::get_note)
                .put(routes::update_note)
                .delete(routes::delete_note),
        )
        .with_state(routes::NotesState::new(service))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}

/// Opens the store and serves until ctrl-c.
pub async fn serve(ctx: AppContext, port: Option<u16>) -> Result<()> {
    let storage = storage::init(&ctx.paths, &ctx.config.storage)?;
    let port = port.unwrap_or(ctx.config.server.port);
    let addr = format!("{}:{}", ctx.config.server.bind_address, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    serve_listener(listener, LocalNotes::new(storage), shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(listener: TcpListener, service: LocalNotes, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local: SocketAddr = listener.local_addr().context("reading bound address")?;
    tracing::info!(%local, "server is running on http://{local}");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving http")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
