//! Route handlers.
//!
//! Every handler owns a [`CancellationToken`] tied to its lifetime through a
//! drop guard, so a client that disconnects cancels the work in flight. For
//! streaming routes the guard and the admission slot move into the body.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::client_key::ClientKey;
use super::vector::{EmbeddingsRequest, VectorRequest};
use super::AppState;
use crate::error::SwitchyardError;
use crate::orchestrator::{EmbeddingResponse, StreamEvent};
use crate::types::{AggregatedResponse, CallSpec};

type SseResponse = Sse<KeepAliveStream<BoxStream<'static, Result<Event, Infallible>>>>;

pub async fn run(
    State(state): State<AppState>,
    ClientKey(key): ClientKey,
    body: Bytes,
) -> Result<Json<AggregatedResponse>, SwitchyardError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let spec: CallSpec = parse(&body)?;
    let _slot = state.admission.run.admit(&key, &cancel).await?;
    let response = state.orchestrator.run(&spec, &cancel).await?;
    Ok(Json(response))
}

pub async fn stream(
    State(state): State<AppState>,
    ClientKey(key): ClientKey,
    body: Bytes,
) -> Result<SseResponse, SwitchyardError> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let spec: CallSpec = parse(&body)?;
    let slot = state.admission.stream.admit(&key, &cancel).await?;
    let mut events = state.orchestrator.stream(spec, cancel).await?;

    let body = async_stream::stream! {
        let _slot = slot;
        let _guard = guard;
        while let Some(event) = events.next().await {
            yield Ok::<_, Infallible>(sse_event(&event));
        }
    };
    Ok(Sse::new(body.boxed()).keep_alive(KeepAlive::default()))
}

pub async fn vector_run(
    State(state): State<AppState>,
    ClientKey(key): ClientKey,
    body: Bytes,
) -> Result<Json<serde_json::Value>, SwitchyardError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let request: VectorRequest = parse(&body)?;
    let _slot = state.admission.vector.admit(&key, &cancel).await?;
    Ok(Json(state.vector.run(request, &cancel).await?))
}

pub async fn vector_stream(
    State(state): State<AppState>,
    ClientKey(key): ClientKey,
    body: Bytes,
) -> Result<SseResponse, SwitchyardError> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let request: VectorRequest = parse(&body)?;
    let slot = state.admission.vector.admit(&key, &cancel).await?;
    let mut items = state.vector.stream(request, &cancel).await?;

    let body = async_stream::stream! {
        let _slot = slot;
        let _guard = guard;
        let mut failed = false;
        while let Some(item) = items.next().await {
            match item {
                Ok(value) => {
                    yield Ok::<_, Infallible>(Event::default().event("item").data(value.to_string()));
                }
                Err(error) => {
                    yield Ok::<_, Infallible>(sse_event(&StreamEvent::error(&error)));
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            yield Ok::<_, Infallible>(Event::default().event("done").data("{}"));
        }
    };
    Ok(Sse::new(body.boxed()).keep_alive(KeepAlive::default()))
}

pub async fn embeddings(
    State(state): State<AppState>,
    ClientKey(key): ClientKey,
    body: Bytes,
) -> Result<Json<EmbeddingResponse>, SwitchyardError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let request: EmbeddingsRequest = parse(&body)?;
    let _slot = state.admission.embeddings.admit(&key, &cancel).await?;
    let response = state
        .orchestrator
        .embed(&request.candidates, &request.inputs, &cancel)
        .await?;
    Ok(Json(response))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once at least one provider is registered.
pub async fn ready(State(state): State<AppState>) -> Response {
    let providers: Vec<&str> = state.orchestrator.providers().ids().collect();
    if providers.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "providers": providers })),
        )
            .into_response();
    }
    Json(json!({ "status": "ready", "providers": providers })).into_response()
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, SwitchyardError> {
    serde_json::from_slice(body)
        .map_err(|err| SwitchyardError::Validation(format!("invalid request body: {err}")))
}

fn sse_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().event(event.name()).data(data),
        Err(err) => Event::default().event("error").data(
            json!({ "type": "error", "kind": "internal_error", "message": err.to_string() })
                .to_string(),
        ),
    }
}
