//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        ErrorResponse, HealthResponse, NextListResponse, NextRequest, NextResponse, StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use searchgraph_core::{EdgeKind, Keyword, KeywordGraphStore, SearchGraphError};

fn error_response(status: StatusCode, error: &SearchGraphError) -> Response {
    (status, Json(ErrorResponse::new(error.to_string()))).into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get node and edge counts.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    let session = state.session.read().await;
    match session.ping() {
        Ok(status) => (StatusCode::OK, Json(StatusResponse::from(status))).into_response(),
        Err(e) => {
            tracing::error!("status failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

// =============================================================================
// NEXT HANDLERS
// =============================================================================

/// Record one transition: merge both keywords and upsert-or-increment `NEXT`.
pub async fn next_handler(
    State(state): State<AppState>,
    Json(request): Json<NextRequest>,
) -> Response {
    let (from, to) = match request.to_keywords() {
        Ok(pair) => pair,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let mut session = state.session.write().await;
    match session.increment_edge(EdgeKind::Next, &from, &to, None) {
        Ok(count) => (
            StatusCode::OK,
            Json(NextResponse {
                from: from.to_string(),
                to: to.to_string(),
                count: count.value(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("next upsert failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

/// Outgoing `NEXT` edges of a keyword.
pub async fn next_list_handler(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> Response {
    list_for(&state, EdgeKind::Next, &keyword).await
}

/// Outgoing `FAIL_NEXT` edges of a keyword.
pub async fn fail_next_list_handler(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> Response {
    list_for(&state, EdgeKind::FailNext, &keyword).await
}

async fn list_for(state: &AppState, kind: EdgeKind, keyword: &str) -> Response {
    let keyword = Keyword::new(keyword);
    let session = state.session.read().await;

    let listing = session.contains_keyword(&keyword).and_then(|known| {
        if known {
            session.next_list(kind, &keyword)
        } else {
            Err(SearchGraphError::KeywordNotFound(keyword.to_string()))
        }
    });

    match listing {
        Ok(list) => {
            (StatusCode::OK, Json(NextListResponse::new(&keyword, kind, list))).into_response()
        }
        Err(e @ SearchGraphError::KeywordNotFound(_)) => error_response(StatusCode::NOT_FOUND, &e),
        Err(e) => {
            tracing::error!("{} list failed: {}", kind, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}
