use crate::consts::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::db_types::Identity;
use crate::types::AppState;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "registration bot is running" }))
        .route("/ping", get(|| async { "pong" }))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/users", get(recent_users_handler))
        .route("/users/:actor_id", get(user_handler))
        .with_state(app_state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    database: bool,
}

async fn health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = app_state.store.count().await.is_ok();
    Json(Health {
        status: "healthy",
        database,
    })
}

#[derive(Serialize)]
struct Stats {
    registered_users: i64,
    active_conversations: usize,
}

async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Stats>, StatusCode> {
    let registered_users = app_state
        .store
        .count()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(Stats {
        registered_users,
        active_conversations: app_state.workflow.active_conversations(),
    }))
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

async fn recent_users_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Identity>>, StatusCode> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    trace!(limit, "listing recent users");
    app_state
        .store
        .list_recent(limit)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn user_handler(
    State(app_state): State<Arc<AppState>>,
    Path(actor_id): Path<i64>,
) -> Result<Json<Identity>, StatusCode> {
    match app_state.store.find(actor_id).await {
        Ok(Some(identity)) => Ok(Json(identity)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
