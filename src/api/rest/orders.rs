use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::classify;
use crate::countdown::{self, CountdownDisplay, ScheduleSummary};
use crate::error::AppError;
use crate::state::AppState;
use crate::tracking::{self, CourierTrack};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/tabs", get(order_tabs))
        .route("/orders/:id/countdown", get(order_countdown))
        .route("/orders/:id/summary", get(order_summary))
        .route("/orders/:id/track", get(order_track))
        .route("/orders/:id/confirm", post(confirm_order))
        .route("/orders/:id/rating", post(rate_order))
}

#[derive(Serialize)]
struct TabsResponse {
    active: Vec<u64>,
    missed: Vec<u64>,
    completed: Vec<u64>,
}

async fn order_tabs(State(state): State<Arc<AppState>>) -> Json<TabsResponse> {
    let snapshot = state.store.snapshot().await;
    let view = classify::partition(&snapshot, Utc::now());

    Json(TabsResponse {
        active: view.active.iter().map(|o| o.id).collect(),
        missed: view.missed.iter().map(|o| o.id).collect(),
        completed: view.completed.iter().map(|o| o.id).collect(),
    })
}

async fn order_countdown(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<CountdownDisplay>, AppError> {
    let order = state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    match countdown::order_countdown(&order, Utc::now()) {
        Some(display) => Ok(Json(display)),
        None => Err(AppError::NotFound(format!(
            "order {id} has no valid delivery schedule"
        ))),
    }
}

async fn order_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ScheduleSummary>, AppError> {
    let order = state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    match countdown::summary(&order, Utc::now()) {
        Some(line) => Ok(Json(line)),
        None => Err(AppError::NotFound(format!(
            "order {id} has no valid delivery schedule"
        ))),
    }
}

async fn order_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<CourierTrack>, AppError> {
    state
        .tracks
        .get(&id)
        .map(|entry| Json(entry.value().clone()))
        .ok_or_else(|| AppError::NotFound(format!("no live courier track for order {id}")))
}

#[derive(Serialize)]
struct ConfirmAck {
    order_id: u64,
    rating_open: bool,
}

async fn confirm_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ConfirmAck>, AppError> {
    let rating_open = tracking::confirm_delivery(&state, id).await?;
    Ok(Json(ConfirmAck {
        order_id: id,
        rating_open,
    }))
}

#[derive(Deserialize)]
pub struct RatingSubmission {
    pub stars: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Serialize)]
struct RatingAck {
    order_id: u64,
    rated: bool,
}

async fn rate_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<RatingSubmission>,
) -> Result<Json<RatingAck>, AppError> {
    tracking::submit_rating(&state, id, payload.stars, &payload.comment).await?;
    Ok(Json(RatingAck {
        order_id: id,
        rated: true,
    }))
}
