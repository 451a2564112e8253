use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::post;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::models::location::LocationSample;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/locations/orders/:id", post(push_location))
}

#[derive(Deserialize)]
pub struct LocationPush {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize)]
pub struct PushAck {
    pub order_id: u64,
    pub subscribers: usize,
}

/// Courier position push, fanned out to whoever currently tracks the order.
/// No replay: a push with no live subscription is acknowledged and dropped.
async fn push_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<LocationPush>,
) -> Result<Json<PushAck>, AppError> {
    let sample = LocationSample {
        order_id: id,
        lat: payload.latitude,
        lng: payload.longitude,
    };

    if !sample.is_valid() {
        return Err(AppError::BadRequest(
            "coordinates are out of range".to_string(),
        ));
    }

    let subscribers = state.hub.publish(sample);
    state.metrics.location_samples_total.inc();
    debug!(order_id = id, subscribers, "location sample published");

    Ok(Json(PushAck {
        order_id: id,
        subscribers,
    }))
}
