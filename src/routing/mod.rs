use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::models::location::{GeoPoint, Route, RouteSource};

#[async_trait]
pub trait RoutingApi: Send + Sync {
    async fn road_route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, AppError>;
}

/// OSRM-style routing client. `/route/v1/driving/{lng},{lat};{lng},{lat}`
/// with geojson geometry; coordinates on the wire are `[lng, lat]` pairs.
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[async_trait]
impl RoutingApi for OsrmClient {
    async fn road_route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, AppError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, start.lng, start.lat, end.lng, end.lat
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| AppError::Routing(format!("route request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Routing(format!(
                "routing service returned {}",
                response.status()
            )));
        }

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| AppError::Routing(format!("invalid routing payload: {err}")))?;

        if body.code != "Ok" {
            return Err(AppError::Routing(format!(
                "routing service answered code {}",
                body.code
            )));
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Routing("routing service returned no routes".to_string()))?;

        Ok(route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lng, lat]| GeoPoint { lat, lng })
            .collect())
    }
}

pub enum RouteOutcome {
    /// The ticket travels with the geometry so the caller can re-check
    /// freshness with `is_current` immediately before committing it.
    Fresh { route: Route, ticket: u64 },
    /// A newer request was issued while this one was in flight; the caller
    /// must discard the geometry instead of overwriting fresher state.
    Stale,
}

/// Per-order route resolution. Never fails: any transport error, non-success
/// answer, empty polyline, or timeout degrades to the straight customer-to-
/// courier line so the caller always has something drawable. A monotonic
/// ticket counter discards responses that complete out of order.
#[derive(Clone)]
pub struct RouteResolver {
    api: Arc<dyn RoutingApi>,
    timeout: Duration,
    issued: Arc<AtomicU64>,
}

impl RouteResolver {
    pub fn new(api: Arc<dyn RoutingApi>, timeout: Duration) -> Self {
        Self {
            api,
            timeout,
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn resolve(&self, start: GeoPoint, end: GeoPoint) -> RouteOutcome {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let route = match tokio::time::timeout(self.timeout, self.api.road_route(start, end)).await
        {
            Ok(Ok(points)) if points.len() >= 2 => Route {
                points,
                source: RouteSource::Road,
            },
            Ok(Ok(_)) => {
                warn!("routing service returned a degenerate polyline; using straight line");
                Route::straight_line(start, end)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "route resolution failed; using straight line");
                Route::straight_line(start, end)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "route resolution timed out; using straight line"
                );
                Route::straight_line(start, end)
            }
        };

        if !self.is_current(ticket) {
            return RouteOutcome::Stale;
        }
        RouteOutcome::Fresh { route, ticket }
    }

    /// Whether `ticket` is still the latest issued request. Checked inside
    /// `resolve`, and again by the caller right before the result is written
    /// anywhere shared, since a newer resolution may have landed in between.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket
    }
}
