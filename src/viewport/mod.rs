use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::models::location::GeoPoint;

/// Minimum half-extent in degrees. Coincident or near-coincident points are
/// padded so the fitted bounds are never zero-area.
pub const MIN_DELTA: f64 = 0.0005;

pub const FIT_PADDING_PX: u32 = 50;
pub const CAMERA_ANIMATION_MS: u64 = 1000;
pub const INITIAL_ZOOM: f64 = 11.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub northeast: GeoPoint,
    pub southwest: GeoPoint,
}

/// Bounding region covering both points, with degenerate axes expanded
/// symmetrically by `MIN_DELTA` on each side.
pub fn bounds_for(a: GeoPoint, b: GeoPoint) -> Bounds {
    let mut ne = GeoPoint {
        lat: a.lat.max(b.lat),
        lng: a.lng.max(b.lng),
    };
    let mut sw = GeoPoint {
        lat: a.lat.min(b.lat),
        lng: a.lng.min(b.lng),
    };

    if (ne.lng - sw.lng).abs() < MIN_DELTA {
        ne.lng += MIN_DELTA;
        sw.lng -= MIN_DELTA;
    }
    if (ne.lat - sw.lat).abs() < MIN_DELTA {
        ne.lat += MIN_DELTA;
        sw.lat -= MIN_DELTA;
    }

    Bounds {
        northeast: ne,
        southwest: sw,
    }
}

/// Seam to the map camera. Calls are fire-and-forget with last-call-wins
/// semantics; rapid successive calls override one another rather than queue.
pub trait MapSurface: Send + Sync {
    fn set_camera(&self, center: GeoPoint, zoom: f64, duration_ms: u64);
    fn fit_bounds(&self, bounds: Bounds, padding_px: u32, duration_ms: u64);
}

#[derive(Clone)]
pub struct ViewportFitter {
    surface: Arc<dyn MapSurface>,
}

impl ViewportFitter {
    pub fn new(surface: Arc<dyn MapSurface>) -> Self {
        Self { surface }
    }

    /// Initial mount: center on the customer until a courier position exists.
    pub fn show_customer(&self, customer: GeoPoint) {
        self.surface
            .set_camera(customer, INITIAL_ZOOM, CAMERA_ANIMATION_MS);
    }

    pub fn fit(&self, a: GeoPoint, b: GeoPoint) -> Bounds {
        let bounds = bounds_for(a, b);
        self.surface
            .fit_bounds(bounds, FIT_PADDING_PX, CAMERA_ANIMATION_MS);
        bounds
    }
}

/// Headless surface for the daemon: camera updates become log lines.
pub struct TracingSurface;

impl MapSurface for TracingSurface {
    fn set_camera(&self, center: GeoPoint, zoom: f64, duration_ms: u64) {
        debug!(lat = center.lat, lng = center.lng, zoom, duration_ms, "set camera");
    }

    fn fit_bounds(&self, bounds: Bounds, padding_px: u32, duration_ms: u64) {
        debug!(
            ne_lat = bounds.northeast.lat,
            ne_lng = bounds.northeast.lng,
            sw_lat = bounds.southwest.lat,
            sw_lng = bounds.southwest.lng,
            padding_px,
            duration_ms,
            "fit bounds"
        );
    }
}
