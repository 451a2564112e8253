use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A courier position push from the realtime feed. The wire format carries no
/// sequence number; freshness is wall-clock arrival order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationSample {
    pub order_id: u64,
    pub lat: f64,
    pub lng: f64,
}

impl LocationSample {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Road,
    StraightLine,
}

impl RouteSource {
    pub fn as_label(self) -> &'static str {
        match self {
            RouteSource::Road => "road",
            RouteSource::StraightLine => "straight_line",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub points: Vec<GeoPoint>,
    pub source: RouteSource,
}

impl Route {
    pub fn straight_line(start: GeoPoint, end: GeoPoint) -> Self {
        Self {
            points: vec![start, end],
            source: RouteSource::StraightLine,
        }
    }
}
