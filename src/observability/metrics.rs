use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub snapshot_reloads_total: IntCounterVec,
    pub route_resolutions_total: IntCounterVec,
    pub confirm_requests_total: IntCounterVec,
    pub rating_submissions_total: IntCounterVec,
    pub location_samples_total: IntCounter,
    pub live_location_channels: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let snapshot_reloads_total = IntCounterVec::new(
            Opts::new("snapshot_reloads_total", "Order history reloads by outcome"),
            &["outcome"],
        )
        .expect("valid snapshot_reloads_total metric");

        let route_resolutions_total = IntCounterVec::new(
            Opts::new(
                "route_resolutions_total",
                "Route resolutions by source (road, straight_line, stale_discarded)",
            ),
            &["source"],
        )
        .expect("valid route_resolutions_total metric");

        let confirm_requests_total = IntCounterVec::new(
            Opts::new("confirm_requests_total", "Confirm-delivery calls by outcome"),
            &["outcome"],
        )
        .expect("valid confirm_requests_total metric");

        let rating_submissions_total = IntCounterVec::new(
            Opts::new("rating_submissions_total", "Rating submissions by outcome"),
            &["outcome"],
        )
        .expect("valid rating_submissions_total metric");

        let location_samples_total = IntCounter::new(
            "location_samples_total",
            "Courier location samples accepted from the feed",
        )
        .expect("valid location_samples_total metric");

        let live_location_channels = IntGauge::new(
            "live_location_channels",
            "Per-order location channels with at least one subscriber",
        )
        .expect("valid live_location_channels metric");

        registry
            .register(Box::new(snapshot_reloads_total.clone()))
            .expect("register snapshot_reloads_total");
        registry
            .register(Box::new(route_resolutions_total.clone()))
            .expect("register route_resolutions_total");
        registry
            .register(Box::new(confirm_requests_total.clone()))
            .expect("register confirm_requests_total");
        registry
            .register(Box::new(rating_submissions_total.clone()))
            .expect("register rating_submissions_total");
        registry
            .register(Box::new(location_samples_total.clone()))
            .expect("register location_samples_total");
        registry
            .register(Box::new(live_location_channels.clone()))
            .expect("register live_location_channels");

        Self {
            registry,
            snapshot_reloads_total,
            route_resolutions_total,
            confirm_requests_total,
            rating_submissions_total,
            location_samples_total,
            live_location_channels,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
