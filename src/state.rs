use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::feed::LocationHub;
use crate::observability::metrics::Metrics;
use crate::orders::{OrderApi, SnapshotStore};
use crate::tracking::CourierTrack;
use crate::tracking::gate::RatingGates;

pub struct AppState {
    pub orders_api: Arc<dyn OrderApi>,
    pub store: SnapshotStore,
    pub hub: LocationHub,
    pub gates: RatingGates,
    pub tracks: DashMap<u64, CourierTrack>,
    pub confirms_in_flight: DashMap<u64, ()>,
    /// Woken whenever tab membership may have changed (reload, boundary
    /// crossing) so the session supervisor re-syncs promptly.
    pub resync: Notify,
    pub metrics: Metrics,
    pub reload_retry_attempts: u32,
    pub reload_retry_backoff: Duration,
}

impl AppState {
    pub fn new(
        orders_api: Arc<dyn OrderApi>,
        feed_buffer_size: usize,
        reload_retry_attempts: u32,
        reload_retry_backoff: Duration,
    ) -> Self {
        let metrics = Metrics::new();
        let hub = LocationHub::new(feed_buffer_size, metrics.live_location_channels.clone());

        Self {
            orders_api,
            store: SnapshotStore::new(),
            hub,
            gates: RatingGates::new(),
            tracks: DashMap::new(),
            confirms_in_flight: DashMap::new(),
            resync: Notify::new(),
            metrics,
            reload_retry_attempts,
            reload_retry_backoff,
        }
    }
}
