use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::classify::{Tab, classify};
use crate::models::order::Order;
use crate::routing::{RouteOutcome, RouteResolver, RoutingApi};
use crate::state::AppState;
use crate::tracking::CourierTrack;
use crate::viewport::{MapSurface, ViewportFitter};

/// Live tracking for one active delivery order: a feed subscription whose
/// samples drive route resolution and viewport fitting. The subscription and
/// task are released on every exit path, including abort.
pub struct TrackingSession {
    order_id: u64,
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl TrackingSession {
    pub fn spawn(
        state: Arc<AppState>,
        order: &Order,
        routing: Arc<dyn RoutingApi>,
        surface: Arc<dyn MapSurface>,
        route_timeout: Duration,
    ) -> Self {
        let order_id = order.id;
        let customer = order.customer_location;
        let alive = Arc::new(AtomicBool::new(true));

        // Subscribe before spawning so a sample published right after this
        // call is never missed.
        let mut subscription = state.hub.subscribe(order_id);
        let resolver = RouteResolver::new(routing, route_timeout);
        let fitter = ViewportFitter::new(surface);

        let task_alive = alive.clone();
        let handle = tokio::spawn(async move {
            fitter.show_customer(customer);

            while let Some(sample) = subscription.next_sample().await {
                let courier = sample.point();
                let resolver = resolver.clone();
                let fitter = fitter.clone();
                let state = state.clone();
                let alive = task_alive.clone();

                // Resolution runs concurrently so a slow routing call never
                // blocks newer samples; the resolver discards out-of-order
                // completions.
                tokio::spawn(async move {
                    match resolver.resolve(customer, courier).await {
                        RouteOutcome::Fresh { route, ticket } => {
                            if !alive.load(Ordering::SeqCst) {
                                return;
                            }
                            // A newer sample may have finished resolving since
                            // this one passed the in-resolver check; re-verify
                            // right before the track is written.
                            if !resolver.is_current(ticket) {
                                state
                                    .metrics
                                    .route_resolutions_total
                                    .with_label_values(&["stale_discarded"])
                                    .inc();
                                return;
                            }
                            state
                                .metrics
                                .route_resolutions_total
                                .with_label_values(&[route.source.as_label()])
                                .inc();
                            state.tracks.insert(
                                order_id,
                                CourierTrack {
                                    courier,
                                    route,
                                    updated_at: Utc::now(),
                                },
                            );
                            fitter.fit(customer, courier);
                        }
                        RouteOutcome::Stale => {
                            state
                                .metrics
                                .route_resolutions_total
                                .with_label_values(&["stale_discarded"])
                                .inc();
                        }
                    }
                });
            }

            debug!(order_id, "location feed closed; tracking session ending");
        });

        Self {
            order_id,
            alive,
            handle,
        }
    }

    pub fn order_id(&self) -> u64 {
        self.order_id
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.handle.abort();
    }
}

/// Keeps one tracking session per order that is currently in the active tab
/// and needs delivery; everything else is torn down.
pub struct SessionManager {
    sessions: DashMap<u64, TrackingSession>,
    routing: Arc<dyn RoutingApi>,
    surface: Arc<dyn MapSurface>,
    route_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        routing: Arc<dyn RoutingApi>,
        surface: Arc<dyn MapSurface>,
        route_timeout: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            routing,
            surface,
            route_timeout,
        }
    }

    pub async fn sync(&self, state: &Arc<AppState>) {
        let now = Utc::now();
        let snapshot = state.store.snapshot().await;

        let mut eligible = HashSet::new();
        for order in snapshot.iter() {
            if order.need_delivery && classify(order, now) == Tab::Active {
                eligible.insert(order.id);
                if !self.sessions.contains_key(&order.id) {
                    let session = TrackingSession::spawn(
                        state.clone(),
                        order,
                        self.routing.clone(),
                        self.surface.clone(),
                        self.route_timeout,
                    );
                    info!(order_id = order.id, "tracking session started");
                    self.sessions.insert(order.id, session);
                }
            }
        }

        self.sessions.retain(|order_id, _| {
            let keep = eligible.contains(order_id);
            if !keep {
                info!(order_id, "tracking session stopped");
                state.tracks.remove(order_id);
            }
            keep
        });
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Re-syncs sessions whenever the snapshot changes (or periodically as a
/// fallback) until the state is dropped.
pub async fn run_supervisor(
    state: Arc<AppState>,
    manager: SessionManager,
    resync_interval: Duration,
) {
    info!("session supervisor started");
    loop {
        manager.sync(&state).await;
        tokio::select! {
            _ = state.resync.notified() => {}
            _ = tokio::time::sleep(resync_interval) => {}
        }
    }
}
