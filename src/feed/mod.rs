use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use prometheus::IntGauge;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::models::location::LocationSample;

/// Push feed of courier positions, one broadcast channel per order. There is
/// no replay buffer: a subscriber that attaches late only sees future samples,
/// and a push with no subscribers is dropped.
#[derive(Clone)]
pub struct LocationHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    channels: DashMap<u64, broadcast::Sender<LocationSample>>,
    buffer: usize,
    channels_gauge: IntGauge,
}

impl LocationHub {
    pub fn new(buffer: usize, channels_gauge: IntGauge) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: DashMap::new(),
                buffer,
                channels_gauge,
            }),
        }
    }

    /// Delivers a sample to current subscribers, returning how many received it.
    pub fn publish(&self, sample: LocationSample) -> usize {
        match self.inner.channels.get(&sample.order_id) {
            Some(tx) => tx.send(sample).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscribe(&self, order_id: u64) -> LocationSubscription {
        let rx = match self.inner.channels.entry(order_id) {
            Entry::Occupied(entry) => entry.get().subscribe(),
            Entry::Vacant(slot) => {
                let (tx, rx) = broadcast::channel(self.inner.buffer);
                slot.insert(tx);
                self.inner.channels_gauge.inc();
                rx
            }
        };

        LocationSubscription {
            order_id,
            stream: Some(BroadcastStream::new(rx)),
            inner: self.inner.clone(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }
}

/// Scoped feed subscription; dropping it releases the channel on every exit
/// path, pruning the hub entry once no receivers remain.
pub struct LocationSubscription {
    order_id: u64,
    stream: Option<BroadcastStream<LocationSample>>,
    inner: Arc<HubInner>,
}

impl LocationSubscription {
    pub fn order_id(&self) -> u64 {
        self.order_id
    }

    /// Next sample, or `None` once the channel is gone. A lagged receiver
    /// skips the missed samples and keeps going; only the newest position
    /// matters.
    pub async fn next_sample(&mut self) -> Option<LocationSample> {
        let stream = self.stream.as_mut()?;
        loop {
            match stream.next().await {
                Some(Ok(sample)) => return Some(sample),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(
                        order_id = self.order_id,
                        skipped, "location feed lagged; skipping stale samples"
                    );
                }
                None => return None,
            }
        }
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.stream.take();
        let removed = self
            .inner
            .channels
            .remove_if(&self.order_id, |_, tx| tx.receiver_count() == 0);
        if removed.is_some() {
            self.inner.channels_gauge.dec();
        }
    }
}
