// Distribution broadcaster
// Fans lifecycle events out to connected viewers. Each recipient gets its
// own access evaluation and its own bounded channel, so one slow or dead
// consumer never affects the others.

use chrono::{DateTime, Utc};
use common::{SignalEvent, SignalStatus, SignalView, Tier};
use dashmap::DashMap;
use entitlements::{evaluate, QuotaTracker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Broadcaster configuration.
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Per-subscriber delivery buffer. A subscriber that falls this far
    /// behind starts losing deliveries and is expected to reconcile with a
    /// full re-fetch.
    pub channel_capacity: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// What kind of event a delivery carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryKind {
    Created,
    Transition { previous: SignalStatus },
}

/// One delivery to one viewer: the event kind plus the projection that
/// viewer is entitled to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(flatten)]
    pub kind: DeliveryKind,
    pub signal: SignalView,
}

struct Recipient {
    viewer_id: Uuid,
    tier: Tier,
    tx: mpsc::Sender<Delivery>,
}

/// A live subscription handed to the consuming surface. Dropping the
/// receiver disconnects the viewer; missed events are not replayed.
pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<Delivery>,
}

/// Per-recipient fan-out of signal events.
pub struct DistributionBroadcaster {
    recipients: DashMap<Uuid, Recipient>,
    quota: QuotaTracker,
    config: BroadcasterConfig,
}

impl DistributionBroadcaster {
    pub fn new(quota: QuotaTracker, config: BroadcasterConfig) -> Self {
        Self {
            recipients: DashMap::new(),
            quota,
            config,
        }
    }

    /// Register a connected viewer at its current tier.
    pub fn subscribe(&self, viewer_id: Uuid, tier: Tier) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let id = Uuid::new_v4();
        self.recipients.insert(id, Recipient { viewer_id, tier, tx });
        info!(
            subscription_id = %id,
            viewer_id = %viewer_id,
            tier = %tier,
            "Viewer subscribed"
        );
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, subscription_id: Uuid) {
        if self.recipients.remove(&subscription_id).is_some() {
            info!(subscription_id = %subscription_id, "Viewer unsubscribed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.recipients.len()
    }

    /// Consume the lifecycle event stream until it closes. Sequential
    /// consumption is what keeps one signal's transitions ordered toward
    /// every recipient; no ordering is promised across different signals.
    pub async fn run(self: Arc<Self>, mut events_rx: mpsc::Receiver<SignalEvent>) {
        while let Some(event) = events_rx.recv().await {
            self.dispatch(&event).await;
        }
        info!("Distribution loop stopped, lifecycle channel closed");
    }

    /// Announce a newly created signal to every connected viewer.
    pub async fn on_signal_created(&self, signal: common::Signal) {
        self.dispatch(&SignalEvent::Created { signal }).await
    }

    /// Announce a status transition to every connected viewer.
    pub async fn on_signal_transitioned(
        &self,
        signal: common::Signal,
        previous: SignalStatus,
    ) {
        self.dispatch(&SignalEvent::Transitioned { signal, previous })
            .await
    }

    /// Fan one event out to every connected viewer.
    pub async fn dispatch(&self, event: &SignalEvent) {
        self.dispatch_at(event, Utc::now()).await
    }

    async fn dispatch_at(&self, event: &SignalEvent, now: DateTime<Utc>) {
        let signal = event.signal();
        let kind = match event {
            SignalEvent::Created { .. } => DeliveryKind::Created,
            SignalEvent::Transitioned { previous, .. } => DeliveryKind::Transition {
                previous: *previous,
            },
        };

        // Snapshot the registry so evaluation never holds registry locks
        // across awaits.
        let recipients: Vec<(Uuid, Uuid, Tier, mpsc::Sender<Delivery>)> = self
            .recipients
            .iter()
            .map(|entry| {
                let r = entry.value();
                (*entry.key(), r.viewer_id, r.tier, r.tx.clone())
            })
            .collect();

        let mut stale = Vec::new();
        for (subscription_id, viewer_id, tier, tx) in recipients {
            let count = self.quota.count_today(viewer_id, now).await;
            let exhausted = QuotaTracker::is_exhausted(count, tier);
            let decision = evaluate(signal, tier, exhausted, now);
            let Some(view) = decision.view else {
                debug!(
                    subscription_id = %subscription_id,
                    signal_id = %signal.id,
                    "Event not visible to viewer"
                );
                continue;
            };

            if signal.is_active() {
                self.quota.record_view(viewer_id, signal.id, now).await;
            }

            match tx.try_send(Delivery {
                kind: kind.clone(),
                signal: view,
            }) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscription_id = %subscription_id,
                        viewer_id = %viewer_id,
                        "Subscriber lagging, delivery dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    stale.push(subscription_id);
                }
            }
        }

        for subscription_id in stale {
            self.recipients.remove(&subscription_id);
            debug!(subscription_id = %subscription_id, "Removed disconnected subscriber");
        }
    }
}
