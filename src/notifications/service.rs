use futures::{StreamExt, stream};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::{
    entities::{BroadcastReport, DeliveryOutcome, NotificationPayload},
    gateway::PushGateway,
};
use crate::subscriptions::database::SubscriptionDatabase;

/// Fans a notification out to every stored subscription and prunes the dead ones.
pub struct NotificationService<D, G>
where
    D: SubscriptionDatabase + ?Sized,
    G: PushGateway + ?Sized,
{
    subscription_db: Arc<D>,
    push_gateway: Arc<G>,
    max_in_flight: usize,
}

impl<D, G> NotificationService<D, G>
where
    D: SubscriptionDatabase + ?Sized,
    G: PushGateway + ?Sized,
{
    pub fn new(subscription_db: Arc<D>, push_gateway: Arc<G>, max_in_flight: usize) -> Self {
        Self {
            subscription_db,
            push_gateway,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Sends `payload` to a snapshot of all subscriptions and waits for every send.
    ///
    /// Subscriptions the push service reports as gone are removed, transient
    /// failures are only counted. Never fails as a whole: the report counts
    /// every subscription of the snapshot exactly once.
    #[instrument(skip_all, fields(title = %payload.title))]
    pub async fn broadcast(&self, payload: &NotificationPayload) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        let subscriptions = match self.subscription_db.list_subscriptions().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!("Failed to read subscriptions: {}", e);
                return report;
            }
        };

        if subscriptions.is_empty() {
            debug!("No subscriptions to notify");
            return report;
        }

        let bytes: Arc<[u8]> = match payload.to_push_bytes() {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                error!("Failed to serialize notification payload: {}", e);
                report.failure_count = subscriptions.len();
                return report;
            }
        };

        let gateway = self.push_gateway.clone();
        let outcomes: Vec<_> = stream::iter(subscriptions)
            .map(move |subscription| {
                let gateway = gateway.clone();
                let bytes = bytes.clone();
                async move {
                    let outcome = DeliveryOutcome::from(gateway.send(&subscription, &bytes).await);
                    (subscription, outcome)
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        for (subscription, outcome) in &outcomes {
            report.record(outcome);

            match outcome {
                DeliveryOutcome::Delivered => {
                    debug!(endpoint = %subscription.endpoint(), "Notification delivered");
                }
                DeliveryOutcome::Gone => {
                    info!(endpoint = %subscription.endpoint(), "Pruning gone subscription");
                    if let Err(e) = self.subscription_db.remove_subscription(subscription).await {
                        warn!(
                            endpoint = %subscription.endpoint(),
                            "Failed to remove gone subscription: {}", e
                        );
                    }
                }
                DeliveryOutcome::TransientFailure(reason) => {
                    warn!(
                        endpoint = %subscription.endpoint(),
                        "Notification delivery failed: {}", reason
                    );
                }
            }
        }

        info!(
            success_count = report.success_count,
            failure_count = report.failure_count,
            "Broadcast finished"
        );
        report
    }
}
