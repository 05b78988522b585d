use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{database::SubscriptionDatabase, entities::PushSubscription, error::SubscriptionError};

pub struct SubscriptionService<D: SubscriptionDatabase + ?Sized> {
    subscription_db: Arc<D>,
}

impl<D: SubscriptionDatabase + ?Sized> SubscriptionService<D> {
    pub fn new(subscription_db: Arc<D>) -> Self {
        Self { subscription_db }
    }

    /// Stores the descriptor. Subscribing twice with the same descriptor is not an error.
    #[instrument(skip_all)]
    pub async fn subscribe(&self, descriptor: Value) -> Result<PushSubscription, SubscriptionError> {
        let subscription = PushSubscription::try_from_value(descriptor)?;

        let inserted = self
            .subscription_db
            .add_subscription(subscription.clone())
            .await?;

        if inserted {
            info!(endpoint = %subscription.endpoint(), "New push subscription");
        } else {
            debug!(endpoint = %subscription.endpoint(), "Push subscription already known");
        }

        Ok(subscription)
    }

    #[instrument(skip_all)]
    pub async fn unsubscribe(&self, descriptor: Value) -> Result<bool, SubscriptionError> {
        let subscription = PushSubscription::try_from_value(descriptor)?;
        let removed = self
            .subscription_db
            .remove_subscription(&subscription)
            .await?;

        if removed {
            info!(endpoint = %subscription.endpoint(), "Push subscription removed");
        }
        Ok(removed)
    }

    pub async fn count(&self) -> Result<usize, SubscriptionError> {
        self.subscription_db.count_subscriptions().await
    }
}
