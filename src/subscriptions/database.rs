use async_trait::async_trait;

use super::{entities::PushSubscription, error::SubscriptionError};

/// Registry of active push subscriptions, keyed by [`PushSubscription::id`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionDatabase: Send + Sync {
    /// Returns `false` when an identical subscription was already stored.
    async fn add_subscription(&self, subscription: PushSubscription)
    -> Result<bool, SubscriptionError>;

    /// A point-in-time copy of all subscriptions, in no particular order.
    async fn list_subscriptions(&self) -> Result<Vec<PushSubscription>, SubscriptionError>;

    /// Returns `false` when the subscription was not stored.
    async fn remove_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<bool, SubscriptionError>;

    async fn count_subscriptions(&self) -> Result<usize, SubscriptionError>;
}
