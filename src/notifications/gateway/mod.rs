pub mod webpush;

use async_trait::async_trait;
use thiserror::Error;

use crate::subscriptions::entities::PushSubscription;

#[derive(Error, Debug)]
pub enum NotificationError {
    /// The push service reported 404 or 410; the subscription will never work again.
    #[error("Push subscription is gone (HTTP {0})")]
    Gone(u16),

    #[error("Failed to send notification: {0}")]
    SendFailure(String),

    #[error("Failed to initialize push gateway: {0}")]
    InitializationFailed(String),
}

/// Delivers an already serialized payload to a single subscription.
///
/// Implementations own their timeout: a call must always resolve.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), NotificationError>;
}
