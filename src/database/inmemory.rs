use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::subscriptions::{
    database::SubscriptionDatabase, entities::PushSubscription, error::SubscriptionError,
};

/// Process-lifetime subscription registry. Everything is lost on restart.
pub struct InMemoryDatabase {
    pub subscriptions: Mutex<HashMap<String, PushSubscription>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        InMemoryDatabase {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> SubscriptionError {
    SubscriptionError::Database(format!("Lock poisoned: {}", err))
}

#[async_trait]
impl SubscriptionDatabase for InMemoryDatabase {
    async fn add_subscription(
        &self,
        subscription: PushSubscription,
    ) -> Result<bool, SubscriptionError> {
        let mut subscriptions_lock = self.subscriptions.lock().map_err(poisoned)?;

        if subscriptions_lock.contains_key(subscription.id()) {
            return Ok(false);
        }
        subscriptions_lock.insert(subscription.id().to_string(), subscription);
        Ok(true)
    }

    async fn list_subscriptions(&self) -> Result<Vec<PushSubscription>, SubscriptionError> {
        let subscriptions_lock = self.subscriptions.lock().map_err(poisoned)?;
        // Callers iterate their own copy while others keep mutating the map.
        Ok(subscriptions_lock.values().cloned().collect())
    }

    async fn remove_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<bool, SubscriptionError> {
        let mut subscriptions_lock = self.subscriptions.lock().map_err(poisoned)?;
        Ok(subscriptions_lock.remove(subscription.id()).is_some())
    }

    async fn count_subscriptions(&self) -> Result<usize, SubscriptionError> {
        let subscriptions_lock = self.subscriptions.lock().map_err(poisoned)?;
        Ok(subscriptions_lock.len())
    }
}
