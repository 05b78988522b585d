use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    database::{inmemory::InMemoryDatabase, pool::create_sqlite_pool, sqlite::SqliteDatabase},
    notifications::{
        gateway::{PushGateway, webpush::WebPushGateway},
        service::NotificationService,
    },
    settings::{DatabaseSettings, Settings},
    subscriptions::{database::SubscriptionDatabase, service::SubscriptionService},
    vapid::keys::VapidKeys,
};

pub struct AppContext {
    pub subscription_service: SubscriptionService<dyn SubscriptionDatabase>,
    /// `None` while the server has no usable VAPID keys
    pub notification_service: Option<NotificationService<dyn SubscriptionDatabase, dyn PushGateway>>,
    pub vapid_public_key: String,
}

impl AppContext {
    pub fn new(
        subscription_db: Arc<dyn SubscriptionDatabase>,
        push_gateway: Option<Arc<dyn PushGateway>>,
        vapid_public_key: String,
        max_in_flight: usize,
    ) -> Self {
        let notification_service = push_gateway.map(|gateway| {
            NotificationService::new(subscription_db.clone(), gateway, max_in_flight)
        });

        Self {
            subscription_service: SubscriptionService::new(subscription_db),
            notification_service,
            vapid_public_key,
        }
    }

    /// Creates the application context from settings. Missing or broken VAPID
    /// keys only disable push delivery.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let subscription_db = create_subscription_db(&settings.database).await?;

        for name in settings.vapid.missing_keys() {
            warn!("Missing {} in environment (.env)", name);
        }

        let push_gateway = match settings.vapid.credentials() {
            Some((public_key, private_key)) => {
                match VapidKeys::from_base64url(public_key, private_key) {
                    Ok(keys) => {
                        let gateway = WebPushGateway::new(
                            &keys,
                            settings.vapid.mailto(),
                            settings.push.request_timeout(),
                            settings.push.ttl_secs,
                        )?;
                        Some(Arc::new(gateway) as Arc<dyn PushGateway>)
                    }
                    Err(e) => {
                        warn!("VAPID keys are unusable, push delivery disabled: {:#}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let context = Self::new(
            subscription_db,
            push_gateway,
            settings.vapid.public_key().unwrap_or_default().to_string(),
            settings.push.max_in_flight,
        );

        match context.subscription_service.count().await {
            Ok(count) => info!("Loaded {} push subscriptions", count),
            Err(e) => warn!("Could not count stored subscriptions: {}", e),
        }

        Ok(context)
    }
}

async fn create_subscription_db(
    settings: &DatabaseSettings,
) -> Result<Arc<dyn SubscriptionDatabase>> {
    match settings {
        DatabaseSettings::InMemory => {
            info!("Subscriptions are kept in memory and lost on restart");
            Ok(Arc::new(InMemoryDatabase::new()))
        }
        DatabaseSettings::Sqlite { path } => {
            let pool = create_sqlite_pool(path)
                .await
                .with_context(|| format!("Failed to open subscription database {}", path))?;
            let db = SqliteDatabase::new(pool);
            db.init().await?;
            info!("Subscriptions are stored in {}", path);
            Ok(Arc::new(db))
        }
    }
}
