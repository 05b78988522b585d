use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument};
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushError, WebPushMessage,
    WebPushMessageBuilder,
};

use super::{NotificationError, PushGateway};
use crate::{subscriptions::entities::PushSubscription, vapid::keys::VapidKeys};

/// Web Push (RFC 8030) gateway: aes128gcm payload encryption (RFC 8291) and
/// VAPID signing (RFC 8292) by the `web-push` crate, HTTP delivery by reqwest.
pub struct WebPushGateway {
    client: reqwest::Client,
    private_key: String,
    subject: Option<String>,
    ttl: u32,
}

impl WebPushGateway {
    /// `contact` becomes the VAPID `sub` claim. Plain addresses get a `mailto:` prefix.
    pub fn new(
        keys: &VapidKeys,
        contact: Option<&str>,
        request_timeout: Duration,
        ttl: u32,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| NotificationError::InitializationFailed(err.to_string()))?;

        Ok(WebPushGateway {
            client,
            private_key: keys.private_key_base64url().to_string(),
            subject: contact.map(vapid_subject),
            ttl,
        })
    }

    fn build_message(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<WebPushMessage, NotificationError> {
        let keys = subscription.keys().ok_or_else(|| {
            NotificationError::SendFailure("Subscription has no encryption keys".to_string())
        })?;
        let subscription_info = SubscriptionInfo::new(subscription.endpoint(), keys.p256dh, keys.auth);

        let mut signature_builder =
            VapidSignatureBuilder::from_base64(&self.private_key, &subscription_info)?;
        if let Some(subject) = &self.subject {
            signature_builder.add_claim("sub", subject.as_str());
        }
        let signature = signature_builder.build()?;

        let mut builder = WebPushMessageBuilder::new(&subscription_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.ttl);

        Ok(builder.build()?)
    }
}

#[async_trait]
impl PushGateway for WebPushGateway {
    #[instrument(skip_all, fields(endpoint = %subscription.endpoint()))]
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), NotificationError> {
        let message = self.build_message(subscription, payload)?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("Push service response: {}", status);

        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        classify_status(status, &body)
    }
}

/// 404 and 410 mean the subscription expired or was revoked by the user.
fn classify_status(status: StatusCode, body: &str) -> Result<(), NotificationError> {
    match status.as_u16() {
        200..=299 => Ok(()),
        code @ (404 | 410) => Err(NotificationError::Gone(code)),
        code => Err(NotificationError::SendFailure(format!(
            "HTTP {}: {}",
            code, body
        ))),
    }
}

fn vapid_subject(contact: &str) -> String {
    if contact.starts_with("mailto:") || contact.starts_with("https:") {
        contact.to_string()
    } else {
        format!("mailto:{}", contact)
    }
}

impl From<WebPushError> for NotificationError {
    fn from(err: WebPushError) -> Self {
        NotificationError::SendFailure(format!("Web push error: {:?}", err))
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotificationError::SendFailure("Push service timed out".to_string())
        } else {
            NotificationError::SendFailure(format!("Push request failed: {}", err))
        }
    }
}
