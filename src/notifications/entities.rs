use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::gateway::NotificationError;

pub const DEFAULT_TITLE: &str = "Notification";
pub const DEFAULT_TARGET_URL: &str = "/";
pub const DEFAULT_ICON_URL: &str = "/icon-512.png";

/// What the operator asks to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Page opened when the notification is clicked
    pub target_url: String,
    pub icon_url: String,
}

impl Default for NotificationPayload {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: String::new(),
            target_url: DEFAULT_TARGET_URL.to_string(),
            icon_url: DEFAULT_ICON_URL.to_string(),
        }
    }
}

impl NotificationPayload {
    /// The bytes handed to the push gateway, read by the service worker's push listener.
    pub fn to_push_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&PushMessage {
            title: &self.title,
            body: &self.body,
            url: &self.target_url,
            icon: &self.icon_url,
        })
    }
}

/// Body of `POST /notify`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NotifyRequest {
    #[schema(example = "Hello")]
    pub title: Option<String>,
    pub body: Option<String>,
    #[schema(example = "/")]
    pub url: Option<String>,
    #[schema(example = "/icon-512.png")]
    pub icon: Option<String>,
}

impl NotifyRequest {
    /// Picks the string fields out of any JSON value. Fields that are missing
    /// or not strings, and bodies that are not objects, fall back to defaults.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        NotifyRequest {
            title: field("title"),
            body: field("body"),
            url: field("url"),
            icon: field("icon"),
        }
    }
}

impl From<NotifyRequest> for NotificationPayload {
    fn from(request: NotifyRequest) -> Self {
        let defaults = NotificationPayload::default();
        NotificationPayload {
            title: request.title.unwrap_or(defaults.title),
            body: request.body.unwrap_or(defaults.body),
            target_url: request.url.unwrap_or(defaults.target_url),
            icon_url: request.icon.unwrap_or(defaults.icon_url),
        }
    }
}

#[derive(Serialize)]
struct PushMessage<'a> {
    title: &'a str,
    body: &'a str,
    url: &'a str,
    icon: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Gone,
    TransientFailure(String),
}

impl From<Result<(), NotificationError>> for DeliveryOutcome {
    fn from(result: Result<(), NotificationError>) -> Self {
        match result {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(NotificationError::Gone(_)) => DeliveryOutcome::Gone,
            Err(err) => DeliveryOutcome::TransientFailure(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub success_count: usize,
    pub failure_count: usize,
}

impl BroadcastReport {
    pub fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.success_count += 1,
            DeliveryOutcome::Gone | DeliveryOutcome::TransientFailure(_) => {
                self.failure_count += 1
            }
        }
    }
}
