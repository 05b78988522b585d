use serde::Deserialize;
use serde_json::{Map, Value};
use sha3::{Digest, Sha3_256};
use utoipa::ToSchema;

use super::error::SubscriptionError;

/// A browser push subscription as produced by `PushManager.subscribe()`.
///
/// The descriptor is kept verbatim; only `endpoint` is checked on the way in
/// and the encryption keys are read on the way out. Two subscriptions are the
/// same subscription when their canonical JSON is equal.
#[derive(Debug, Clone)]
pub struct PushSubscription {
    descriptor: Value,
    canonical: String,
    id: String,
}

/// Client keys needed to encrypt a payload for a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionKeys<'a> {
    pub p256dh: &'a str,
    pub auth: &'a str,
}

impl PushSubscription {
    pub fn try_from_value(descriptor: Value) -> Result<Self, SubscriptionError> {
        let has_endpoint = descriptor
            .get("endpoint")
            .and_then(Value::as_str)
            .is_some_and(|endpoint| !endpoint.is_empty());
        if !has_endpoint {
            return Err(SubscriptionError::InvalidSubscription);
        }

        let canonical = canonicalize(&descriptor).to_string();
        let id = hex::encode(Sha3_256::digest(canonical.as_bytes()));

        Ok(Self {
            descriptor,
            canonical,
            id,
        })
    }

    /// Hex SHA3-256 of the canonical JSON; the storage key.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn canonical_json(&self) -> &str {
        &self.canonical
    }

    pub fn endpoint(&self) -> &str {
        self.descriptor
            .get("endpoint")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn keys(&self) -> Option<SubscriptionKeys<'_>> {
        let keys = self.descriptor.get("keys")?;
        Some(SubscriptionKeys {
            p256dh: keys.get("p256dh")?.as_str()?,
            auth: keys.get("auth")?.as_str()?,
        })
    }
}

impl PartialEq for PushSubscription {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for PushSubscription {}

/// Rebuilds objects with their keys in sorted order, recursively.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Shape of the descriptor sent by browsers. Only used for API documentation,
/// the server accepts any JSON object with an `endpoint`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct SubscriptionDescriptorSchema {
    /// Push service URL
    #[schema(example = "https://fcm.googleapis.com/fcm/send/abc123")]
    pub endpoint: String,
    pub expiration_time: Option<f64>,
    pub keys: SubscriptionKeysSchema,
}

#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct SubscriptionKeysSchema {
    /// Client P-256 ECDH public key (base64url)
    pub p256dh: String,
    /// Client auth secret (base64url)
    pub auth: String,
}
