use std::{env, path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WebserverSettings {
    pub host: String,
    pub port: u16,
}

/// Application server identity. Any of the values may be missing, the server
/// then runs with push delivery disabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VapidSettings {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    /// Contact for push services, sent as the VAPID `sub` claim
    pub mailto: Option<String>,
}

impl VapidSettings {
    pub fn public_key(&self) -> Option<&str> {
        non_empty(&self.public_key)
    }

    pub fn private_key(&self) -> Option<&str> {
        non_empty(&self.private_key)
    }

    pub fn mailto(&self) -> Option<&str> {
        non_empty(&self.mailto)
    }

    /// Public and private key, only when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.public_key()?, self.private_key()?))
    }

    /// Environment names of the values that are not set.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        [
            ("VAPID_PUBLIC_KEY", self.public_key()),
            ("VAPID_PRIVATE_KEY", self.private_key()),
            ("VAPID_MAILTO", self.mailto()),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushSettings {
    /// Upper bound of concurrent requests to push services during a broadcast
    pub max_in_flight: usize,
    pub request_timeout_secs: u64,
    /// How long push services keep an undelivered message
    pub ttl_secs: u32,
}

impl PushSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum DatabaseSettings {
    InMemory,
    Sqlite { path: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub webserver: WebserverSettings,
    #[serde(default)]
    pub vapid: VapidSettings,
    pub push: PushSettings,
    pub database: DatabaseSettings,
    /// Directory with the browser client, `index.html` is the fallback page
    pub static_dir: String,
}

impl Settings {
    /// Loads defaults, then `settings.toml` (or `path`), then `PUSH_DEMO__*`
    /// variables, then the plain `PORT` and `VAPID_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name("settings").required(false),
        };

        let settings = Config::builder()
            .set_default("webserver.host", "0.0.0.0")?
            .set_default("webserver.port", 3000)?
            .set_default("push.max_in_flight", 64)?
            .set_default("push.request_timeout_secs", 10)?
            .set_default("push.ttl_secs", 86400)?
            .set_default("database.type", "inmemory")?
            .set_default("static_dir", "public")?
            .add_source(file)
            .add_source(Environment::with_prefix("PUSH_DEMO").separator("__"))
            .set_override_option("webserver.port", env_value("PORT"))?
            .set_override_option("vapid.public_key", env_value("VAPID_PUBLIC_KEY"))?
            .set_override_option("vapid.private_key", env_value("VAPID_PRIVATE_KEY"))?
            .set_override_option("vapid.mailto", env_value("VAPID_MAILTO"))?
            .build()?;

        settings.try_deserialize()
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
