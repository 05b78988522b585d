//! VAPID application server keys (RFC 8292).
//!
//! Keys travel as base64url without padding, the format browsers accept as
//! `applicationServerKey` and the `web-push` crate accepts for signing: the
//! public key is the 65-byte uncompressed SEC1 point, the private key the raw
//! 32-byte P-256 scalar.

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;

#[derive(Debug, Clone)]
pub struct VapidKeys {
    public_key_b64: String,
    private_key_b64: String,
}

impl VapidKeys {
    pub fn generate() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_bytes = signing_key.verifying_key().to_encoded_point(false);

        Ok(Self {
            public_key_b64: BASE64URL.encode(public_bytes.as_bytes()),
            private_key_b64: BASE64URL.encode(signing_key.to_bytes().as_slice()),
        })
    }

    /// Validates configured keys. Both must decode, the private scalar must
    /// be on the curve and the public key must belong to it.
    pub fn from_base64url(public_key_b64: &str, private_key_b64: &str) -> Result<Self> {
        let public_key_b64 = public_key_b64.trim_end_matches('=');
        let private_key_b64 = private_key_b64.trim_end_matches('=');

        let pub_bytes = BASE64URL
            .decode(public_key_b64)
            .context("Invalid base64url for VAPID public key")?;
        anyhow::ensure!(
            pub_bytes.len() == 65 && pub_bytes[0] == 0x04,
            "VAPID public key must be a 65-byte uncompressed P-256 point"
        );

        let priv_bytes = BASE64URL
            .decode(private_key_b64)
            .context("Invalid base64url for VAPID private key")?;
        anyhow::ensure!(
            priv_bytes.len() == 32,
            "VAPID private key must be a 32-byte P-256 scalar, got {} bytes",
            priv_bytes.len()
        );
        let signing_key = SigningKey::from_slice(&priv_bytes)
            .context("VAPID private key is not a valid P-256 scalar")?;

        let derived = signing_key.verifying_key().to_encoded_point(false);
        anyhow::ensure!(
            derived.as_bytes() == pub_bytes.as_slice(),
            "VAPID public key does not match the private key"
        );

        Ok(Self {
            public_key_b64: public_key_b64.to_string(),
            private_key_b64: private_key_b64.to_string(),
        })
    }

    pub fn public_key_base64url(&self) -> &str {
        &self.public_key_b64
    }

    pub fn private_key_base64url(&self) -> &str {
        &self.private_key_b64
    }
}
