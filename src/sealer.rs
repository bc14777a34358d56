use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use time::Duration;

use crate::{
    config::DEFAULT_TTL,
    error::Result,
    format::{self, CURRENT_VERSION},
    password::{Password, PasswordMap},
    seal::{SealEngine, default_engine},
};

/// Seals arbitrary serializable data into a versioned token, outside of any cookie.
///
/// Useful for magic links and similar one-off tokens that share the session passwords.
#[derive(Debug, Clone)]
pub struct Sealer {
    passwords: PasswordMap,
    ttl: Option<Duration>,
    engine: Arc<dyn SealEngine>,
}

impl Sealer {
    pub fn new(password: impl Into<Password>) -> Result<Self> {
        Ok(Self::from_parts(
            password.into().normalize()?,
            Some(DEFAULT_TTL),
            default_engine(),
        ))
    }

    pub(crate) fn from_parts(
        passwords: PasswordMap,
        ttl: Option<Duration>,
        engine: Arc<dyn SealEngine>,
    ) -> Self {
        Self {
            passwords,
            ttl,
            engine,
        }
    }

    /// A zero ttl seals without expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn SealEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn passwords(&self) -> &PasswordMap {
        &self.passwords
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Seal `data` under the newest password and tag it with the current format version.
    pub async fn seal<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let (id, secret) = self.passwords.current();
        let raw = self.engine.seal(&value, id, secret, self.ttl).await?;
        Ok(format::encode_token(&raw, CURRENT_VERSION))
    }

    /// Unseal a token produced by [`Sealer::seal`] (or by the legacy format).
    ///
    /// Returns `Ok(None)` when the token is expired, tampered with, sealed under a password id
    /// that is no longer registered, or malformed.
    pub async fn unseal<T: DeserializeOwned>(&self, token: &str) -> Result<Option<T>> {
        match self.unseal_map(token).await? {
            Some(map) => Ok(Some(serde_json::from_value(Value::Object(map))?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn unseal_map(&self, token: &str) -> Result<Option<Map<String, Value>>> {
        let decoded = format::decode_token(token);
        match self
            .engine
            .unseal(decoded.raw, &self.passwords, self.ttl)
            .await
        {
            Ok(payload) => Ok(Some(format::interpret_payload(payload, decoded.version))),
            Err(err) if err.is_soft() => {
                tracing::debug!(err = %err, engine = self.engine.name(), "sealed token rejected");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
