//! Seal engine seam.
//!
//! A seal engine turns a JSON value into an authenticated, encrypted string and back. The
//! session layer only ever talks to [`SealEngine`]; [`IronSeal`] is the implementation used by
//! default.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use time::Duration;

use crate::{
    error::{Error, Result},
    password::{PasswordMap, Secret},
};

mod iron;

pub use iron::IronSeal;

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("Expired seal")]
    Expired,

    #[error("Bad hmac value")]
    BadHmac,

    #[error("Cannot find password: {0}")]
    UnknownPassword(String),

    #[error("Incorrect number of sealed components")]
    ComponentCount,

    #[error("Wrong mac prefix")]
    WrongPrefix,

    #[error("Invalid expiration")]
    InvalidExpiration,

    #[error("Invalid key material")]
    Key,

    #[error("Failed to decrypt sealed payload")]
    Decrypt,

    #[error("Invalid sealed encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Invalid sealed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl SealError {
    /// Expected validation failures: the token expired, was tampered with, names a password id
    /// that is no longer registered, or is not a seal at all. These degrade to an empty session.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::BadHmac | Self::UnknownPassword(_) | Self::ComponentCount
        )
    }
}

/// Authenticated-encryption primitive consumed by the session layer.
///
/// `ttl` of `None` produces a seal without an expiry.
#[async_trait]
pub trait SealEngine: Debug + Send + Sync + 'static {
    /// Short identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Whether the engine can run in the current environment.
    fn is_available(&self) -> bool {
        true
    }

    async fn seal(
        &self,
        data: &Value,
        password_id: u32,
        secret: &Secret,
        ttl: Option<Duration>,
    ) -> Result<String, SealError>;

    async fn unseal(
        &self,
        sealed: &str,
        passwords: &PasswordMap,
        ttl: Option<Duration>,
    ) -> Result<Value, SealError>;
}

/// Picks the first available engine from an ordered list of candidates.
pub fn select_engine<I>(candidates: I) -> Result<Arc<dyn SealEngine>>
where
    I: IntoIterator<Item = Arc<dyn SealEngine>>,
{
    let engine = candidates
        .into_iter()
        .find(|engine| engine.is_available())
        .ok_or(Error::NoSealEngine)?;
    tracing::debug!(engine = engine.name(), "seal engine selected");
    Ok(engine)
}

pub fn default_engine() -> Arc<dyn SealEngine> {
    Arc::new(IronSeal::default())
}
