use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::{HeaderMap, HeaderValue};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tower_cookies::Cookie;

use crate::{
    config::{SessionConfig, SessionSettings},
    error::{Error, Result},
    exchange::{self, CookieExchange, ResponseHeaders},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Read from the request cookie, or started empty.
    Loaded,
    Saved,
    Destroyed,
}

/// A request-scoped session.
///
/// Clones share the same data, so a value inserted through one clone is visible through every
/// other. Nothing is written back to the client until [`Session::save`] or
/// [`Session::destroy`] is called.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    data: Mutex<Map<String, Value>>,
    state: Mutex<SessionState>,
    exchange: Arc<dyn CookieExchange>,
    settings: Arc<SessionSettings>,
}

/// Load the session for a request.
///
/// A missing, expired, tampered or orphaned cookie yields an empty session. Configuration
/// errors and unexpected seal engine failures are returned.
pub async fn get_session(
    request: &HeaderMap,
    response: &ResponseHeaders,
    config: &SessionConfig,
) -> Result<Session> {
    let settings = Arc::new(config.resolve()?);
    Session::load(exchange::exchange(request, response), settings).await
}

impl Session {
    pub(crate) async fn load(
        exchange: Arc<dyn CookieExchange>,
        settings: Arc<SessionSettings>,
    ) -> Result<Self> {
        let token = exchange
            .cookie_header()
            .and_then(|header| find_cookie(header, &settings.name));

        let data = match token {
            Some(token) => settings
                .sealer
                .unseal_map(&token)
                .await?
                .unwrap_or_default(),
            None => Map::new(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                data: Mutex::new(data),
                state: Mutex::new(SessionState::Loaded),
                exchange,
                settings,
            }),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.data().get(key).cloned()
    }

    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.insert_value(key, value);
        Ok(())
    }

    /// Returns the previous value, if any.
    pub fn insert_value(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data().insert(key.into(), value)
    }

    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.remove_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    pub fn remove_value(&self, key: &str) -> Option<Value> {
        self.data().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.data().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn clear(&self) {
        self.data().clear();
    }

    /// Snapshot of the session data.
    pub fn to_map(&self) -> Map<String, Value> {
        self.data().clone()
    }

    /// Replace the session data in place: keys missing from `value` are removed, the rest are
    /// overwritten or added. Every clone of this handle observes the result.
    pub fn set(&self, value: Map<String, Value>) {
        let mut data = self.data();
        data.retain(|key, _| value.contains_key(key));
        data.extend(value);
    }

    pub fn state(&self) -> SessionState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Seal the current data and add the session cookie to the response.
    ///
    /// Fails with [`Error::HeadersSent`] once the response headers are out, and with
    /// [`Error::CookieTooLarge`] when the serialized cookie exceeds the size limit. In both cases
    /// no `Set-Cookie` header is added.
    pub async fn save(&self) -> Result<()> {
        if self.inner.exchange.headers_sent() {
            return Err(Error::HeadersSent);
        }

        let settings = &self.inner.settings;
        let data = Value::Object(self.to_map());
        let token = settings.sealer.seal(&data).await?;
        let directive = settings.build_cookie(token).encoded().to_string();

        if directive.len() > settings.max_cookie_bytes {
            tracing::warn!(
                length = directive.len(),
                limit = settings.max_cookie_bytes,
                "sealed session cookie exceeds size limit"
            );
            return Err(Error::CookieTooLarge {
                length: directive.len(),
                limit: settings.max_cookie_bytes,
            });
        }

        self.inner
            .exchange
            .append_set_cookie(HeaderValue::try_from(directive)?);
        self.set_state(SessionState::Saved);
        Ok(())
    }

    /// Clear the data and add an immediately-expiring cookie to the response.
    pub fn destroy(&self) {
        self.clear();

        let directive = self
            .inner
            .settings
            .build_removal_cookie()
            .encoded()
            .to_string();
        match HeaderValue::try_from(directive) {
            Ok(value) => self.inner.exchange.append_set_cookie(value),
            Err(err) => tracing::error!(err = %err, "session removal cookie is not a valid header"),
        }
        self.set_state(SessionState::Destroyed);
    }

    fn set_state(&self, state: SessionState) {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn data(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse_encoded(header)
        .flatten()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}
