use std::{borrow::Cow, sync::Arc};

use time::Duration;
use tower_cookies::Cookie;

use crate::{
    SameSite,
    error::{Error, Result},
    password::Password,
    seal::{SealEngine, default_engine},
    sealer::Sealer,
};

/// Default session lifetime: 15 days.
pub const DEFAULT_TTL: Duration = Duration::seconds(1_296_000);

/// Subtracted from the ttl when deriving the cookie's Max-Age, so the browser drops the cookie
/// before the seal inside it expires.
pub const TIMESTAMP_SKEW: Duration = Duration::seconds(60);

pub const DEFAULT_MAX_COOKIE_BYTES: usize = 4096;

/// Stand-in for a ttl of zero ("never expires").
const UNBOUNDED_TTL: Duration = Duration::seconds(2_147_483_647);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MaxAge {
    /// Not configured: derived from the ttl.
    Derived,
    /// Explicitly unset: a browser-session cookie and a seal without expiry.
    Unset,
    Explicit(Duration),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) password: Password,
    pub(crate) ttl: Duration,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) max_age: MaxAge,
    pub(crate) max_cookie_bytes: usize,
    pub(crate) engine: Arc<dyn SealEngine>,
}

impl SessionConfig {
    pub fn new<N, P>(name: N, password: P) -> Self
    where
        N: Into<Cow<'static, str>>,
        P: Into<Password>,
    {
        Self {
            name: name.into(),
            password: password.into(),
            ttl: DEFAULT_TTL,
            http_only: true,
            same_site: SameSite::Lax,
            secure: true,
            path: "/".into(),
            domain: None,
            max_age: MaxAge::Derived,
            max_cookie_bytes: DEFAULT_MAX_COOKIE_BYTES,
            engine: default_engine(),
        }
    }

    /// Zero means the session never expires.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    /// Override the cookie's Max-Age.
    ///
    /// `Some(d)` sets Max-Age to `d` minus [`TIMESTAMP_SKEW`] while the seal keeps the
    /// configured ttl. `None` issues a browser-session cookie and seals without expiry.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = match max_age {
            Some(max_age) => MaxAge::Explicit(max_age),
            None => MaxAge::Unset,
        };
        self
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn SealEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate the configuration and compute the per-request settings.
    pub(crate) fn resolve(&self) -> Result<SessionSettings> {
        validate_cookie_name(&self.name)?;
        if self.ttl.is_negative() {
            return Err(Error::configuration("ttl must not be negative"));
        }
        let passwords = self.password.normalize()?;
        let lifetimes = reconcile(self.ttl, self.max_age);

        Ok(SessionSettings {
            name: self.name.clone(),
            sealer: Sealer::from_parts(passwords, lifetimes.seal_ttl, self.engine.clone()),
            cookie_max_age: lifetimes.cookie_max_age,
            http_only: self.http_only,
            same_site: self.same_site,
            secure: self.secure,
            path: self.path.clone(),
            domain: self.domain.clone(),
            max_cookie_bytes: self.max_cookie_bytes,
        })
    }
}

fn validate_cookie_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::configuration("cookie name is required"));
    }
    let invalid = name.bytes().any(|b| {
        b <= b' '
            || b >= 0x7f
            || matches!(
                b,
                b'(' | b')'
                    | b'<'
                    | b'>'
                    | b'@'
                    | b','
                    | b';'
                    | b':'
                    | b'\\'
                    | b'"'
                    | b'/'
                    | b'['
                    | b']'
                    | b'?'
                    | b'='
                    | b'{'
                    | b'}'
            )
    });
    if invalid {
        return Err(Error::configuration(format!(
            "cookie name {name:?} contains characters not allowed in a cookie name"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lifetimes {
    /// `None` seals without expiry.
    pub(crate) seal_ttl: Option<Duration>,
    /// `None` emits a browser-session cookie.
    pub(crate) cookie_max_age: Option<Duration>,
}

/// Derive the seal ttl and the cookie Max-Age from the configured ttl and Max-Age override.
pub(crate) fn reconcile(ttl: Duration, max_age: MaxAge) -> Lifetimes {
    let ttl = if ttl.is_zero() { UNBOUNDED_TTL } else { ttl };

    match max_age {
        MaxAge::Unset => Lifetimes {
            seal_ttl: None,
            cookie_max_age: None,
        },
        // The seal keeps the configured ttl; only the cookie follows the override.
        MaxAge::Explicit(max_age) => Lifetimes {
            seal_ttl: Some(ttl),
            cookie_max_age: Some(max_age.saturating_sub(TIMESTAMP_SKEW)),
        },
        MaxAge::Derived => Lifetimes {
            seal_ttl: Some(ttl),
            cookie_max_age: Some(ttl.saturating_sub(TIMESTAMP_SKEW)),
        },
    }
}

/// Validated configuration, shared by every handle created from it.
#[derive(Debug)]
pub(crate) struct SessionSettings {
    pub(crate) name: Cow<'static, str>,
    pub(crate) sealer: Sealer,
    pub(crate) cookie_max_age: Option<Duration>,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) max_cookie_bytes: usize,
}

impl SessionSettings {
    pub(crate) fn build_cookie(&self, value: String) -> Cookie<'static> {
        self.cookie_with_max_age(value, self.cookie_max_age)
    }

    /// Same name, path and domain as the session cookie, empty value, `Max-Age=0`.
    pub(crate) fn build_removal_cookie(&self) -> Cookie<'static> {
        self.cookie_with_max_age(String::new(), Some(Duration::ZERO))
    }

    fn cookie_with_max_age(&self, value: String, max_age: Option<Duration>) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone());

        if let Some(max_age) = max_age {
            cookie_builder = cookie_builder.max_age(max_age);
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }
}
