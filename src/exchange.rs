//! The request/response surface a session needs, independent of the framework in use.

use std::{
    fmt::Debug,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use http::{HeaderMap, HeaderValue, header};

pub trait CookieExchange: Debug + Send + Sync + 'static {
    /// The raw `Cookie` request header, if any.
    fn cookie_header(&self) -> Option<&str>;

    /// Add a `Set-Cookie` directive after whatever the response already holds.
    fn append_set_cookie(&self, directive: HeaderValue);

    fn headers_sent(&self) -> bool;
}

/// Outgoing headers collected while a request is handled.
///
/// Clones share the same buffer. A tracked buffer also records whether the response headers
/// have been sent; an untracked one never reports them as sent.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    headers: Arc<Mutex<HeaderMap>>,
    sent: Option<Arc<AtomicBool>>,
}

impl ResponseHeaders {
    /// An untracked buffer, for responses that are only sent once the handler returns them.
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that knows when the response headers have gone out.
    pub fn tracked() -> Self {
        Self {
            headers: Arc::default(),
            sent: Some(Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn tracks_flush(&self) -> bool {
        self.sent.is_some()
    }

    pub fn mark_sent(&self) {
        if let Some(sent) = &self.sent {
            sent.store(true, Ordering::Release);
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent
            .as_ref()
            .is_some_and(|sent| sent.load(Ordering::Acquire))
    }

    pub fn append_set_cookie(&self, value: HeaderValue) {
        self.lock().append(header::SET_COOKIE, value);
    }

    pub fn set_cookies(&self) -> Vec<HeaderValue> {
        self.lock()
            .get_all(header::SET_COOKIE)
            .iter()
            .cloned()
            .collect()
    }

    /// Move every buffered header into `target`, appending to the values it already has.
    pub fn drain_into(&self, target: &mut HeaderMap) {
        let headers = std::mem::take(&mut *self.lock());
        for (name, value) in &headers {
            target.append(name.clone(), value.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeaderMap> {
        self.headers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads every `Cookie` header of a mutable request and enforces the flush check through a
/// tracked [`ResponseHeaders`].
#[derive(Debug)]
pub struct TrackedExchange {
    cookie_header: Option<String>,
    response: ResponseHeaders,
}

impl TrackedExchange {
    pub fn new(request: &HeaderMap, response: ResponseHeaders) -> Self {
        let values: Vec<&str> = request
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        let cookie_header = (!values.is_empty()).then(|| values.join("; "));

        Self {
            cookie_header,
            response,
        }
    }
}

impl CookieExchange for TrackedExchange {
    fn cookie_header(&self) -> Option<&str> {
        self.cookie_header.as_deref()
    }

    fn append_set_cookie(&self, directive: HeaderValue) {
        self.response.append_set_cookie(directive);
    }

    fn headers_sent(&self) -> bool {
        self.response.is_sent()
    }
}

/// Reads an immutable header collection with `get`. The response is a value the caller
/// returns later, so its headers are never already sent.
#[derive(Debug)]
pub struct BufferedExchange {
    request: HeaderMap,
    response: ResponseHeaders,
}

impl BufferedExchange {
    pub fn new(request: &HeaderMap, response: ResponseHeaders) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = request.get(header::COOKIE) {
            headers.insert(header::COOKIE, cookie.clone());
        }

        Self {
            request: headers,
            response,
        }
    }
}

impl CookieExchange for BufferedExchange {
    fn cookie_header(&self) -> Option<&str> {
        self.request
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
    }

    fn append_set_cookie(&self, directive: HeaderValue) {
        self.response.append_set_cookie(directive);
    }

    fn headers_sent(&self) -> bool {
        false
    }
}

/// Pick the exchange matching what the response can report about itself.
pub fn exchange(request: &HeaderMap, response: &ResponseHeaders) -> Arc<dyn CookieExchange> {
    if response.tracks_flush() {
        Arc::new(TrackedExchange::new(request, response.clone()))
    } else {
        Arc::new(BufferedExchange::new(request, response.clone()))
    }
}
