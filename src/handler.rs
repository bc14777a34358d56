//! Session bindings for code that wraps one handler at a time instead of installing a layer.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use http::{Request, Response, request::Parts};

use crate::{
    config::SessionConfig,
    error::{Error, Result},
    exchange::ResponseHeaders,
    session::{Session, get_session},
};

type ConfigFuture = Pin<Box<dyn Future<Output = Result<SessionConfig>> + Send>>;

/// Where a wrapped handler gets its session configuration from.
#[derive(Clone)]
pub enum ConfigSource {
    Static(SessionConfig),
    /// Computed for each request from the request and the response headers being built, e.g.
    /// to pick a cookie name per tenant.
    PerRequest(Arc<dyn Fn(&Parts, &ResponseHeaders) -> ConfigFuture + Send + Sync>),
}

impl ConfigSource {
    pub fn per_request<F, Fut>(f: F) -> Self
    where
        F: Fn(&Parts, &ResponseHeaders) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SessionConfig>> + Send + 'static,
    {
        Self::PerRequest(Arc::new(
            move |parts: &Parts, response: &ResponseHeaders| -> ConfigFuture {
                Box::pin(f(parts, response))
            },
        ))
    }

    async fn config(&self, parts: &Parts, response: &ResponseHeaders) -> Result<SessionConfig> {
        match self {
            Self::Static(config) => Ok(config.clone()),
            Self::PerRequest(f) => f(parts, response).await,
        }
    }
}

impl From<SessionConfig> for ConfigSource {
    fn from(config: SessionConfig) -> Self {
        Self::Static(config)
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(config) => f.debug_tuple("Static").field(config).finish(),
            Self::PerRequest(_) => f.write_str("PerRequest(..)"),
        }
    }
}

/// Wrap a request handler so it finds a [`Session`] in the request extensions.
///
/// Session cookies are appended to the response the handler returns. Errors while loading the
/// session are returned through the handler's own error type.
pub fn with_session<H>(handler: H, source: impl Into<ConfigSource>) -> SessionHandler<H> {
    SessionHandler {
        handler,
        source: source.into(),
    }
}

#[derive(Debug, Clone)]
pub struct SessionHandler<H> {
    handler: H,
    source: ConfigSource,
}

impl<H> SessionHandler<H> {
    pub async fn call<B, Fut, ResBody, E>(&self, req: Request<B>) -> Result<Response<ResBody>, E>
    where
        H: Fn(Request<B>) -> Fut,
        Fut: Future<Output = Result<Response<ResBody>, E>>,
        E: From<Error>,
    {
        let (mut parts, body) = req.into_parts();
        let response = ResponseHeaders::new();
        let config = self.source.config(&parts, &response).await?;
        let session = get_session(&parts.headers, &response, &config).await?;
        parts.extensions.insert(session);

        let mut res = (self.handler)(Request::from_parts(parts, body)).await?;
        response.drain_into(res.headers_mut());
        Ok(res)
    }
}

/// What a render-time handler receives: the request plus the response headers it may write to.
#[derive(Debug)]
pub struct RenderContext {
    pub request: Parts,
    pub response: ResponseHeaders,
}

impl RenderContext {
    pub fn new(request: Parts, response: ResponseHeaders) -> Self {
        Self { request, response }
    }

    pub fn session(&self) -> Option<Session> {
        self.request.extensions.get::<Session>().cloned()
    }
}

/// Wrap a render-time handler so its context carries a [`Session`].
///
/// Session cookies land in `context.response`; the caller keeps a clone of that buffer and
/// copies it onto the real response.
pub fn with_session_render<H>(handler: H, source: impl Into<ConfigSource>) -> RenderHandler<H> {
    RenderHandler {
        handler,
        source: source.into(),
    }
}

#[derive(Debug, Clone)]
pub struct RenderHandler<H> {
    handler: H,
    source: ConfigSource,
}

impl<H> RenderHandler<H> {
    pub async fn call<Fut, T, E>(&self, mut context: RenderContext) -> Result<T, E>
    where
        H: Fn(RenderContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Error>,
    {
        let config = self
            .source
            .config(&context.request, &context.response)
            .await?;
        let session = get_session(&context.request.headers, &context.response, &config).await?;
        context.request.extensions.insert(session);

        (self.handler)(context).await
    }
}
