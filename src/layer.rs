use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{Request, Response};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    config::{SessionConfig, SessionSettings},
    error::Result,
    exchange::{self, ResponseHeaders},
    session::Session,
};

/// Middleware that loads the sealed session for every request and inserts it into the request
/// extensions.
///
/// Cookies written by [`Session::save`] and [`Session::destroy`] are appended to the response
/// once the inner service returns. From then on the response headers count as sent, so a late
/// `save()` fails instead of being silently dropped.
#[derive(Debug, Clone)]
pub struct SessionManagerLayer {
    settings: Arc<SessionSettings>,
}

impl SessionManagerLayer {
    /// Validates the configuration up front.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Ok(Self {
            settings: Arc::new(config.resolve()?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionManager<S> {
    inner: S,
    settings: Arc<SessionSettings>,
}

impl<S> Layer<S> for SessionManagerLayer {
    type Service = SessionManager<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionManager {
            inner,
            settings: self.settings.clone(),
        }
    }
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for SessionManager<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let settings = self.settings.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = ResponseHeaders::tracked();
            let exchange = exchange::exchange(req.headers(), &response);

            let session = match Session::load(exchange, settings).await {
                Ok(session) => session,
                Err(err) => {
                    tracing::error!(err = %err, "sealed session load failed");
                    let mut res = Response::default();
                    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                    return Ok(res);
                }
            };
            req.extensions_mut().insert(session);

            let mut res = inner.call(req).await?;

            response.mark_sent();
            response.drain_into(res.headers_mut());

            Ok(res)
        })
    }
}

#[cfg(feature = "axum")]
mod extract {
    use axum_core::extract::FromRequestParts;
    use http::{StatusCode, request::Parts};

    use crate::session::Session;

    impl<S> FromRequestParts<S> for Session
    where
        S: Send + Sync,
    {
        type Rejection = (StatusCode, &'static str);

        async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
            parts.extensions.get::<Session>().cloned().ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Can't extract session. Is `SessionManagerLayer` enabled?",
            ))
        }
    }
}
