use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use futures::future::BoxFuture;
use sessionkit_core::{Session, SessionHandler};
use sessionkit_util_error::FmtCompact as _;
use tower::Layer;
use tower_service::Service;
use tracing::{debug, warn};

use crate::{LOG_TARGET, SessionConfig, SessionHandle, cookie};

/// Layer wrapping services with [`SessionService`].
#[derive(Clone)]
pub struct SessionLayer {
    handler: Arc<dyn SessionHandler>,
    config: Arc<SessionConfig>,
}

impl SessionLayer {
    pub fn new(handler: Arc<dyn SessionHandler>) -> Self {
        Self {
            handler,
            config: Arc::new(SessionConfig::default()),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            handler: self.handler.clone(),
            config: self.config.clone(),
        }
    }
}

/// Attaches a [`SessionHandle`] to each request and, once the inner service
/// produced a response, emits the session cookie and persists the session.
///
/// If persisting fails the response is replaced with a bare
/// `500 Internal Server Error`.
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    handler: Arc<dyn SessionHandler>,
    config: Arc<SessionConfig>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // the clone is not guaranteed to be ready, keep the one that is
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if cookie::is_upgrade(&req) {
            return Box::pin(inner.call(req));
        }

        let config = self.config.clone();
        let id = cookie::session_id_from_headers(req.headers(), &config.session_name);
        let secure_request = cookie::is_https(&req);

        let session = SessionHandle::new(Session::new(
            self.handler.clone(),
            id,
            config.session_options(),
        ));
        req.extensions_mut().insert(session.clone());

        // armed before the future exists, so dropping it unpolled still closes
        let guard = CloseGuard::new(session.clone());

        Box::pin(async move {
            let mut res = inner.call(req).await?;

            let closed = {
                let mut session = session.lock().await;

                if session.should_send_cookie() {
                    if let Some(id) = session.id() {
                        let value = cookie::set_cookie_value(
                            &config,
                            id,
                            session.is_destroyed(),
                            secure_request,
                        );
                        match HeaderValue::from_str(&value) {
                            Ok(value) => {
                                debug!(target: LOG_TARGET, %id, destroyed = session.is_destroyed(), "Sending session cookie");
                                res.headers_mut().append(SET_COOKIE, value);
                            }
                            Err(err) => {
                                warn!(target: LOG_TARGET, %id, err = %err.fmt_compact(), "Session cookie is not a valid header value");
                            }
                        }
                    }
                }

                session.close().await
            };
            guard.disarm();

            if let Err(err) = closed {
                warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to persist session");
                let mut res = Response::new(ResBody::default());
                *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(res);
            }

            Ok(res)
        })
    }
}

/// Closes the session if the request future is dropped or the inner
/// service fails before the response was handled.
struct CloseGuard {
    session: Option<SessionHandle>,
}

impl CloseGuard {
    fn new(session: SessionHandle) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn disarm(mut self) {
        self.session = None;
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = session.lock().await.close().await {
                        warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to close abandoned session");
                    }
                });
            }
            Err(_) => {
                warn!(target: LOG_TARGET, "No runtime to close abandoned session on");
            }
        }
    }
}
