//! Per-request tracing.
//!
//! [`RequestTraceLayer`] wraps every request in a `request` span that
//! continues any W3C `traceparent` sent by the caller, stores the request's
//! method, path, host and id in a task-local [`RequestContext`] for the
//! [`audit!`](crate::audit) macro, echoes `x-request-id`, and emits a final
//! audit event with the response status.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use opentelemetry::{propagation::Extractor, trace::TraceContextExt};
use tower::{Layer, Service};
use tracing::{Instrument, debug, info_span, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    pub static REQUEST_CONTEXT: RequestContext;
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub endpoint: String,
    pub host: String,
    pub method: String,
    pub request_id: String,
}

impl RequestContext {
    fn from_headers(method: String, endpoint: String, headers: &HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

        Self {
            endpoint,
            method,
            host: header("x-forwarded-host")
                .or_else(|| header("host"))
                .unwrap_or_default()
                .to_string(),
            request_id: header(REQUEST_ID_HEADER).unwrap_or_default().to_string(),
        }
    }
}

/// Runs `f` with the current request's context, or an empty context when
/// called outside a request.
pub fn with_request_info<F, R>(f: F) -> R
where
    F: Fn(&RequestContext) -> R,
{
    REQUEST_CONTEXT.try_with(|ctx| f(ctx)).unwrap_or_else(|_| {
        static EMPTY: RequestContext = RequestContext {
            endpoint: String::new(),
            host: String::new(),
            method: String::new(),
            request_id: String::new(),
        };
        f(&EMPTY)
    })
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RequestTraceService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestTraceService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    // Boxed because instrumenting and scoping change the inner future's type.
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let parent = opentelemetry::global::get_text_map_propagator(|propagator| {
            propagator.extract(&HeaderExtractor(req.headers()))
        });

        let ctx = RequestContext::from_headers(
            req.method().to_string(),
            req.uri().path().to_string(),
            req.headers(),
        );

        let span = info_span!(
            "request",
            method = %ctx.method,
            endpoint = %ctx.endpoint,
            requestId = %ctx.request_id,
        );
        // Only adopt a caller trace that actually carries a remote span.
        if parent.span().span_context().is_valid() {
            if let Err(err) = span.set_parent(parent) {
                warn!(error = ?err, "unable to continue caller trace, starting a new one");
            } else {
                debug!(traceparent = ?req.headers().get("traceparent"), "trace parent set");
            }
        }

        let fut = self.inner.call(req);
        Box::pin(REQUEST_CONTEXT.scope(ctx, async move {
            let mut response = fut.instrument(span).await?;

            with_request_info(|ctx| {
                tracing::info!(
                    audit = true,
                    auditType = "http_request",
                    endpoint = %ctx.endpoint,
                    host = %ctx.host,
                    httpMethod = %ctx.method,
                    requestId = %ctx.request_id,
                    status = response.status().as_u16(),
                    "request to {} finished",
                    ctx.endpoint
                )
            });

            let request_id = with_request_info(|ctx| ctx.request_id.clone());
            if let Ok(value) = HeaderValue::from_str(&request_id)
                && !request_id.is_empty()
            {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            Ok::<_, S::Error>(response)
        }))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestTraceLayer;

impl<S> Layer<S> for RequestTraceLayer {
    type Service = RequestTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTraceService { inner }
    }
}
