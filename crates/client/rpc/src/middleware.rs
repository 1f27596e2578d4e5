//! JSON-RPC specific middleware.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use governor::clock::{Clock, DefaultClock, QuantaClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};
use jsonrpsee::server::middleware::rpc::RpcServiceT;
use jsonrpsee::types::{ErrorObject, Request};
use jsonrpsee::MethodResponse;

/// Error code of a call rejected by the rate limiter.
pub const RATE_LIMITED_CODE: i32 = -32099;

/// Rate limit middleware
#[derive(Debug, Clone)]
pub struct RateLimit {
    pub(crate) limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    pub(crate) clock: QuantaClock,
}

impl RateLimit {
    /// Allows `max_burst` calls per minute, shared by every connection.
    pub fn new(max_burst: NonZeroU32) -> Self {
        let clock = QuantaClock::default();
        Self { limiter: Arc::new(RateLimiter::direct_with_clock(Quota::per_minute(max_burst), &clock)), clock }
    }
}

const MAX_JITTER: Duration = Duration::from_millis(50);
const MAX_RETRIES: usize = 10;

#[derive(Debug, Clone)]
pub struct RpcMiddlewareLayerRateLimit {
    rate_limit: RateLimit,
}

impl RpcMiddlewareLayerRateLimit {
    pub fn new(n: NonZeroU32) -> Self {
        Self { rate_limit: RateLimit::new(n) }
    }
}

impl<S> tower::Layer<S> for RpcMiddlewareLayerRateLimit {
    type Service = RpcMiddlewareServiceRateLimit<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcMiddlewareServiceRateLimit { inner, rate_limit: self.rate_limit.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct RpcMiddlewareServiceRateLimit<S> {
    inner: S,
    rate_limit: RateLimit,
}

impl<'a, S> RpcServiceT<'a> for RpcMiddlewareServiceRateLimit<S>
where
    S: Send + Sync + Clone + RpcServiceT<'a> + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let inner = self.inner.clone();
        let rate_limit = self.rate_limit.clone();

        async move {
            let jitter = Jitter::up_to(MAX_JITTER);

            // Calls over the quota wait for a free slot, up to MAX_RETRIES times.
            let mut attempts = 0;
            while let Err(rejected) = rate_limit.limiter.check() {
                if attempts >= MAX_RETRIES {
                    tracing::debug!(target: "rpc_calls", "Rate limited {}", req.method_name());
                    return MethodResponse::error(
                        req.id,
                        ErrorObject::owned(RATE_LIMITED_CODE, "RPC rate limit exceeded", None::<()>),
                    );
                }
                tokio::time::sleep(jitter + rejected.wait_time_from(rate_limit.clock.now())).await;
                attempts += 1;
            }

            inner.call(req).await
        }
        .boxed()
    }
}

/// Logs every call with its status, response size and response time on the `rpc_calls` target.
#[derive(Debug, Clone, Default)]
pub struct RpcMiddlewareLayerLogging;

impl<S> tower::Layer<S> for RpcMiddlewareLayerLogging {
    type Service = RpcMiddlewareServiceLogging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcMiddlewareServiceLogging { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RpcMiddlewareServiceLogging<S> {
    inner: S,
}

impl<'a, S> RpcServiceT<'a> for RpcMiddlewareServiceLogging<S>
where
    S: Send + Sync + Clone + RpcServiceT<'a> + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let inner = self.inner.clone();

        async move {
            let now = Instant::now();
            let method = req.method_name().to_string();

            let rp = inner.call(req).await;

            let status = rp.as_error_code().unwrap_or(200);
            let res_len = rp.as_result().len();
            let response_time = now.elapsed();

            tracing::info!(
                target: "rpc_calls",
                method = method,
                status = status,
                res_len = res_len,
                response_time = response_time.as_micros(),
                "{method} {status} {res_len} - {response_time:?}",
            );

            rp
        }
        .boxed()
    }
}
