//! Service trait and the monitor which drives services to completion.
//!
//! Every long-running part of the node (the RPC server, the indexer) is a [Service]. Services are registered with
//! a [ServiceMonitor], which starts them, handles `SIGINT` and `SIGTERM`, and returns once all of them have shut
//! down. Shutdown is cooperative: services are expected to watch their [ServiceContext] and return once it is
//! cancelled. A service which does not return within [SERVICE_GRACE_PERIOD] is dropped.
use anyhow::Context;
use futures::Future;
use std::{fmt::Display, panic, time::Duration};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Maximum time a service is given to shut down after cancellation.
pub const SERVICE_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EthaneServiceId {
    Monitor,
    Rpc,
    Indexer,
}

impl Display for EthaneServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Monitor => "monitor",
                Self::Rpc => "rpc",
                Self::Indexer => "indexer",
            }
        )
    }
}

/// Allows a [Service] to identify itself
pub trait ServiceId {
    fn svc_id(&self) -> EthaneServiceId;
}

impl ServiceId for EthaneServiceId {
    fn svc_id(&self) -> EthaneServiceId {
        *self
    }
}

/// Cancellation context associated to a Service.
///
/// Services created with [ServiceContext::child] share the _global_ token of their parent and get a new _local_
/// token. Cancelling globally stops every service; cancelling locally only stops the service and its own children.
#[derive(Clone)]
pub struct ServiceContext {
    token_global: CancellationToken,
    token_local: Option<CancellationToken>,
    id: EthaneServiceId,
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self { token_global: CancellationToken::new(), token_local: None, id: EthaneServiceId::Monitor }
    }
}

impl ServiceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops all services under the same global context scope.
    pub fn cancel_global(&self) {
        tracing::info!("🔌 Gracefully shutting down");
        self.token_global.cancel();
    }

    /// Stops all services under the same local context scope.
    pub fn cancel_local(&self) {
        self.token_local.as_ref().unwrap_or(&self.token_global).cancel();
    }

    /// Completes once this context is cancelled, either locally or globally.
    pub async fn cancelled(&self) {
        let token_local = self.token_local.as_ref().unwrap_or(&self.token_global);
        tokio::select! {
            _ = self.token_global.cancelled() => {},
            _ = token_local.cancelled() => {},
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token_global.is_cancelled() || self.token_local.as_ref().map(|t| t.is_cancelled()).unwrap_or(false)
    }

    /// Runs a [Future] until the service associated to this context is cancelled.
    ///
    /// The future must be cancel-safe: it can be dropped at any await point.
    ///
    /// # Returns
    ///
    /// The return value of the future wrapped in [Some], or [None] if the service was cancelled.
    pub async fn run_until_cancelled<T, F>(&self, f: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            res = f => Some(res),
            _ = self.cancelled() => None,
        }
    }

    pub fn id(&self) -> EthaneServiceId {
        self.id
    }

    pub fn with_id(mut self, id: impl ServiceId) -> Self {
        self.id = id.svc_id();
        self
    }

    /// Creates a new context in a child local scope.
    pub fn child(&self) -> Self {
        let token_local = self.token_local.as_ref().unwrap_or(&self.token_global).child_token();
        Self { token_local: Some(token_local), ..self.clone() }
    }
}

#[async_trait::async_trait]
pub trait Service: 'static + Send + Sync + ServiceId {
    /// Default impl does not start any task.
    async fn start<'a>(&mut self, _runner: ServiceRunner<'a>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Service for Box<dyn Service> {
    async fn start<'a>(&mut self, runner: ServiceRunner<'a>) -> anyhow::Result<()> {
        self.as_mut().start(runner).await
    }
}

impl ServiceId for Box<dyn Service> {
    fn svc_id(&self) -> EthaneServiceId {
        self.as_ref().svc_id()
    }
}

/// Wrapper around a [JoinSet] and a [ServiceContext], used to enforce the shutdown behavior of services started
/// with [ServiceRunner::service_loop].
pub struct ServiceRunner<'a> {
    ctx: ServiceContext,
    join_set: &'a mut JoinSet<anyhow::Result<EthaneServiceId>>,
}

impl<'a> ServiceRunner<'a> {
    fn new(ctx: ServiceContext, join_set: &'a mut JoinSet<anyhow::Result<EthaneServiceId>>) -> Self {
        Self { ctx, join_set }
    }

    /// The main loop of a [Service].
    ///
    /// The future passed to this function should complete _only once the service completes or is cancelled_.
    pub fn service_loop<F, E>(self, runner: impl FnOnce(ServiceContext) -> F + Send + 'static)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + Send,
    {
        let Self { ctx, join_set } = self;
        join_set.spawn(async move {
            let id = ctx.id();
            if id != EthaneServiceId::Monitor {
                tracing::debug!("Starting service {id}");
            }

            let ctx1 = ctx.clone();
            tokio::select! {
                res = runner(ctx) => res.map_err(Into::into)?,
                _ = Self::stopper(ctx1, id) => {},
            }

            if id != EthaneServiceId::Monitor {
                tracing::debug!("Shutting down service {id}");
            }

            Ok(id)
        });
    }

    async fn stopper(ctx: ServiceContext, id: EthaneServiceId) {
        ctx.cancelled().await;
        tokio::time::sleep(SERVICE_GRACE_PERIOD).await;

        tracing::warn!("⚠️  Forcefully shutting down service: {id}");
    }
}

/// Orchestrates the execution of the node's [Service]s.
///
/// Services are started in registration order. The monitor returns once every service has run to completion, or
/// with the first error a service returns, after cancelling the others.
#[derive(Default)]
pub struct ServiceMonitor {
    services: Vec<Box<dyn Service>>,
    join_set: JoinSet<anyhow::Result<EthaneServiceId>>,
    ctx: ServiceContext,
}

impl ServiceMonitor {
    pub fn with(mut self, svc: impl Service) -> anyhow::Result<Self> {
        let id = svc.svc_id();
        if self.services.iter().any(|s| s.svc_id() == id) {
            anyhow::bail!("Service {id} has already been added");
        }
        self.services.push(Box::new(svc));
        Ok(self)
    }

    /// A handle on the root context, which can be used to cancel every service.
    pub fn ctx(&self) -> ServiceContext {
        self.ctx.clone()
    }

    pub async fn start(mut self) -> anyhow::Result<()> {
        let ctx = self.ctx.clone();
        let mut running = Vec::with_capacity(self.services.len());

        for svc in self.services.iter_mut() {
            let id = svc.svc_id();
            let runner = ServiceRunner::new(ctx.child().with_id(id), &mut self.join_set);
            svc.start(runner).await.with_context(|| format!("Starting service {id}"))?;
            running.push(id);
        }

        // SIGINT & SIGTERM
        let signals = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                let sigint = tokio::signal::ctrl_c();
                let sigterm = async {
                    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(mut signal) => signal.recv().await,
                        Err(_) => core::future::pending().await, // SIGTERM not supported
                    }
                };
                tokio::select! {
                    _ = sigint => {},
                    _ = sigterm => {},
                    _ = ctx.cancelled() => return,
                };
                ctx.cancel_global();
            }
        });

        tracing::debug!("Running services: {running:?}");
        let mut outcome = Ok(());
        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok(Ok(id)) => {
                    tracing::debug!("Service {id} has shut down");
                    running.retain(|s| *s != id);
                }
                Ok(Err(err)) => {
                    tracing::error!("❗ Service failed: {err:#}");
                    ctx.cancel_global();
                    if outcome.is_ok() {
                        outcome = Err(err);
                    }
                }
                Err(panic_error) if panic_error.is_panic() => {
                    // bubble up panics too
                    panic::resume_unwind(panic_error.into_panic());
                }
                Err(_task_cancelled_error) => {}
            }
        }

        signals.abort();
        outcome
    }
}
