use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonrpsee::server::{RpcModule, Server};
use tokio::select;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use argus_core::config::RpcConfig;
use argus_core::{CancelToken, LedgerStore, ServeError};

mod error;
mod methods;
mod metrics;

pub use error::Error;
pub use methods::{
    EventEntry, GetEventsResponse, GetHealthResponse, GetLatestLedgerResponse,
    GetTransactionResponse, TransactionStatus,
};

#[derive(Clone)]
pub struct Context<S: LedgerStore, C: CancelToken> {
    pub store: S,
    pub config: Arc<RpcConfig>,
    pub cancel: C,
    pub retention_window: u32,
    pub metrics: metrics::Metrics,
}

/// Per-request cancellation handle: trips when either the server-wide token
/// fires or the request deadline passes.
#[derive(Clone)]
pub struct DeadlineToken<C: CancelToken> {
    inner: C,
    deadline: Instant,
}

impl<C: CancelToken> DeadlineToken<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self {
            inner,
            deadline: Instant::now() + timeout,
        }
    }
}

impl<C: CancelToken> CancelToken for DeadlineToken<C> {
    async fn cancelled(&self) {
        let remaining = self.deadline.saturating_duration_since(Instant::now());

        select! {
            _ = self.inner.cancelled() => (),
            _ = tokio::time::sleep(remaining) => (),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled() || Instant::now() >= self.deadline
    }
}

pub struct Driver;

impl<S: LedgerStore, C: CancelToken> argus_core::Driver<S, C> for Driver {
    type Config = DriverConfig;

    async fn run(config: Self::Config, store: S, cancel: C) -> Result<(), ServeError> {
        let cors_layer = if config.rpc.permissive_cors.unwrap_or_default() {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        };

        let middleware = ServiceBuilder::new().layer(cors_layer);
        let server = Server::builder()
            .set_http_middleware(middleware)
            .build(config.rpc.listen_address)
            .await
            .map_err(ServeError::BindError)?;

        let mut module = RpcModule::new(Context {
            store,
            config: Arc::new(config.rpc.clone()),
            cancel: cancel.clone(),
            retention_window: config.retention_window,
            metrics: metrics::Metrics::new(),
        });

        module
            .register_async_method("getTransaction", |params, context, _| async move {
                let response = methods::get_transaction(params, context.clone()).await;

                track(&context, "getTransaction", &response);

                response
            })
            .map_err(|_| ServeError::Internal("failed to register getTransaction".into()))?;

        module
            .register_async_method("getEvents", |params, context, _| async move {
                let response = methods::get_events(params, context.clone()).await;

                track(&context, "getEvents", &response);

                response
            })
            .map_err(|_| ServeError::Internal("failed to register getEvents".into()))?;

        module
            .register_async_method("getLatestLedger", |params, context, _| async move {
                let response = methods::get_latest_ledger(params, context.clone()).await;

                track(&context, "getLatestLedger", &response);

                response
            })
            .map_err(|_| ServeError::Internal("failed to register getLatestLedger".into()))?;

        module
            .register_method("getHealth", |_, context, _| {
                methods::get_health(context)
            })
            .map_err(|_| ServeError::Internal("failed to register getHealth".into()))?;

        let handle = server.start(module);

        info!(address = %config.rpc.listen_address, "rpc server started");

        select! {
            _ = handle.clone().stopped() => {
                Ok(())
            }
            _ = cancel.cancelled() => {
                info!("exit requested, shutting down rpc");
                let _ = handle.stop(); // Empty result with AlreadyStoppedError, can be ignored.
                Ok(())
            }
        }
    }
}

/// The driver needs the retention window alongside the listener settings to
/// answer health probes.
#[derive(Clone)]
pub struct DriverConfig {
    pub rpc: RpcConfig,
    pub retention_window: u32,
}

fn track<S: LedgerStore, C: CancelToken, T>(
    context: &Context<S, C>,
    method: &str,
    response: &Result<T, Error>,
) {
    match response {
        Ok(_) => context.metrics.track_request(method, 200),
        Err(err) => {
            if !err.is_cancellation() {
                warn!(method, %err, "request failed");
            }

            context.metrics.track_request(method, err.code());
        }
    }
}
