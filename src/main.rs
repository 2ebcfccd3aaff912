// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{watcher::Config, Controller},
    Api, Client,
};
use product_bundle_operator::{
    constants::{
        CONTROLLER_NAME, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        REQUEUE_WHEN_NOT_READY_SECS, REQUEUE_WHEN_READY_SECS, TOKIO_WORKER_THREADS,
    },
    context::{Context, RequeueSettings},
    crd::Installation,
    metrics,
    reconcilers::{error_policy, reconcile_installation},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Installs and tears down the product bundle of `Installation` resources
#[derive(Parser, Debug)]
#[command(name = "product-bundle-operator", version, about, long_about = None)]
struct Args {
    /// Namespace to watch for `Installation` resources (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Namespace the operator runs in; holds the product configuration
    #[arg(long, env = "OPERATOR_NAMESPACE")]
    operator_namespace: String,

    /// Port of the metrics and health server
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    metrics_port: u16,

    /// Requeue delay once every product is installed
    #[arg(long, env = "REQUEUE_READY_SECS", default_value_t = REQUEUE_WHEN_READY_SECS)]
    requeue_ready_secs: u64,

    /// Requeue delay while any product is still converging
    #[arg(long, env = "REQUEUE_PENDING_SECS", default_value_t = REQUEUE_WHEN_NOT_READY_SECS)]
    requeue_pending_secs: u64,
}

impl Args {
    fn requeue(&self) -> RequeueSettings {
        RequeueSettings {
            ready: Duration::from_secs(self.requeue_ready_secs),
            pending: Duration::from_secs(self.requeue_pending_secs),
        }
    }

    /// An empty `WATCH_NAMESPACE` means every namespace.
    fn watch_namespace(&self) -> Option<&str> {
        self.watch_namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name(CONTROLLER_NAME)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();
    info!(
        watch_namespace = ?args.watch_namespace(),
        operator_namespace = %args.operator_namespace,
        "Starting product bundle operator"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    let ctx = Arc::new(Context::new(
        client.clone(),
        &args.operator_namespace,
        args.requeue(),
    ));

    let listener = TcpListener::bind((METRICS_SERVER_BIND_ADDRESS, args.metrics_port))
        .await
        .with_context(|| format!("failed to bind metrics server to port {}", args.metrics_port))?;

    tokio::select! {
        result = run_installation_controller(client, ctx, args.watch_namespace().map(str::to_string)) => {
            info!("Installation controller stopped");
            result
        }
        result = serve_metrics(listener) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }
}

/// Run the `Installation` controller until a termination signal arrives.
async fn run_installation_controller(
    client: Client,
    ctx: Arc<Context>,
    watch_namespace: Option<String>,
) -> Result<()> {
    info!("Starting Installation controller");

    let api: Api<Installation> = match &watch_namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_installation, error_policy, ctx)
        .for_each(|result| {
            if let Err(e) = result {
                debug!(error = %e, "Controller reported an error");
            }
            futures::future::ready(())
        })
        .await;

    Ok(())
}

fn metrics_router() -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
}

async fn metrics_handler() -> (StatusCode, String) {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Serve `/metrics` and `/healthz` on `listener`.
async fn serve_metrics(listener: TcpListener) -> Result<()> {
    info!(address = ?listener.local_addr().ok(), "Serving metrics");
    axum::serve(listener, metrics_router())
        .await
        .context("metrics server failed")
}
