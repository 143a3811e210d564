// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{
        controller::Action,
        watcher::{self, Config, Event},
        Controller, WatchStreamExt,
    },
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storageos_operator::{
    constants::{
        DEFAULT_OPERATOR_NAMESPACE, DEFAULT_REQUEUE_SECS, KIND_NFS_SERVER, KIND_STORAGEOS_CLUSTER,
        KIND_STORAGEOS_JOB, KIND_STORAGEOS_UPGRADE, METRICS_SERVER_BIND_ADDRESS,
        METRICS_SERVER_PATH, METRICS_SERVER_PORT, MIGRATION_TIMEOUT_SECS, TOKIO_WORKER_THREADS,
    },
    context::{Context, OperatorConfig},
    crd::{NFSServer, StorageOSCluster, StorageOSJob, StorageOSUpgrade},
    kube_api::display_name,
    metrics,
    migration,
    reconcilers::{
        reconcile_nfsserver,
        retry::{cleanup_backoff, retry_until_ok},
        ClusterReconciler,
        JobReconciler,
        UpgradeReconciler,
    },
};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] storageos_operator::errors::Error);

#[derive(Parser, Debug)]
#[command(name = "storageos-operator")]
#[command(version, about = "Kubernetes operator for StorageOS clusters and NFS servers")]
struct Args {
    /// Namespace the operator runs in
    #[arg(long, env = "POD_NAMESPACE", default_value = DEFAULT_OPERATOR_NAMESPACE)]
    namespace: String,

    /// Seconds between reconciles of the same object
    #[arg(long, env = "REQUEUE_SECS", default_value_t = DEFAULT_REQUEUE_SECS)]
    requeue_secs: u64,

    /// Update api-manager, scheduler and ingress objects in place
    #[arg(long, env = "ALLOW_UPDATES", default_value_t = false)]
    allow_updates: bool,

    /// Metrics bind address
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    metrics_bind_address: String,

    /// Metrics port
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    metrics_port: u16,
}

/// State shared by every controller.
struct Operator {
    ctx: Context,
    clusters: ClusterReconciler,
    upgrades: UpgradeReconciler,
    jobs: JobReconciler,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(TOKIO_WORKER_THREADS);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name("storageos-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_tracing() {
    // Format: timestamp file:line LEVEL message
    // RUST_LOG sets the filter (default info), RUST_LOG_FORMAT=json switches to JSON output
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

    info!("Starting StorageOS operator");
    debug!(?args, "Parsed arguments");

    let client = Client::try_default().await?;
    let config = OperatorConfig {
        operator_namespace: args.namespace.clone(),
        requeue: Duration::from_secs(args.requeue_secs),
        allow_updates: args.allow_updates,
    };
    let ctx = Context::new(client.clone(), config);

    run_migration(&ctx).await;

    let operator = Arc::new(Operator {
        ctx,
        clusters: ClusterReconciler::new(),
        upgrades: UpgradeReconciler::new(),
        jobs: JobReconciler::new(),
    });

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = serve_metrics(&args.metrics_bind_address, args.metrics_port) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = run_cluster_controller(client.clone(), operator.clone()) => {
            error!("CRITICAL: StorageOSCluster controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("StorageOSCluster controller exited unexpectedly without error")
        }
        result = run_nfsserver_controller(client.clone(), operator.clone()) => {
            error!("CRITICAL: NFSServer controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("NFSServer controller exited unexpectedly without error")
        }
        result = run_upgrade_controller(client.clone(), operator.clone()) => {
            error!("CRITICAL: StorageOSUpgrade controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("StorageOSUpgrade controller exited unexpectedly without error")
        }
        result = run_job_controller(client.clone(), operator.clone()) => {
            error!("CRITICAL: Job controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Job controller exited unexpectedly without error")
        }
        () = watch_deletions(client, operator) => {
            error!("CRITICAL: deletion watchers exited unexpectedly");
            anyhow::bail!("Deletion watchers exited unexpectedly")
        }
    }
}

/// Remove objects left by older releases. Failures are logged and startup continues.
async fn run_migration(ctx: &Context) {
    let timeout = Duration::from_secs(MIGRATION_TIMEOUT_SECS);
    let migrate =
        migration::remove_legacy_webhook(ctx.client.as_ref(), &ctx.config.operator_namespace);

    match tokio::time::timeout(timeout, migrate).await {
        Ok(Ok(())) => info!("Legacy scheduler webhook removed"),
        Ok(Err(e)) => error!(error = %e, "Failed to remove legacy scheduler webhook"),
        Err(_) => error!(
            timeout_secs = MIGRATION_TIMEOUT_SECS,
            "Timed out removing legacy scheduler webhook"
        ),
    }
}

/// Serve Prometheus metrics
async fn serve_metrics(bind_address: &str, port: u16) -> Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    let listener = tokio::net::TcpListener::bind((bind_address, port)).await?;
    info!("Metrics server listening on {bind_address}:{port}{METRICS_SERVER_PATH}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> (StatusCode, String) {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Run the `StorageOSCluster` controller
async fn run_cluster_controller(client: Client, operator: Arc<Operator>) -> Result<()> {
    info!("Starting StorageOSCluster controller");

    let api = Api::<StorageOSCluster>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_cluster_wrapper, error_policy, operator)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `NFSServer` controller
async fn run_nfsserver_controller(client: Client, operator: Arc<Operator>) -> Result<()> {
    info!("Starting NFSServer controller");

    let api = Api::<NFSServer>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_nfsserver_wrapper, error_policy, operator)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `StorageOSUpgrade` controller
async fn run_upgrade_controller(client: Client, operator: Arc<Operator>) -> Result<()> {
    info!("Starting StorageOSUpgrade controller");

    let api = Api::<StorageOSUpgrade>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_upgrade_wrapper, error_policy, operator)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the StorageOS `Job` controller
async fn run_job_controller(client: Client, operator: Arc<Operator>) -> Result<()> {
    info!("Starting Job controller");

    let api = Api::<StorageOSJob>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_job_wrapper, error_policy, operator)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Record the outcome of a reconcile and map it to a requeue.
fn finish(
    kind: &str,
    name: &str,
    started: Instant,
    requeue: Duration,
    result: storageos_operator::errors::Result<()>,
) -> Result<Action, ReconcileError> {
    match result {
        Ok(()) => {
            debug!("Successfully reconciled {kind}: {name}");
            metrics::record_reconciliation_success(kind, started.elapsed());
            Ok(Action::requeue(requeue))
        }
        Err(e) => {
            error!("Failed to reconcile {kind} {name}: {e}");
            metrics::record_reconciliation_error(kind, started.elapsed());
            Err(e.into())
        }
    }
}

/// Reconcile wrapper for `StorageOSCluster`
async fn reconcile_cluster_wrapper(
    cluster: Arc<StorageOSCluster>,
    operator: Arc<Operator>,
) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let namespace = cluster.namespace().unwrap_or_default();
    let name = cluster.name_any();

    let result = operator
        .clusters
        .reconcile(&operator.ctx, &namespace, &name)
        .await;
    finish(
        KIND_STORAGEOS_CLUSTER,
        &name,
        started,
        operator.ctx.config.requeue,
        result,
    )
}

/// Reconcile wrapper for `NFSServer`
async fn reconcile_nfsserver_wrapper(
    server: Arc<NFSServer>,
    operator: Arc<Operator>,
) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let result = reconcile_nfsserver(&operator.ctx, &server).await;
    finish(
        KIND_NFS_SERVER,
        &server.name_any(),
        started,
        operator.ctx.config.requeue,
        result,
    )
}

/// Reconcile wrapper for `StorageOSUpgrade`
async fn reconcile_upgrade_wrapper(
    upgrade: Arc<StorageOSUpgrade>,
    operator: Arc<Operator>,
) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let namespace = upgrade.namespace().unwrap_or_default();
    let name = upgrade.name_any();

    let result = operator
        .upgrades
        .reconcile(&operator.ctx, &namespace, &name)
        .await;
    finish(
        KIND_STORAGEOS_UPGRADE,
        &name,
        started,
        operator.ctx.config.requeue,
        result,
    )
}

/// Reconcile wrapper for StorageOS `Job`
async fn reconcile_job_wrapper(
    job: Arc<StorageOSJob>,
    operator: Arc<Operator>,
) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let namespace = job.namespace().unwrap_or_default();
    let name = job.name_any();

    let result = operator.jobs.reconcile(&operator.ctx, &namespace, &name).await;
    finish(KIND_STORAGEOS_JOB, &name, started, operator.ctx.config.requeue, result)
}

/// Error policy for all controllers
fn error_policy(
    _resource: Arc<impl Debug>,
    _err: &ReconcileError,
    operator: Arc<Operator>,
) -> Action {
    Action::requeue(operator.ctx.config.requeue)
}

/// Forward delete events to the reconcilers that track an active resource.
///
/// Controllers do not reconcile objects that are already gone, so these
/// watchers run the reconcilers once more after a delete to tear down.
async fn watch_deletions(client: Client, operator: Arc<Operator>) {
    let clusters = {
        let operator = operator.clone();
        on_delete(
            Api::<StorageOSCluster>::all(client.clone()),
            move |namespace, name| {
                let operator = operator.clone();
                async move {
                    operator
                        .clusters
                        .reconcile(&operator.ctx, &namespace, &name)
                        .await
                }
            },
        )
    };
    let upgrades = {
        let operator = operator.clone();
        on_delete(
            Api::<StorageOSUpgrade>::all(client.clone()),
            move |namespace, name| {
                let operator = operator.clone();
                async move {
                    operator
                        .upgrades
                        .reconcile(&operator.ctx, &namespace, &name)
                        .await
                }
            },
        )
    };
    let jobs = on_delete(Api::<StorageOSJob>::all(client), move |namespace, name| {
        let operator = operator.clone();
        async move {
            operator
                .jobs
                .reconcile(&operator.ctx, &namespace, &name)
                .await
        }
    });

    tokio::join!(clusters, upgrades, jobs);
}

/// Run `handler` for every deleted object, retrying in the background until
/// it succeeds.
async fn on_delete<K, F, Fut>(api: Api<K>, handler: F)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    F: Fn(String, String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = storageos_operator::errors::Result<()>> + Send + 'static,
{
    let mut stream = watcher::watcher(api, Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Delete(object)) => {
                let namespace = object.namespace().unwrap_or_default();
                let name = object.name_any();
                debug!(namespace = %namespace, name = %name, "Object deleted");
                let handler = handler.clone();
                tokio::spawn(async move {
                    let operation =
                        format!("clean up {}", display_name(Some(namespace.as_str()), &name));
                    retry_until_ok(
                        cleanup_backoff(),
                        || handler(namespace.clone(), name.clone()),
                        &operation,
                    )
                    .await;
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Watch error: {e}"),
        }
    }
}
