use canaryctl::adapters::fakes::{FakeDeployer, FakeKubernetesRouter, FakeMeshRouter};
use canaryctl::adapters::{HttpWebhookCaller, PrometheusObserver, PrometheusRecorder, TracingEventSink, WebhookNotifier};
use canaryctl::engine::Engine;
use canaryctl::registry::ReflectorRegistry;
use canaryctl::scheduler::JobSet;
use canaryctl::server::{
    run_health_server, run_leader_election, shutdown_channel, wait_for_signal, LeaderConfig,
    LeaderState, ReadinessState,
};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default port for health/readiness/metrics endpoints.
const HEALTH_PORT: u16 = 8080;

/// Cadence at which `JobSet::sync` reconciles the registry against the
/// running jobs.
const SYNC_INTERVAL: Duration = Duration::from_secs(10);

fn is_leader_election_enabled() -> bool {
    std::env::var("CANARYCTL_LEADER_ELECTION")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn prometheus_base_url() -> String {
    std::env::var("CANARYCTL_PROMETHEUS_ADDRESS").unwrap_or_else(|_| "http://localhost:9090".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("starting canaryctl progressive delivery scheduler");

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let readiness = ReadinessState::new();
    let leader_state = LeaderState::new();
    let recorder = Arc::new(PrometheusRecorder::new()?);

    let health_readiness = readiness.clone();
    let health_recorder = recorder.clone();
    let health_handle = tokio::spawn(async move {
        if let Err(err) = run_health_server(HEALTH_PORT, health_readiness, health_recorder).await {
            warn!(error = %err, "health server failed");
        }
    });
    info!(port = HEALTH_PORT, "health server task spawned");

    let client = match Client::try_default().await {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to create Kubernetes client");
            health_handle.abort();
            return Err(err.into());
        }
    };
    info!("connected to Kubernetes cluster");

    let leader_election_enabled = is_leader_election_enabled();
    let leader_handle = if leader_election_enabled {
        let leader_client = client.clone();
        let leader_config = LeaderConfig::from_env();
        let leader_state = leader_state.clone();
        let leader_shutdown = shutdown_signal.clone();

        info!(holder_id = %leader_config.holder_id, "leader election enabled");

        Some(tokio::spawn(async move {
            run_leader_election(leader_client, leader_config, leader_state, leader_shutdown).await;
        }))
    } else {
        info!("leader election disabled - running as single instance");
        leader_state.set_leader(true);
        None
    };

    tokio::spawn(wait_for_signal(shutdown_controller.clone()));

    let registry = Arc::new(ReflectorRegistry::spawn(client.clone()));

    // The Deployer, MeshRouter and KubernetesRouter mutation ports have no
    // production adapter in this crate — they stay in-process fakes
    // here, same as in the engine's own tests.
    let engine = Arc::new(Engine::new(
        registry.clone(),
        Arc::new(FakeDeployer::new()),
        Arc::new(FakeMeshRouter::new()),
        Arc::new(FakeKubernetesRouter),
        Arc::new(PrometheusObserver::new(prometheus_base_url())),
        Arc::new(HttpWebhookCaller::new()),
        recorder.clone(),
        Arc::new(TracingEventSink::new()),
        Arc::new(WebhookNotifier::from_env()),
    ));

    let mut jobset = JobSet::new(registry, engine, recorder, Arc::new(TracingEventSink::new()));

    readiness.set_ready();
    info!("scheduler ready, starting sync loop");

    let mut sync_interval = tokio::time::interval(SYNC_INTERVAL);
    let mut shutdown = shutdown_signal;
    loop {
        tokio::select! {
            _ = sync_interval.tick() => {
                jobset.sync().await;
            }
            _ = shutdown.wait() => {
                info!("initiating graceful shutdown");
                readiness.set_not_ready();
                break;
            }
        }
    }

    info!("stopping components");
    if let Some(handle) = leader_handle {
        handle.abort();
    }
    health_handle.abort();

    info!("canaryctl shut down gracefully");
    Ok(())
}
