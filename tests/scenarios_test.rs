//! End-to-end wiring of `JobSet` + `Engine` against an in-memory `Registry`,
//! exercising a full weighted-mode rollout and the conflict-detection path
//! across several `JobSet::sync` passes.

use canaryctl::adapters::fakes::{
    FakeDeployer, FakeEventSink, FakeKubernetesRouter, FakeMeshRouter, FakeNotifier, FakeObserver,
    FakeRecorder, FakeWebhookCaller, InMemoryRegistry,
};
use canaryctl::crd::{Analysis, Canary, CanaryId, CanarySpec, TargetRef};
use canaryctl::engine::Engine;
use canaryctl::ports::Severity;
use canaryctl::scheduler::JobSet;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;
use std::time::Duration;

fn canary(name: &str, namespace: &str, target: &str, interval: &str, analysis: Analysis) -> Canary {
    Canary {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: CanarySpec {
            target_ref: TargetRef {
                name: target.to_string(),
                selector: None,
            },
            analysis_interval: Some(interval.to_string()),
            analysis,
            skip_analysis: false,
        },
        status: None,
    }
}

fn weighted_analysis() -> Analysis {
    Analysis {
        threshold: 3,
        max_weight: Some(40),
        step_weight: 20,
        iterations: 0,
        r#match: vec![],
        metrics: vec![],
        webhooks: vec![],
    }
}

/// Stands in for the real status-subresource round trip: copies whatever
/// the fake Deployer last persisted for `id` back onto the registry's
/// stored canary, the way a reflector watch would after a real write.
fn bridge_status(registry: &InMemoryRegistry, deployer: &FakeDeployer, id: &CanaryId) {
    if let Some(current) = registry.get(id) {
        let mut updated = (*current).clone();
        updated.status = Some(deployer.status(id));
        registry.insert(updated);
    }
}

#[tokio::test(start_paused = true)]
async fn weighted_canary_runs_to_succeeded_while_a_sibling_conflict_is_reported() {
    let registry = InMemoryRegistry::new();
    let deployer = FakeDeployer::new();
    let mesh_router = FakeMeshRouter::new();
    let observer = FakeObserver::new();
    let recorder = FakeRecorder::new();
    let events = FakeEventSink::new();

    let web_id = CanaryId::new("web", "prod");

    registry.insert(canary("web", "prod", "web", "10s", weighted_analysis()));
    registry.insert(canary("web-a", "prod", "checkout", "10s", weighted_analysis()));
    registry.insert(canary("web-b", "prod", "checkout", "10s", weighted_analysis()));

    let engine = Arc::new(Engine::new(
        Arc::new(registry.clone()),
        Arc::new(deployer.clone()),
        Arc::new(mesh_router.clone()),
        Arc::new(FakeKubernetesRouter),
        Arc::new(observer),
        Arc::new(FakeWebhookCaller::new()),
        Arc::new(recorder.clone()),
        Arc::new(events.clone()),
        Arc::new(FakeNotifier::new()),
    ));

    let mut jobset = JobSet::new(
        Arc::new(registry.clone()),
        engine,
        Arc::new(recorder.clone()),
        Arc::new(events.clone()),
    );

    jobset.sync().await;
    assert_eq!(jobset.job_count(), 3);
    assert_eq!(recorder.total("prod"), Some(3));

    let conflict_warnings = events
        .events()
        .into_iter()
        .filter(|(_, severity, _)| *severity == Severity::Warning)
        .count();
    assert_eq!(
        conflict_warnings, 2,
        "both canaries sharing the 'checkout' target should be warned"
    );

    // Drive the "web" canary through Initialized -> ProgressingStarted ->
    // Advanced(20) -> Promoted -> Succeeded, bridging status after each
    // tick the way a real watch would. The exact tick at which the first
    // `interval` fires relative to `jobset.sync()` isn't pinned down, so
    // poll for the terminal phase instead of counting ticks; stop the
    // instant it's reached (the fixture's `should_advance` stays true, so
    // ticking past Succeeded would immediately start a new rollout).
    let mut reached_succeeded = false;
    for _ in 0..10 {
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        bridge_status(&registry, &deployer, &web_id);
        if deployer.status(&web_id).phase == Some(canaryctl::crd::Phase::Succeeded) {
            reached_succeeded = true;
            break;
        }
    }
    assert!(reached_succeeded, "weighted canary should reach Succeeded within 10 ticks");

    let final_status = deployer.status(&web_id);
    assert_eq!(final_status.canary_weight, 0);

    let scale_calls = deployer.scale_calls();
    assert!(
        scale_calls.iter().any(|(id, replicas)| id == &web_id && *replicas == 0),
        "canary workload should be scaled back to zero after success"
    );

    jobset.sync().await;
    assert_eq!(jobset.job_count(), 3, "resync with unchanged canaries should not duplicate jobs");
}

#[tokio::test(start_paused = true)]
async fn removing_a_canary_stops_its_job_and_drops_it_from_totals() {
    let registry = InMemoryRegistry::new();
    let deployer = FakeDeployer::new();
    let recorder = FakeRecorder::new();
    let events = FakeEventSink::new();

    let id = CanaryId::new("checkout", "prod");
    registry.insert(canary("checkout", "prod", "checkout", "10s", weighted_analysis()));

    let engine = Arc::new(Engine::new(
        Arc::new(registry.clone()),
        Arc::new(deployer.clone()),
        Arc::new(FakeMeshRouter::new()),
        Arc::new(FakeKubernetesRouter),
        Arc::new(FakeObserver::new()),
        Arc::new(FakeWebhookCaller::new()),
        Arc::new(recorder.clone()),
        Arc::new(events.clone()),
        Arc::new(FakeNotifier::new()),
    ));

    let mut jobset = JobSet::new(
        Arc::new(registry.clone()),
        engine,
        Arc::new(recorder.clone()),
        Arc::new(events.clone()),
    );

    jobset.sync().await;
    assert_eq!(jobset.job_count(), 1);
    assert_eq!(recorder.total("prod"), Some(1));

    registry.remove(&id);
    jobset.sync().await;

    assert_eq!(jobset.job_count(), 0, "job for the removed canary should be stopped");
    // A namespace with no remaining canaries is simply never republished;
    // the gauge holds its last value, same as Prometheus counters for any
    // other vanished label set.
    assert_eq!(recorder.total("prod"), Some(1));
}
