//! In-memory test doubles for the workload-mutation ports (Deployer,
//! MeshRouter, KubernetesRouter) and the Registry.
//!
//! These are reference implementations for the engine's own tests and the
//! demo wiring in `main`, not production adapters — a real Deployer/Router
//! is out of this crate's scope.

// Reference-double state lives behind a `Mutex` that's never shared with
// code that can panic while holding it, so a poisoned lock can't happen in
// practice; `.expect` here is simpler than threading a lock-poisoned error
// variant through every port method just for these fakes.
#![allow(clippy::expect_used)]

use crate::crd::{Canary, CanaryId, CanaryStatus, Phase};
use crate::ports::{
    CanaryReadyError, Deployer, DeployerError, EventSink, KubernetesRouter, MeshRouter, Notifier,
    Observer, ObserverError, Recorder, RouterError, Severity, WebhookCaller, WebhookError,
};
use crate::registry::Registry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canary-readiness outcome a [`FakeDeployer`] should report for the next
/// `is_canary_ready` call.
#[derive(Debug, Clone)]
pub enum CanaryReady {
    Ready,
    Retriable(String),
    NotRetriable(String),
}

/// Per-canary knobs for [`FakeDeployer`].
#[derive(Debug, Clone)]
pub struct DeployerFixture {
    pub should_advance: bool,
    pub canary_ready: CanaryReady,
    pub is_new_spec: bool,
    pub has_config_changed: bool,
}

impl Default for DeployerFixture {
    fn default() -> Self {
        Self {
            should_advance: true,
            canary_ready: CanaryReady::Ready,
            is_new_spec: false,
            has_config_changed: false,
        }
    }
}

#[derive(Default)]
struct DeployerState {
    fixtures: HashMap<CanaryId, DeployerFixture>,
    statuses: HashMap<CanaryId, CanaryStatus>,
    scale_calls: Vec<(CanaryId, i32)>,
    promote_calls: Vec<CanaryId>,
}

/// In-memory Deployer double. Tests configure behavior per canary via
/// [`FakeDeployer::set_fixture`] and assert on `scale_calls`/`promote_calls`.
#[derive(Clone, Default)]
pub struct FakeDeployer {
    state: Arc<Mutex<DeployerState>>,
}

impl FakeDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fixture(&self, id: &CanaryId, fixture: DeployerFixture) {
        self.state
            .lock()
            .expect("deployer state lock")
            .fixtures
            .insert(id.clone(), fixture);
    }

    pub fn status(&self, id: &CanaryId) -> CanaryStatus {
        self.state
            .lock()
            .expect("deployer state lock")
            .statuses
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn scale_calls(&self) -> Vec<(CanaryId, i32)> {
        self.state.lock().expect("deployer state lock").scale_calls.clone()
    }

    pub fn promote_calls(&self) -> Vec<CanaryId> {
        self.state
            .lock()
            .expect("deployer state lock")
            .promote_calls
            .clone()
    }

    fn fixture(&self, id: &CanaryId) -> DeployerFixture {
        self.state
            .lock()
            .expect("deployer state lock")
            .fixtures
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn sync(&self, _canary: &Canary) -> Result<(), DeployerError> {
        Ok(())
    }

    async fn should_advance(&self, canary: &Canary) -> Result<bool, DeployerError> {
        Ok(self.fixture(&canary.id()).should_advance)
    }

    async fn is_primary_ready(&self, _canary: &Canary) -> Result<(), DeployerError> {
        Ok(())
    }

    async fn is_canary_ready(&self, canary: &Canary) -> Result<(), CanaryReadyError> {
        match self.fixture(&canary.id()).canary_ready {
            CanaryReady::Ready => Ok(()),
            CanaryReady::Retriable(msg) => Err(CanaryReadyError::Retriable(msg)),
            CanaryReady::NotRetriable(msg) => Err(CanaryReadyError::NotRetriable(msg)),
        }
    }

    async fn promote(&self, canary: &Canary) -> Result<(), DeployerError> {
        self.state
            .lock()
            .expect("deployer state lock")
            .promote_calls
            .push(canary.id());
        Ok(())
    }

    async fn scale(&self, canary: &Canary, replicas: i32) -> Result<(), DeployerError> {
        self.state
            .lock()
            .expect("deployer state lock")
            .scale_calls
            .push((canary.id(), replicas));
        Ok(())
    }

    async fn is_new_spec(&self, canary: &Canary) -> Result<bool, DeployerError> {
        Ok(self.fixture(&canary.id()).is_new_spec)
    }

    async fn has_config_changed(&self, canary: &Canary) -> Result<bool, DeployerError> {
        Ok(self.fixture(&canary.id()).has_config_changed)
    }

    async fn sync_status(
        &self,
        canary: &Canary,
        status: &CanaryStatus,
    ) -> Result<(), DeployerError> {
        self.state
            .lock()
            .expect("deployer state lock")
            .statuses
            .insert(canary.id(), status.clone());
        Ok(())
    }

    async fn set_status_phase(&self, canary: &Canary, phase: Phase) -> Result<(), DeployerError> {
        let mut state = self.state.lock().expect("deployer state lock");
        let entry = state.statuses.entry(canary.id()).or_default();
        entry.phase = Some(phase);
        Ok(())
    }
}

/// In-memory MeshRouter double, tracking the weights last set per canary.
#[derive(Clone, Default)]
pub struct FakeMeshRouter {
    weights: Arc<Mutex<HashMap<CanaryId, (i32, i32)>>>,
    set_routes_calls: Arc<Mutex<Vec<(CanaryId, i32, i32)>>>,
}

impl FakeMeshRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, id: &CanaryId, primary_weight: i32, canary_weight: i32) {
        self.weights
            .lock()
            .expect("router weights lock")
            .insert(id.clone(), (primary_weight, canary_weight));
    }

    pub fn set_routes_calls(&self) -> Vec<(CanaryId, i32, i32)> {
        self.set_routes_calls.lock().expect("router calls lock").clone()
    }
}

#[async_trait]
impl MeshRouter for FakeMeshRouter {
    async fn sync(&self, _canary: &Canary) -> Result<(), RouterError> {
        Ok(())
    }

    async fn get_routes(&self, canary: &Canary) -> Result<(i32, i32), RouterError> {
        Ok(self
            .weights
            .lock()
            .expect("router weights lock")
            .get(&canary.id())
            .copied()
            .unwrap_or((100, 0)))
    }

    async fn set_routes(
        &self,
        canary: &Canary,
        primary_weight: i32,
        canary_weight: i32,
    ) -> Result<(), RouterError> {
        let id = canary.id();
        self.weights
            .lock()
            .expect("router weights lock")
            .insert(id.clone(), (primary_weight, canary_weight));
        self.set_routes_calls
            .lock()
            .expect("router calls lock")
            .push((id, primary_weight, canary_weight));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeKubernetesRouter;

#[async_trait]
impl KubernetesRouter for FakeKubernetesRouter {
    async fn sync(&self, _canary: &Canary) -> Result<(), RouterError> {
        Ok(())
    }
}

/// Configurable Observer double: every call returns the same queued
/// response until [`FakeObserver::set_response`] is called again.
#[derive(Clone)]
pub struct FakeObserver {
    response: Arc<Mutex<Result<f64, ObserverError>>>,
}

impl Default for FakeObserver {
    fn default() -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(100.0))),
        }
    }
}

impl FakeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response(&self, response: Result<f64, ObserverError>) {
        *self.response.lock().expect("observer response lock") = response;
    }

    fn response(&self) -> Result<f64, ObserverError> {
        self.response.lock().expect("observer response lock").clone()
    }
}

#[async_trait]
impl Observer for FakeObserver {
    async fn get_envoy_success_rate(
        &self,
        _target: &str,
        _namespace: &str,
        _name: &str,
        _interval: Duration,
    ) -> Result<f64, ObserverError> {
        self.response()
    }

    async fn get_deployment_counter(
        &self,
        _target: &str,
        _namespace: &str,
        _name: &str,
        _interval: Duration,
    ) -> Result<f64, ObserverError> {
        self.response()
    }

    async fn get_deployment_histogram(
        &self,
        _target: &str,
        _namespace: &str,
        _name: &str,
        _interval: Duration,
    ) -> Result<Duration, ObserverError> {
        self.response().map(Duration::from_secs_f64)
    }

    async fn get_scalar(&self, _query: &str) -> Result<f64, ObserverError> {
        self.response()
    }
}

#[derive(Clone, Default)]
pub struct FakeWebhookCaller {
    fail: Arc<Mutex<Option<String>>>,
}

impl FakeWebhookCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&self, message: Option<&str>) {
        *self.fail.lock().expect("webhook fail lock") = message.map(str::to_string);
    }
}

#[async_trait]
impl WebhookCaller for FakeWebhookCaller {
    async fn call_webhook(
        &self,
        _canary: &CanaryId,
        webhook: &crate::crd::WebhookSpec,
    ) -> Result<(), WebhookError> {
        match self.fail.lock().expect("webhook fail lock").clone() {
            Some(message) => Err(WebhookError::Failed(webhook.name.clone(), message)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeEventSink {
    events: Arc<Mutex<Vec<(CanaryId, Severity, String)>>>,
}

impl FakeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(CanaryId, Severity, String)> {
        self.events.lock().expect("event sink lock").clone()
    }
}

impl EventSink for FakeEventSink {
    fn record(&self, canary: &CanaryId, severity: Severity, message: &str) {
        self.events
            .lock()
            .expect("event sink lock")
            .push((canary.clone(), severity, message.to_string()));
    }
}

#[derive(Clone, Default)]
pub struct FakeNotifier {
    notifications: Arc<Mutex<Vec<(CanaryId, String, bool, bool)>>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(CanaryId, String, bool, bool)> {
        self.notifications.lock().expect("notifier lock").clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, canary: &CanaryId, message: &str, is_init: bool, is_warning: bool) {
        self.notifications.lock().expect("notifier lock").push((
            canary.clone(),
            message.to_string(),
            is_init,
            is_warning,
        ));
    }
}

#[derive(Clone, Default)]
pub struct FakeRecorder {
    totals: Arc<Mutex<HashMap<String, i64>>>,
    weights: Arc<Mutex<HashMap<CanaryId, (i32, i32)>>>,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self, namespace: &str) -> Option<i64> {
        self.totals.lock().expect("recorder totals lock").get(namespace).copied()
    }

    pub fn weight(&self, id: &CanaryId) -> Option<(i32, i32)> {
        self.weights.lock().expect("recorder weights lock").get(id).copied()
    }
}

impl Recorder for FakeRecorder {
    fn set_total(&self, namespace: &str, count: i64) {
        self.totals
            .lock()
            .expect("recorder totals lock")
            .insert(namespace.to_string(), count);
    }

    fn set_weight(&self, canary: &CanaryId, primary_weight: i32, canary_weight: i32) {
        self.weights
            .lock()
            .expect("recorder weights lock")
            .insert(canary.clone(), (primary_weight, canary_weight));
    }

    fn set_status(&self, _canary: &CanaryId, _phase: &str) {}

    fn set_duration(&self, _canary: &CanaryId, _elapsed: Duration) {}
}

/// In-memory [`Registry`] used by scheduler and integration tests.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    canaries: Arc<Mutex<HashMap<CanaryId, Arc<Canary>>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, canary: Canary) {
        let id = canary.id();
        self.canaries
            .lock()
            .expect("registry lock")
            .insert(id, Arc::new(canary));
    }

    pub fn remove(&self, id: &CanaryId) {
        self.canaries.lock().expect("registry lock").remove(id);
    }
}

impl Registry for InMemoryRegistry {
    fn snapshot(&self) -> HashMap<CanaryId, Arc<Canary>> {
        self.canaries.lock().expect("registry lock").clone()
    }
}
