use super::*;
use crate::adapters::fakes::{FakeEventSink, FakeObserver, FakeWebhookCaller};
use crate::crd::{Analysis, Canary, CanarySpec, MetricCheck, TargetRef, WebhookSpec};
use crate::ports::{ObserverError, Severity};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn canary_with_metrics(metrics: Vec<MetricCheck>) -> Canary {
    Canary {
        metadata: ObjectMeta {
            name: Some("front".to_string()),
            namespace: Some("prod".to_string()),
            ..Default::default()
        },
        spec: CanarySpec {
            target_ref: TargetRef {
                name: "front".to_string(),
                selector: None,
            },
            analysis_interval: None,
            analysis: Analysis {
                threshold: 5,
                max_weight: None,
                step_weight: 10,
                iterations: 0,
                r#match: vec![],
                metrics,
                webhooks: vec![],
            },
            skip_analysis: false,
        },
        status: None,
    }
}

fn success_rate_check(threshold: f64) -> MetricCheck {
    MetricCheck {
        name: ENVOY_SUCCESS_RATE.to_string(),
        query: None,
        threshold,
        interval: None,
    }
}

fn analyser(observer: FakeObserver, webhooks: FakeWebhookCaller, events: FakeEventSink) -> Analyser {
    Analyser::new(Arc::new(observer), Arc::new(webhooks), Arc::new(events))
}

#[tokio::test]
async fn analyze_passes_when_every_metric_clears_threshold() {
    let observer = FakeObserver::new();
    observer.set_response(Ok(99.5));
    let canary = canary_with_metrics(vec![success_rate_check(99.0)]);

    let result = analyser(observer, FakeWebhookCaller::new(), FakeEventSink::new())
        .analyze(&canary)
        .await;

    assert!(result);
}

#[tokio::test]
async fn analyze_fails_and_records_warning_when_metric_below_threshold() {
    let observer = FakeObserver::new();
    observer.set_response(Ok(80.0));
    let events = FakeEventSink::new();
    let canary = canary_with_metrics(vec![success_rate_check(99.0)]);

    let result = analyser(observer, FakeWebhookCaller::new(), events.clone())
        .analyze(&canary)
        .await;

    assert!(!result);
    let recorded = events.events();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].1, Severity::Warning);
    assert!(recorded[0].2.contains("check failed"));
}

#[tokio::test]
async fn analyze_treats_no_data_as_not_receiving_traffic() {
    let observer = FakeObserver::new();
    observer.set_response(Err(ObserverError::NoData));
    let events = FakeEventSink::new();
    let canary = canary_with_metrics(vec![success_rate_check(99.0)]);

    let result = analyser(observer, FakeWebhookCaller::new(), events.clone())
        .analyze(&canary)
        .await;

    assert!(!result);
    assert!(events.events()[0].2.contains("probably not receiving traffic"));
}

#[tokio::test]
async fn analyze_records_error_severity_on_http_failure() {
    let observer = FakeObserver::new();
    observer.set_response(Err(ObserverError::Http("connection refused".to_string())));
    let events = FakeEventSink::new();
    let canary = canary_with_metrics(vec![success_rate_check(99.0)]);

    let result = analyser(observer, FakeWebhookCaller::new(), events.clone())
        .analyze(&canary)
        .await;

    assert!(!result);
    assert_eq!(events.events()[0].1, Severity::Error);
}

#[tokio::test]
async fn analyze_uses_ad_hoc_query_when_metric_has_one() {
    let observer = FakeObserver::new();
    observer.set_response(Ok(2.0));
    let canary = canary_with_metrics(vec![MetricCheck {
        name: "error-rate".to_string(),
        query: Some("sum(rate(http_requests_total{code=~\"5..\"}[1m]))".to_string()),
        threshold: 5.0,
        interval: None,
    }]);

    let result = analyser(observer, FakeWebhookCaller::new(), FakeEventSink::new())
        .analyze(&canary)
        .await;

    assert!(result);
}

#[tokio::test]
async fn analyze_fails_closed_on_unrecognized_builtin_metric_name() {
    let observer = FakeObserver::new();
    observer.set_response(Err(ObserverError::NoData));
    let events = FakeEventSink::new();
    let canary = canary_with_metrics(vec![MetricCheck {
        name: "something-custom".to_string(),
        query: None,
        threshold: 1.0,
        interval: None,
    }]);

    let result = analyser(observer, FakeWebhookCaller::new(), events.clone())
        .analyze(&canary)
        .await;

    assert!(!result, "an unrecognized metric identifier must halt advancement, not pass it");
    assert!(events
        .events()
        .iter()
        .any(|(_, _, message)| message.contains("unrecognized metric identifier")));
}

#[tokio::test]
async fn analyze_short_circuits_on_failing_webhook_without_querying_metrics() {
    let observer = FakeObserver::new();
    observer.set_response(Ok(0.0));
    let webhooks = FakeWebhookCaller::new();
    webhooks.set_failure(Some("pre-rollout smoke test failed"));
    let events = FakeEventSink::new();
    let mut canary = canary_with_metrics(vec![success_rate_check(99.0)]);
    canary.spec.analysis.webhooks.push(WebhookSpec {
        name: "smoke-test".to_string(),
        url: "http://smoke-test.test/".to_string(),
        timeout: None,
        metadata: None,
    });

    let result = analyser(observer, webhooks, events.clone())
        .analyze(&canary)
        .await;

    assert!(!result);
    assert!(events.events()[0].2.contains("webhook smoke-test failed"));
}
