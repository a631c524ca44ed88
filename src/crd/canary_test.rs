#![allow(clippy::unwrap_used)]

use super::*;

fn spec_with_max_weight(max_weight: Option<i32>) -> Analysis {
    Analysis {
        threshold: 2,
        max_weight,
        step_weight: 10,
        iterations: 0,
        r#match: vec![],
        metrics: vec![],
        webhooks: vec![],
    }
}

#[test]
fn effective_max_weight_defaults_to_100_when_unset() {
    assert_eq!(spec_with_max_weight(None).effective_max_weight(), 100);
}

#[test]
fn effective_max_weight_defaults_to_100_when_non_positive() {
    assert_eq!(spec_with_max_weight(Some(0)).effective_max_weight(), 100);
    assert_eq!(spec_with_max_weight(Some(-5)).effective_max_weight(), 100);
}

#[test]
fn effective_max_weight_passes_through_positive_value() {
    assert_eq!(spec_with_max_weight(Some(60)).effective_max_weight(), 60);
}

#[test]
fn is_ab_mode_true_iff_match_non_empty() {
    let mut analysis = spec_with_max_weight(None);
    assert!(!analysis.is_ab_mode());

    analysis.r#match.push(RequestMatch {
        fields: [("header".to_string(), "x".to_string())].into(),
    });
    assert!(analysis.is_ab_mode());
}

#[test]
fn parse_duration_supports_seconds_minutes_hours() {
    assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
    assert_eq!(parse_duration("5m").unwrap().as_secs(), 300);
    assert_eq!(parse_duration("1h").unwrap().as_secs(), 3600);
}

#[test]
fn parse_duration_rejects_garbage() {
    assert!(parse_duration("").is_err());
    assert!(parse_duration("soon").is_err());
    assert!(parse_duration("5x").is_err());
}

#[test]
fn canary_id_display_is_name_dot_namespace() {
    let id = CanaryId::new("web", "prod");
    assert_eq!(id.to_string(), "web.prod");
}

#[test]
fn canary_deserializes_from_yaml() {
    let yaml = r#"
apiVersion: canary.sailshift.io/v1alpha1
kind: Canary
metadata:
  name: web
  namespace: prod
spec:
  targetRef:
    name: web
  analysisInterval: 30s
  analysis:
    threshold: 2
    maxWeight: 60
    stepWeight: 20
    metrics:
    - name: istio_requests_total
      threshold: 99
    webhooks:
    - name: load-test
      url: http://flagger-loadtester/
"#;
    let canary: Canary = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(canary.spec.target_ref.name, "web");
    assert_eq!(canary.spec.analysis.threshold, 2);
    assert_eq!(canary.spec.analysis.effective_max_weight(), 60);
    assert_eq!(canary.spec.analysis.metrics.len(), 1);
    assert_eq!(canary.spec.analysis.webhooks.len(), 1);
    assert!(!canary.spec.skip_analysis);
}

#[test]
fn status_reset_for_new_revision_zeroes_counters_and_routes_to_progressing() {
    let mut status = CanaryStatus {
        phase: Some(Phase::Progressing),
        canary_weight: 40,
        failed_checks: 1,
        iterations: 2,
        last_applied_spec: None,
        tracked_config_hash: None,
    };
    status.reset_for_new_revision();
    assert_eq!(status.phase, Some(Phase::Progressing));
    assert_eq!(status.canary_weight, 0);
    assert_eq!(status.failed_checks, 0);
    assert_eq!(status.iterations, 0);
}
