//! Prometheus-backed [`Observer`].
//!
//! Issues `/api/v1/query` instant queries and parses the single-sample
//! response, dispatching across the query templates the Analyser's
//! metric checks need.

use crate::ports::{Observer, ObserverError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    result: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    value: (f64, String),
}

fn parse_instant_query(body: &str) -> Result<f64, ObserverError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|err| ObserverError::Http(err.to_string()))?;

    if response.status != "success" {
        return Err(ObserverError::Http(format!(
            "prometheus query failed with status {}",
            response.status
        )));
    }

    let sample = response.data.result.first().ok_or(ObserverError::NoData)?;
    sample
        .value
        .1
        .parse::<f64>()
        .map_err(|err| ObserverError::Http(format!("invalid sample value: {err}")))
}

/// Queries a Prometheus (or Prometheus-API-compatible) server's instant
/// query endpoint.
pub struct PrometheusObserver {
    base_url: String,
    client: reqwest::Client,
}

impl PrometheusObserver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn query_instant(&self, query: &str) -> Result<f64, ObserverError> {
        let url = format!("{}/api/v1/query", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|err| ObserverError::Http(err.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|err| ObserverError::Http(err.to_string()))?;

        parse_instant_query(&body)
    }
}

fn envoy_success_rate_query(namespace: &str, name: &str, interval: Duration) -> String {
    format!(
        r#"sum(rate(envoy_cluster_upstream_rq{{kubernetes_namespace="{namespace}",kubernetes_pod_name=~"{name}-.*",response_code!~"5.."}}[{}s])) / sum(rate(envoy_cluster_upstream_rq{{kubernetes_namespace="{namespace}",kubernetes_pod_name=~"{name}-.*"}}[{}s])) * 100"#,
        interval.as_secs(),
        interval.as_secs(),
    )
}

fn istio_requests_total_query(namespace: &str, name: &str, interval: Duration) -> String {
    format!(
        r#"sum(rate(istio_requests_total{{destination_workload_namespace="{namespace}",destination_workload=~"{name}.*",response_code!~"5.."}}[{}s])) / sum(rate(istio_requests_total{{destination_workload_namespace="{namespace}",destination_workload=~"{name}.*"}}[{}s])) * 100"#,
        interval.as_secs(),
        interval.as_secs(),
    )
}

fn istio_duration_bucket_query(namespace: &str, name: &str, interval: Duration) -> String {
    format!(
        r#"histogram_quantile(0.99, sum(rate(istio_request_duration_seconds_bucket{{destination_workload_namespace="{namespace}",destination_workload=~"{name}.*"}}[{}s])) by (le))"#,
        interval.as_secs(),
    )
}

#[async_trait]
impl Observer for PrometheusObserver {
    async fn get_envoy_success_rate(
        &self,
        _target: &str,
        namespace: &str,
        name: &str,
        interval: Duration,
    ) -> Result<f64, ObserverError> {
        self.query_instant(&envoy_success_rate_query(namespace, name, interval))
            .await
    }

    async fn get_deployment_counter(
        &self,
        _target: &str,
        namespace: &str,
        name: &str,
        interval: Duration,
    ) -> Result<f64, ObserverError> {
        self.query_instant(&istio_requests_total_query(namespace, name, interval))
            .await
    }

    async fn get_deployment_histogram(
        &self,
        _target: &str,
        namespace: &str,
        name: &str,
        interval: Duration,
    ) -> Result<Duration, ObserverError> {
        let seconds = self
            .query_instant(&istio_duration_bucket_query(namespace, name, interval))
            .await?;
        Ok(Duration::from_secs_f64(seconds.max(0.0)))
    }

    async fn get_scalar(&self, query: &str) -> Result<f64, ObserverError> {
        self.query_instant(query).await
    }
}

#[cfg(test)]
#[path = "prometheus_observer_test.rs"]
mod tests;
