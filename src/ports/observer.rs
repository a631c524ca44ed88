//! The Observer port: metric queries against a time-series backend.
//!
//! `ObserverError` gives "no data" a dedicated variant instead of relying
//! on a substring match against an error message.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ObserverError {
    #[error("no values found for query")]
    NoData,

    #[error("observer http error: {0}")]
    Http(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Evaluates the well-known and ad-hoc metric queries a canary can check.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn get_envoy_success_rate(
        &self,
        target: &str,
        namespace: &str,
        name: &str,
        interval: Duration,
    ) -> Result<f64, ObserverError>;

    async fn get_deployment_counter(
        &self,
        target: &str,
        namespace: &str,
        name: &str,
        interval: Duration,
    ) -> Result<f64, ObserverError>;

    async fn get_deployment_histogram(
        &self,
        target: &str,
        namespace: &str,
        name: &str,
        interval: Duration,
    ) -> Result<Duration, ObserverError>;

    async fn get_scalar(&self, query: &str) -> Result<f64, ObserverError>;
}
