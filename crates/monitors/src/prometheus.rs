//! Prometheus HTTP API client

use crate::source::{MetricSource, Sample, TimeWindow};
use crate::{env, QueryError};
use async_trait::async_trait;
use chrono::DateTime;
use notifiers::Severity;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// One thresholded metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRule {
    pub name: String,
    pub threshold: f64,
    pub severity: Severity,
}

/// `monitors.prometheus` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enabled: bool,
    pub endpoint: String,
    /// Seconds between checks
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval: u64,
    /// Seconds of history examined per check
    #[serde(default = "default_query_window")]
    pub query_window: u64,
    #[serde(default)]
    pub metrics: Vec<MetricRule>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scrape_interval() -> u64 {
    60
}

fn default_query_window() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Series>,
}

#[derive(Debug, Deserialize)]
struct Series {
    /// Range vectors
    #[serde(default)]
    values: Vec<(f64, String)>,
    /// Instant vectors
    #[serde(default)]
    value: Option<(f64, String)>,
}

/// Instant queries against `/api/v1/query`
pub struct PrometheusClient {
    endpoint: String,
    client: reqwest::Client,
    auth: Option<(String, String)>,
}

impl PrometheusClient {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        auth: Option<(String, String)>,
    ) -> Result<Self, QueryError> {
        if endpoint.is_empty() {
            return Err(QueryError::InvalidConfig("prometheus endpoint is empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            auth,
        })
    }

    /// Basic auth is used only when both `PROM_USERNAME` and `PROM_PASSWORD` are set
    pub fn from_env(config: &PrometheusConfig) -> Result<Self, QueryError> {
        let auth = match (
            std::env::var(env::PROM_USERNAME).ok(),
            std::env::var(env::PROM_PASSWORD).ok(),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };
        debug!("Prometheus credentials present: {}", auth.is_some());
        Self::new(
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
            auth,
        )
    }

    fn parse(body: QueryResponse) -> Result<Vec<Sample>, QueryError> {
        if body.status != "success" {
            return Err(QueryError::Provider(
                body.error.unwrap_or(body.status),
            ));
        }

        let series = body.data.map(|d| d.result).unwrap_or_default();
        let samples = series
            .into_iter()
            .flat_map(|s| s.values.into_iter().chain(s.value))
            .filter_map(|(ts, raw)| {
                let value = raw.parse::<f64>().ok()?;
                let secs = ts.trunc() as i64;
                let nanos = (ts.fract() * 1e9) as u32;
                let timestamp = DateTime::from_timestamp(secs, nanos)?;
                Some(Sample { timestamp, value })
            })
            .collect();
        Ok(samples)
    }
}

#[async_trait]
impl MetricSource for PrometheusClient {
    #[instrument(skip(self))]
    async fn query(&self, metric: &str, window: &TimeWindow) -> Result<Vec<Sample>, QueryError> {
        let query = format!("{}[{}s]", metric, window.seconds());
        let url = format!("{}/api/v1/query", self.endpoint);

        let mut request = self
            .client
            .get(&url)
            .query(&[("query", query), ("time", window.end.timestamp().to_string())]);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to query metric {}: status {}", metric, status);
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| QueryError::InvalidResponse(e.to_string()))?;
        let samples = Self::parse(body)?;
        debug!("Metric {} returned {} samples", metric, samples.len());
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, auth: Option<(String, String)>) -> PrometheusClient {
        PrometheusClient::new(&server.uri(), Duration::from_secs(5), auth).unwrap()
    }

    #[tokio::test]
    async fn test_range_query_collects_all_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .and(query_param("query", "cpu_usage[300s]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {
                    "resultType": "matrix",
                    "result": [
                        {"metric": {"instance": "a"}, "values": [[1700000000, "1"], [1700000015, "5"]]},
                        {"metric": {"instance": "b"}, "values": [[1700000000.5, "12"]]}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let window = TimeWindow::last(Duration::from_secs(300));
        let samples = client(&server, None).query("cpu_usage", &window).await.unwrap();

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 5.0, 12.0]);
        assert_eq!(samples[0].timestamp.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_error_status_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "errorType": "bad_data",
                "error": "parse error"
            })))
            .mount(&server)
            .await;

        let window = TimeWindow::last(Duration::from_secs(60));
        let result = client(&server, None).query("bad{", &window).await;
        assert!(matches!(result, Err(QueryError::Provider(msg)) if msg == "parse error"));
    }

    #[tokio::test]
    async fn test_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let window = TimeWindow::last(Duration::from_secs(60));
        let result = client(&server, None).query("up", &window).await;
        assert!(matches!(result, Err(QueryError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_basic_auth_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"resultType": "matrix", "result": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = Some(("prom".to_string(), "secret".to_string()));
        let window = TimeWindow::last(Duration::from_secs(60));
        let samples = client(&server, auth).query("up", &window).await.unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_unparseable_values_are_skipped() {
        let body: QueryResponse = serde_json::from_value(json!({
            "status": "success",
            "data": {"result": [{"value": [1700000000, "not-a-number"]}, {"value": [1700000000, "3"]}]}
        }))
        .unwrap();
        let samples = PrometheusClient::parse(body).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 3.0);
    }
}
