//! Elasticsearch search client

use crate::source::{LogEntry, LogSource, TimeWindow};
use crate::{env, QueryError};
use async_trait::async_trait;
use notifiers::Severity;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// One searched pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub severity: Severity,
}

/// `monitors.elasticsearch` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    #[serde(default)]
    pub enabled: bool,
    pub hosts: Vec<String>,
    pub indices: Vec<String>,
    /// Seconds between checks; also the searched window
    #[serde(default = "default_search_interval")]
    pub search_interval: u64,
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
    /// Hits fetched per index and pattern
    #[serde(default = "default_max_hits")]
    pub max_hits: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_interval() -> u64 {
    300
}

fn default_max_hits() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

/// Searches one Elasticsearch node picked at connect time
pub struct ElasticsearchClient {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
    max_hits: usize,
}

impl std::fmt::Debug for ElasticsearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.is_some())
            .field("max_hits", &self.max_hits)
            .finish()
    }
}

impl ElasticsearchClient {
    /// Ping each host in turn and keep the first that answers
    pub async fn connect(
        hosts: &[String],
        timeout: Duration,
        api_key: Option<String>,
        max_hits: usize,
    ) -> Result<Self, QueryError> {
        if hosts.is_empty() {
            return Err(QueryError::InvalidConfig("no elasticsearch hosts configured".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        for host in hosts {
            let base_url = host.trim_end_matches('/').to_string();
            let mut request = client.get(&base_url);
            if let Some(key) = &api_key {
                request = request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {}", key));
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Successfully connected to Elasticsearch at {}", base_url);
                    return Ok(Self {
                        base_url,
                        client,
                        api_key,
                        max_hits,
                    });
                }
                Ok(response) => warn!("Elasticsearch host {} answered {}", base_url, response.status()),
                Err(e) => warn!("Elasticsearch host {} unreachable: {}", base_url, e),
            }
        }

        error!("Failed to connect to any Elasticsearch host");
        Err(QueryError::Unavailable(format!("Elasticsearch ({})", hosts.join(", "))))
    }

    /// Connect using `ES_API_KEY` when set
    pub async fn from_env(config: &ElasticsearchConfig) -> Result<Self, QueryError> {
        let api_key = std::env::var(env::ES_API_KEY).ok().filter(|k| !k.is_empty());
        debug!("Elasticsearch API key present: {}", api_key.is_some());
        let client = Self::connect(
            &config.hosts,
            Duration::from_secs(config.timeout_secs),
            api_key,
            config.max_hits,
        )
        .await?;
        client.unmatched_indices(&config.indices).await;
        Ok(client)
    }

    /// Index patterns that currently resolve to no index; each one is logged
    /// as a warning. Patterns that could not be checked are not reported.
    pub async fn unmatched_indices(&self, patterns: &[String]) -> Vec<String> {
        let mut unmatched = Vec::new();

        for pattern in patterns {
            let url = format!("{}/{}", self.base_url, pattern);
            let request = self
                .client
                .get(&url)
                .query(&[("ignore_unavailable", "true"), ("allow_no_indices", "true")]);

            let response = match self.authorized(request).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Could not check index pattern {}: {}", pattern, e);
                    continue;
                }
            };

            let matched = if response.status() == reqwest::StatusCode::NOT_FOUND {
                0
            } else if response.status().is_success() {
                match response.json::<Map<String, Value>>().await {
                    Ok(indices) => indices.len(),
                    Err(e) => {
                        warn!("Could not check index pattern {}: {}", pattern, e);
                        continue;
                    }
                }
            } else {
                warn!(
                    "Could not check index pattern {}: HTTP {}",
                    pattern,
                    response.status()
                );
                continue;
            };

            if matched == 0 {
                warn!("No indices found matching pattern: {}", pattern);
                unmatched.push(pattern.clone());
            } else {
                info!("Found {} indices matching pattern: {}", matched, pattern);
            }
        }

        unmatched
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {}", key)),
            None => request,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search body: pattern match within the window, newest first
    pub fn build_query(&self, pattern: &str, window: &TimeWindow) -> Value {
        json!({
            "query": {
                "bool": {
                    "must": [
                        { "query_string": { "query": pattern, "analyze_wildcard": true } },
                        {
                            "range": {
                                "@timestamp": {
                                    "gte": window.start.to_rfc3339(),
                                    "lte": window.end.to_rfc3339()
                                }
                            }
                        }
                    ]
                }
            },
            "sort": [{ "@timestamp": { "order": "desc" } }],
            "size": self.max_hits
        })
    }

    async fn search_index(&self, index: &str, body: &Value) -> Result<Vec<LogEntry>, QueryError> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let response = self.authorized(self.client.post(&url).json(body)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| QueryError::InvalidResponse(format!("Parse error: {}", e)))?;

        Ok(result
            .hits
            .hits
            .into_iter()
            .map(|hit| to_entry(index, hit.source))
            .collect())
    }
}

fn to_entry(index: &str, mut source: Map<String, Value>) -> LogEntry {
    let timestamp = take_string(&mut source, "@timestamp").unwrap_or_else(|| "unknown".to_string());
    let message = take_string(&mut source, "message").unwrap_or_default();
    LogEntry {
        timestamp,
        message,
        index: index.to_string(),
        fields: source,
    }
}

fn take_string(source: &mut Map<String, Value>, key: &str) -> Option<String> {
    match source.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl LogSource for ElasticsearchClient {
    /// Per-index failures are logged and skipped; the search fails only
    /// when every index failed
    #[instrument(skip(self, window))]
    async fn search(
        &self,
        pattern: &str,
        window: &TimeWindow,
        indices: &[String],
    ) -> Result<Vec<LogEntry>, QueryError> {
        let body = self.build_query(pattern, window);
        let mut entries = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0;

        for index in indices {
            match self.search_index(index, &body).await {
                Ok(hits) => {
                    debug!("Found {} hits in index {}", hits.len(), index);
                    succeeded += 1;
                    entries.extend(hits);
                }
                Err(e) => {
                    error!("Error searching index {}: {}", index, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(entries),
        }
    }
}
