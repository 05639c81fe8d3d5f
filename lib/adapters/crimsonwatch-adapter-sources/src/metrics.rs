//! Metrics query backend client.
//!
//! Each counter is one independent instant query against
//! `{base}/api/v1/query`. A query with no data, a failed status, or an
//! unparsable value resolves to "no data" for that counter only.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crimsonwatch_domain::QueryCatalog;
use crimsonwatch_ports::{
    AgentRiskSample, FetchRequest, MetricsPayload, RawPayload, SourceClient, SourceError,
    SourceKind, SourceResult,
};

use crate::http;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Sample>,
}

#[derive(Debug, Clone, Deserialize)]
struct Sample {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

impl Sample {
    fn number(&self) -> Option<f64> {
        self.value.1.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    fn count(&self) -> Option<u64> {
        self.number().map(|v| v.max(0.0).round() as u64)
    }
}

type QueryResult = Result<Vec<Sample>, SourceError>;

#[derive(Debug, Clone)]
pub struct MetricsQueryClient {
    http: reqwest::Client,
    base: String,
    queries: QueryCatalog,
    timeout: Duration,
}

impl MetricsQueryClient {
    pub fn new(base: impl Into<String>, queries: QueryCatalog, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http::client(timeout)?,
            base: base.into(),
            queries,
            timeout,
        })
    }

    async fn query(&self, expr: &str) -> QueryResult {
        let url = format!("{}/api/v1/query", self.base);
        let response = self
            .http
            .get(&url)
            .query(&[("query", expr)])
            .send()
            .await
            .map_err(|err| http::transport_error(SourceKind::Metrics, self.timeout, err))?;

        if !response.status().is_success() {
            return Err(SourceError::Malformed {
                origin: SourceKind::Metrics,
                reason: format!("query {expr:?} returned HTTP {}", response.status()),
            });
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|err| http::transport_error(SourceKind::Metrics, self.timeout, err))?;
        if body.status != "success" {
            tracing::debug!(query = expr, status = %body.status, "query did not succeed");
            return Ok(Vec::new());
        }
        Ok(body.data.map(|data| data.result).unwrap_or_default())
    }
}

/// Keep a query's samples, logging and dropping failures.
fn samples(expr: &str, result: &QueryResult) -> Vec<Sample> {
    match result {
        Ok(samples) => samples.clone(),
        Err(err) => {
            tracing::debug!(query = expr, error = %err, "query failed, using default");
            Vec::new()
        }
    }
}

fn first_number(samples: &[Sample]) -> Option<f64> {
    samples.first().and_then(Sample::number)
}

fn first_count(samples: &[Sample]) -> Option<u64> {
    samples.first().and_then(Sample::count)
}

fn high_severity_total(samples: &[Sample]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }
    Some(
        samples
            .iter()
            .filter(|sample| sample.metric.get("severity").map(String::as_str) == Some("HIGH"))
            .filter_map(Sample::count)
            .sum(),
    )
}

fn agent_risk(samples: &[Sample]) -> Vec<AgentRiskSample> {
    samples
        .iter()
        .filter_map(|sample| {
            sample.number().map(|risk_score| AgentRiskSample {
                agent_id: sample.metric.get("agent_id").cloned(),
                risk_score,
            })
        })
        .collect()
}

#[async_trait]
impl SourceClient for MetricsQueryClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Metrics
    }

    async fn fetch(&self, _request: &FetchRequest) -> SourceResult {
        let q = &self.queries;
        let (threat, blocked, tools, events, alerts, risk) = tokio::join!(
            self.query(&q.threat_level),
            self.query(&q.blocked_calls),
            self.query(&q.tool_calls),
            self.query(&q.total_events),
            self.query(&q.active_alerts),
            self.query(&q.agent_risk),
        );

        let results = [&threat, &blocked, &tools, &events, &alerts, &risk];
        if results.iter().all(|result| result.is_err()) {
            if let Err(err) = &threat {
                return Err(err.clone());
            }
        }

        let payload = MetricsPayload {
            threat_level: first_number(&samples(&q.threat_level, &threat)),
            blocked_calls_total: first_count(&samples(&q.blocked_calls, &blocked)),
            tool_calls_total: first_count(&samples(&q.tool_calls, &tools)),
            total_events: first_count(&samples(&q.total_events, &events)),
            high_severity_alerts: high_severity_total(&samples(&q.active_alerts, &alerts)),
            agent_risk: agent_risk(&samples(&q.agent_risk, &risk)),
        };
        tracing::debug!(
            has_data = payload.has_data(),
            agents = payload.agent_risk.len(),
            "metrics fetched"
        );
        Ok(RawPayload::Metrics(payload))
    }
}
