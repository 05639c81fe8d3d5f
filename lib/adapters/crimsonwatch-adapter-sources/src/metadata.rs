//! Metadata REST backend client.
//!
//! Reads `{base}/api/agents` and `{base}/api/alerts` independently. A slice
//! that is unreachable, non-2xx, not an array, or fails schema validation is
//! reported as absent; it never aborts the other slice.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crimsonwatch_domain::{AgentRecord, AlertRecord};
use crimsonwatch_ports::{
    FetchRequest, MetadataPayload, RawPayload, SourceClient, SourceError, SourceKind,
    SourceResult,
};

use crate::http;

#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base: String,
    timeout: Duration,
}

impl MetadataClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http::client(timeout)?,
            base: base.into(),
            timeout,
        })
    }

    async fn read_list<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>, SourceError> {
        let url = format!("{}/api/{resource}", self.base);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| http::transport_error(SourceKind::Metadata, self.timeout, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Malformed {
                origin: SourceKind::Metadata,
                reason: format!("{resource} returned HTTP {status}"),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| http::transport_error(SourceKind::Metadata, self.timeout, err))?;
        if !body.is_array() {
            return Err(SourceError::Malformed {
                origin: SourceKind::Metadata,
                reason: format!("{resource} body is not an array"),
            });
        }
        serde_json::from_value(body).map_err(|err| SourceError::Malformed {
            origin: SourceKind::Metadata,
            reason: format!("{resource}: {err}"),
        })
    }
}

fn slice<T>(resource: &str, result: Result<Vec<T>, SourceError>) -> Option<Vec<T>> {
    match result {
        Ok(items) => Some(items),
        Err(err) => {
            tracing::warn!(resource, error = %err, "metadata slice unavailable");
            None
        }
    }
}

#[async_trait]
impl SourceClient for MetadataClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Metadata
    }

    async fn fetch(&self, _request: &FetchRequest) -> SourceResult {
        let (agents, alerts) = tokio::join!(
            self.read_list::<AgentRecord>("agents"),
            self.read_list::<AlertRecord>("alerts"),
        );

        if let (Err(err), Err(_)) = (&agents, &alerts) {
            if !matches!(err, SourceError::Malformed { .. }) {
                return Err(err.clone());
            }
        }

        Ok(RawPayload::Metadata(MetadataPayload {
            agents: slice("agents", agents),
            alerts: slice("alerts", alerts),
        }))
    }
}
