//! Tool gateway client.
//!
//! Invokes a tool through `POST {base}/v1/mcp/tools/{tool}` with body
//! `{"arguments": {...}}`. The result is opaque JSON. The aggregation cycle
//! never calls this.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::http;

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    arguments: &'a Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ToolGatewayClient {
    http: reqwest::Client,
    base: String,
}

impl ToolGatewayClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http::client(timeout)?,
            base: base.into(),
        })
    }

    pub async fn invoke(&self, tool: &str, arguments: &Map<String, Value>) -> Result<Value> {
        if tool.is_empty()
            || !tool
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            bail!("invalid tool name {tool:?}");
        }

        let url = format!("{}/v1/mcp/tools/{tool}", self.base);
        let response = self
            .http
            .post(&url)
            .json(&InvokeBody { arguments })
            .send()
            .await
            .with_context(|| format!("failed to reach tool gateway at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("tool {tool} failed with HTTP {status}: {body}");
        }
        response
            .json()
            .await
            .with_context(|| format!("tool {tool} returned a non-JSON result"))
    }
}
