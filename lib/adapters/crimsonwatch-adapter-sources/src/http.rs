use std::time::Duration;

use anyhow::{Context, Result};

use crimsonwatch_ports::{SourceError, SourceKind};

pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("crimsonwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")
}

pub(crate) fn transport_error(origin: SourceKind, timeout: Duration, err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout {
            origin,
            after: timeout,
        }
    } else if err.is_decode() {
        SourceError::Malformed {
            origin,
            reason: err.to_string(),
        }
    } else {
        SourceError::Unreachable {
            origin,
            reason: err.to_string(),
        }
    }
}
