//! Source adapters: the metrics query backend, the metadata REST backend,
//! the static fallback datasets, and the tool gateway.

pub mod fallback;
pub mod gateway;
mod http;
pub mod metadata;
pub mod metrics;

pub use fallback::StaticFallbackClient;
pub use gateway::ToolGatewayClient;
pub use metadata::MetadataClient;
pub use metrics::MetricsQueryClient;
