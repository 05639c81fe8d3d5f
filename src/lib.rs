//! Service host: configuration discovery, logging, wiring, and the console
//! consumer used by the `watch-service` binary.

pub mod config;
pub mod console;
pub mod logging;
pub mod wiring;

pub use config::{config_path, load_config};
pub use wiring::{Service, build_service, build_sources};
