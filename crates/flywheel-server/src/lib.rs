//! Flywheel Server
//!
//! The HTTP/JSON boundary and read-side composition:
//! - `QueryFacade` assembles the response shapes the UI consumes
//! - `routes` exposes the UI read endpoints, the fine-tune trigger, and the
//!   trainer-facing ingestion surface under `/internal`
//! - `ServerConfig` is the TOML server configuration

pub mod config;
pub mod error;
pub mod facade;
pub mod routes;
pub mod state;

pub use config::{ServerConfig, ServerConfigError};
pub use error::ApiError;
pub use facade::QueryFacade;
pub use routes::router;
pub use state::AppState;
