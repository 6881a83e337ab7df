//! HTTP API module.
//!
//! Thin JSON endpoints over the config store and the frpc supervisor.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
