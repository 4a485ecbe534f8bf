//! HTTP API for assessment contexts and their Situation Assessment.
//!
//! Routes are nested under `/api/`. `build_router()` returns a composable
//! `Router`; `server` owns the bind/serve/shutdown lifecycle.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::build_router;
pub use server::{serve_until_ctrl_c, start_server, ApiServer, ServerError};
pub use types::{ApiContext, SituationResponse};
