//! HTTP router for the assessment service.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Layer stack (outermost → innermost):
//! 1. Request tracing → 2. CORS → 3. `Cache-Control: no-store`

use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router from a shared context.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn build_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/assessments/:id",
            get(endpoints::assessments::detail).put(endpoints::assessments::upsert),
        )
        .route(
            "/assessments/:id/situation",
            get(endpoints::situation::latest).post(endpoints::situation::generate),
        )
        .route(
            "/assessments/:id/situation/regenerate",
            post(endpoints::situation::regenerate),
        )
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        // Narratives are per-person; never let an intermediary cache them.
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
