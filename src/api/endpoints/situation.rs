//! Situation Assessment endpoints.
//!
//! - `POST /api/assessments/:id/situation`: generate and persist
//! - `POST /api/assessments/:id/situation/regenerate`: manual fresh run
//! - `GET /api/assessments/:id/situation`: last stored narrative

use axum::extract::{Path, State};
use axum::Json;

use super::with_store;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SituationResponse};
use crate::pipeline::generation::validate_assessment_id;
use crate::pipeline::safety::sanitize_situation_assessment;

/// `POST /api/assessments/:id/situation`
pub async fn generate(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<SituationResponse>, ApiError> {
    run_and_persist(&ctx, &id).await.map(Json)
}

/// `POST /api/assessments/:id/situation/regenerate`
///
/// Always a fresh run with fresh metadata; the stored narrative is replaced.
pub async fn regenerate(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<SituationResponse>, ApiError> {
    tracing::info!(assessment_id = %id, "Manual regenerate requested");
    run_and_persist(&ctx, &id).await.map(Json)
}

/// `GET /api/assessments/:id/situation`
///
/// Stored payloads carry no run record, so `debug` is the unknown stub.
pub async fn latest(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<SituationResponse>, ApiError> {
    validate_assessment_id(&id)?;

    let stored = with_store(&ctx, "store.load_narrative", |store| store.load_narrative(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No situation assessment for {id}")))?;

    let payload = sanitize_situation_assessment(&stored.payload);
    Ok(Json(SituationResponse::without_metadata(payload)))
}

async fn run_and_persist(ctx: &ApiContext, id: &str) -> Result<SituationResponse, ApiError> {
    validate_assessment_id(id)?;

    let context = with_store(ctx, "store.load_context", |store| store.load_context(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Assessment {id} not found")))?;

    let outcome = ctx.orchestrator.run(&context).await?;

    // Content is still returned when persisting fails.
    if let Err(e) = with_store(ctx, "store.save_narrative", |store| {
        store.save_narrative(id, &outcome.payload, &outcome.metadata)
    })
    .await
    {
        tracing::warn!(assessment_id = id, error = %e, "Failed to persist situation assessment");
    }

    Ok(SituationResponse::from(outcome))
}
