//! Assessment context endpoints.
//!
//! - `GET /api/assessments/:id`: stored scores and profile
//! - `PUT /api/assessments/:id`: create or replace them

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use super::with_store;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{GenerationContext, PillarScores, ProfileSignals};
use crate::pipeline::generation::validate_assessment_id;

/// Body of `PUT /api/assessments/:id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInput {
    pub scores: PillarScores,
    #[serde(default)]
    pub profile: ProfileSignals,
}

/// `GET /api/assessments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<GenerationContext>, ApiError> {
    validate_assessment_id(&id)?;

    let context = with_store(&ctx, "store.load_context", |store| store.load_context(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Assessment {id} not found")))?;

    Ok(Json(context))
}

/// `PUT /api/assessments/:id`
pub async fn upsert(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(input): Json<AssessmentInput>,
) -> Result<Json<GenerationContext>, ApiError> {
    validate_assessment_id(&id)?;
    if let Some(pillar) = input.scores.out_of_range() {
        return Err(ApiError::BadRequest(format!(
            "Score for {pillar} must be between 0 and {}",
            PillarScores::MAX_SCORE
        )));
    }

    let context = GenerationContext {
        assessment_id: id,
        scores: input.scores,
        profile: input.profile,
    };
    with_store(&ctx, "store.upsert_context", |store| store.upsert_context(&context)).await?;

    tracing::info!(assessment_id = %context.assessment_id, "Assessment context stored");
    Ok(Json(context))
}
