//! Test case generation route

use super::super::error::ApiError;
use super::super::ServerAppState;
use crate::generation::{GenerateRequest, GenerateResponse};
use axum::{extract::State, Json};

/// `POST /api/generate-tests`
pub async fn generate_tests(
    State(state): State<ServerAppState>,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    request.validate().map_err(ApiError::BadRequest)?;

    log::info!(
        "[generate] Generating test cases for \"{}\" with {}",
        request.story_title.trim(),
        state.generator.name()
    );

    let response = state.generator.generate(&request).await.map_err(|e| {
        log::warn!("[generate] Generation failed: {}", e);
        ApiError::from(e)
    })?;

    log::info!(
        "[generate] Generated {} cases ({} prompt / {} completion tokens)",
        response.cases.len(),
        response.prompt_tokens,
        response.completion_tokens
    );
    Ok(Json(response))
}
