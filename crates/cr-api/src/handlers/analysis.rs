use axum::{
    Json,
    extract::State,
};
use tracing::{info, warn};

use cr_common::{MbtiProfile, MiProfile, PredictionInput};
use cr_common::analysis::{AnalysisResult, MAX_PROMPT_RECOMMENDATIONS, build_career_analysis_prompt};
use cr_common::api::{AnalysisRequest, AnalysisResponse, RecommendationQuery};

use super::recommendations::{resolve_top_n, run_strategy};
use crate::SharedState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

/// Asks the configured LLM to explain a set of recommendations.
///
/// Recommendations sent by the client are used as-is; otherwise they are
/// computed with the requested strategy first.
pub async fn analyze(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<RecommendationQuery>,
    ApiJson(request): ApiJson<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Some(llm) = state.llm.clone() else {
        return Err(ApiError::ServiceUnavailable("llm analysis is disabled".into()));
    };

    let mbti = MbtiProfile::try_from(&request.mbti_result)?;
    let mi = MiProfile::try_from(&request.mi_result)?;

    let recommendations = match request.career_recommendations {
        Some(recommendations) => recommendations,
        None => {
            let top_n = resolve_top_n(&state, query.top_n.or(Some(MAX_PROMPT_RECOMMENDATIONS)))?;
            let input = PredictionInput::new(mbti.clone(), mi.clone()).with_location(query.location);
            run_strategy(&state, query.strategy.unwrap_or_default(), input, top_n)
                .await?
                .matches
        }
    };

    let prompt = build_career_analysis_prompt(mbti.code(), &mi, &recommendations);
    let provider = llm.provider_name().to_string();

    let raw = match llm.complete(&prompt).await {
        Ok(raw) => {
            cr_metrics::record_llm_request(&provider, "ok");
            raw
        }
        Err(err) => {
            cr_metrics::record_llm_request(&provider, "error");
            warn!(provider = %provider, error = %err, "llm analysis failed");
            return Err(err.into());
        }
    };

    info!(provider = %provider, recommendations = recommendations.len(), "analysis generated");

    Ok(Json(AnalysisResponse::new(
        recommendations,
        AnalysisResult::from_response(raw),
        provider,
    )))
}
