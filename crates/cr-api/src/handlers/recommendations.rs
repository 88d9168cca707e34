use std::time::Instant;

use axum::{
    Json,
    extract::State,
};
use tracing::info;

use cr_common::api::{
    CompareResponse, MbtiResult, MiResult, ProfileRequest, RecommendationQuery,
    RecommendationResponse, StrategyOutcome,
};
use cr_common::profile::ProfileDescriber;
use cr_common::{PredictionInput, Recommendations, Strategy};

use super::join_error;
use crate::SharedState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

pub(crate) fn resolve_top_n(state: &SharedState, requested: Option<usize>) -> Result<usize, ApiError> {
    let top_n = requested.unwrap_or(state.recommender.default_top_n);
    if top_n == 0 || top_n > state.config.max_top_n {
        return Err(ApiError::BadRequest(format!(
            "top_n must be between 1 and {}",
            state.config.max_top_n
        )));
    }
    Ok(top_n)
}

/// Runs one strategy off the async runtime; classifier predictors may train on first use.
pub(crate) async fn run_strategy(
    state: &SharedState,
    strategy: Strategy,
    input: PredictionInput,
    top_n: usize,
) -> Result<Recommendations, ApiError> {
    let orchestrator = state.orchestrator.clone();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || orchestrator.recommend(strategy, &input, top_n))
        .await
        .map_err(join_error)??;

    cr_metrics::record_recommendation(
        strategy.as_ref(),
        result.served_by,
        result.fell_back,
        started.elapsed(),
    );
    Ok(result)
}

pub async fn recommend(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<RecommendationQuery>,
    ApiJson(request): ApiJson<ProfileRequest>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let top_n = resolve_top_n(&state, query.top_n)?;
    let strategy = query.strategy.unwrap_or_default();
    let (mbti, mi) = request.to_profiles()?;
    let profile_description = ProfileDescriber.describe(mbti.code(), &mi);

    let input = PredictionInput::new(mbti.clone(), mi.clone()).with_location(query.location);
    let result = run_strategy(&state, strategy, input, top_n).await?;

    info!(
        strategy = strategy.as_ref(),
        served_by = result.served_by,
        fell_back = result.fell_back,
        count = result.matches.len(),
        "recommendations served"
    );

    Ok(Json(RecommendationResponse {
        mbti_result: MbtiResult::from(&mbti),
        mi_result: MiResult::from(&mi),
        career_recommendations: result.matches,
        profile_description,
        strategy,
        served_by: result.served_by.to_string(),
        fell_back: result.fell_back,
    }))
}

/// Every strategy against the same profile. One failing strategy does not fail the request.
pub async fn compare(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<RecommendationQuery>,
    ApiJson(request): ApiJson<ProfileRequest>,
) -> Result<Json<CompareResponse>, ApiError> {
    let top_n = resolve_top_n(&state, query.top_n)?;
    let (mbti, mi) = request.to_profiles()?;
    let input = PredictionInput::new(mbti.clone(), mi).with_location(query.location);

    let mut results = Vec::with_capacity(Strategy::ALL.len());
    for strategy in Strategy::ALL {
        let outcome = match run_strategy(&state, strategy, input.clone(), top_n).await {
            Ok(result) => StrategyOutcome {
                strategy,
                served_by: Some(result.served_by.to_string()),
                fell_back: result.fell_back,
                career_recommendations: result.matches,
                error: None,
            },
            Err(err) => StrategyOutcome {
                strategy,
                served_by: None,
                fell_back: false,
                career_recommendations: Vec::new(),
                error: Some(err.to_string()),
            },
        };
        results.push(outcome);
    }

    Ok(Json(CompareResponse {
        mbti_code: mbti.code().to_string(),
        results,
    }))
}
