use serde::{Deserialize, Serialize};

use super::profile::{MbtiResult, MiResult};
use crate::CareerMatch;
use crate::analysis::AnalysisResult;
use crate::predictor::Strategy;

/// Query string of the recommendation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecommendationQuery {
    pub strategy: Option<Strategy>,
    pub top_n: Option<usize>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub mbti_result: MbtiResult,
    pub mi_result: MiResult,
    pub career_recommendations: Vec<CareerMatch>,
    pub profile_description: String,
    pub strategy: Strategy,
    pub served_by: String,
    pub fell_back: bool,
}

/// One strategy's answer in a side-by-side comparison. A strategy that failed
/// outright reports `error` and no recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by: Option<String>,
    pub fell_back: bool,
    pub career_recommendations: Vec<CareerMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareResponse {
    pub mbti_code: String,
    pub results: Vec<StrategyOutcome>,
}

/// Profile plus, optionally, recommendations the client already holds.
/// When absent they are computed with the requested strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub mbti_result: MbtiResult,
    pub mi_result: MiResult,
    #[serde(default)]
    pub career_recommendations: Option<Vec<CareerMatch>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub career_recommendations: Vec<CareerMatch>,
    pub analysis: String,
    pub raw_response: String,
    pub provider: String,
}

impl AnalysisResponse {
    pub fn new(
        career_recommendations: Vec<CareerMatch>,
        result: AnalysisResult,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            career_recommendations,
            analysis: result.analysis,
            raw_response: result.raw_response,
            provider: provider.into(),
        }
    }
}
