//! Wire types shared by the HTTP service and the trainer CLI.
//!
//! Field names follow the JSON contract used by existing clients
//! (`MBTI_code`, `MI_scores`, Spanish career fields).

pub mod profile;
pub mod recommendation;

pub use profile::{
    MbtiResult, MiResult, ProfileAnswersRequest, ProfileRequest, ProfileResponse,
};
pub use recommendation::{
    AnalysisRequest, AnalysisResponse, CompareResponse, RecommendationQuery,
    RecommendationResponse, StrategyOutcome,
};
