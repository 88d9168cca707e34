use axum::{Json, extract::State};
use serde_json::json;

use cr_common::api::{MbtiResult, MiResult, ProfileAnswersRequest, ProfileRequest, ProfileResponse};
use cr_common::profile::{MbtiAnswer, MbtiScorer, MiAnswer, MiScorer, ProfileDescriber};

use crate::SharedState;
use crate::error::ApiError;
use crate::extract::ApiJson;

pub async fn score_mbti(
    ApiJson(answers): ApiJson<Vec<MbtiAnswer>>,
) -> Result<Json<MbtiResult>, ApiError> {
    let profile = MbtiScorer.score(&answers)?;
    Ok(Json(MbtiResult::from(&profile)))
}

pub async fn score_mi(
    State(state): State<SharedState>,
    ApiJson(answers): ApiJson<Vec<MiAnswer>>,
) -> Result<Json<MiResult>, ApiError> {
    let profile = MiScorer::new(state.recommender.mi_max_score).score(&answers)?;
    Ok(Json(MiResult::from(&profile)))
}

/// Scores both questionnaires and describes the resulting profile.
pub async fn score_profile(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<ProfileAnswersRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mbti = MbtiScorer.score(&request.mbti_answers)?;
    let mi = MiScorer::new(state.recommender.mi_max_score).score(&request.mi_answers)?;
    let profile_description = ProfileDescriber.describe(mbti.code(), &mi);

    Ok(Json(ProfileResponse {
        mbti_result: MbtiResult::from(&mbti),
        mi_result: MiResult::from(&mi),
        profile_description,
    }))
}

pub async fn describe(
    ApiJson(request): ApiJson<ProfileRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (mbti, mi) = request.to_profiles()?;
    Ok(Json(json!({
        "mbti_code": mbti.code(),
        "profile_description": ProfileDescriber.describe(mbti.code(), &mi),
    })))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_state;

    #[tokio::test]
    async fn mbti_answers_produce_code_and_vector() {
        let answers: Vec<MbtiAnswer> = serde_json::from_value(json!([
            {"question_id": 1, "dimension": "E/I", "user_choice": "I", "weight": 1.0},
            {"question_id": 2, "dimension": "S/N", "user_choice": "N", "weight": 1.0},
            {"question_id": 3, "dimension": "T/F", "user_choice": "T", "weight": 1.0},
            {"question_id": 4, "dimension": "J/P", "user_choice": "J", "weight": 1.0}
        ]))
        .unwrap();

        let Json(result) = score_mbti(ApiJson(answers)).await.unwrap();

        assert_eq!(result.code, "INTJ");
        assert_eq!(result.vector, vec![1, 1, 0, 0]);
    }

    #[tokio::test]
    async fn unknown_intelligence_is_bad_request() {
        let answers: Vec<MiAnswer> = serde_json::from_value(json!([
            {"intelligence_type": "Telepathic", "score": 3.0}
        ]))
        .unwrap();

        let result = score_mi(State(test_state()), ApiJson(answers)).await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
