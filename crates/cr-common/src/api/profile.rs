use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::profile::{Dimension, Intelligence, MbtiAnswer, MbtiProfile, MiAnswer, MiProfile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbtiResult {
    #[serde(rename = "MBTI_code")]
    pub code: String,
    #[serde(rename = "MBTI_vector")]
    pub vector: Vec<i64>,
    #[serde(rename = "MBTI_weights")]
    pub weights: BTreeMap<String, f64>,
}

impl From<&MbtiProfile> for MbtiResult {
    fn from(profile: &MbtiProfile) -> Self {
        Self {
            code: profile.code().to_string(),
            vector: profile.vector().iter().map(|bit| i64::from(*bit)).collect(),
            weights: profile
                .weights()
                .iter()
                .map(|(dimension, weight)| (dimension.as_ref().to_string(), *weight))
                .collect(),
        }
    }
}

impl TryFrom<&MbtiResult> for MbtiProfile {
    type Error = InputError;

    fn try_from(result: &MbtiResult) -> Result<Self, Self::Error> {
        let weights = result
            .weights
            .iter()
            .map(|(key, weight)| Dimension::parse(key).map(|dimension| (dimension, *weight)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        MbtiProfile::from_parts(&result.code, &result.vector, weights)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiResult {
    #[serde(rename = "MI_scores")]
    pub scores: BTreeMap<String, f64>,
}

impl From<&MiProfile> for MiResult {
    fn from(profile: &MiProfile) -> Self {
        Self {
            scores: profile
                .scores()
                .iter()
                .map(|(intelligence, score)| (intelligence.as_ref().to_string(), *score))
                .collect(),
        }
    }
}

impl TryFrom<&MiResult> for MiProfile {
    type Error = InputError;

    fn try_from(result: &MiResult) -> Result<Self, Self::Error> {
        let scores = result
            .scores
            .iter()
            .map(|(key, score)| Intelligence::parse(key).map(|i| (i, *score)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        MiProfile::from_scores(scores)
    }
}

/// An already-scored profile, as sent back by clients for recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub mbti_result: MbtiResult,
    pub mi_result: MiResult,
}

impl ProfileRequest {
    pub fn to_profiles(&self) -> Result<(MbtiProfile, MiProfile), InputError> {
        Ok((
            MbtiProfile::try_from(&self.mbti_result)?,
            MiProfile::try_from(&self.mi_result)?,
        ))
    }
}

/// Raw questionnaire answers for both instruments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAnswersRequest {
    pub mbti_answers: Vec<MbtiAnswer>,
    pub mi_answers: Vec<MiAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub mbti_result: MbtiResult,
    pub mi_result: MiResult,
    pub profile_description: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn mbti_result_uses_wire_names() {
        let weights = Dimension::ALL.into_iter().map(|d| (d, 0.75)).collect();
        let profile = MbtiProfile::from_vector([1, 1, 0, 0], weights).unwrap();

        let value = serde_json::to_value(MbtiResult::from(&profile)).unwrap();

        assert_eq!(value["MBTI_code"], "INTJ");
        assert_eq!(value["MBTI_vector"], json!([1, 1, 0, 0]));
        assert_eq!(value["MBTI_weights"]["T/F"], 0.75);
    }

    #[test]
    fn mismatched_code_and_vector_are_rejected() {
        let result: MbtiResult = serde_json::from_value(json!({
            "MBTI_code": "INTJ",
            "MBTI_vector": [0, 1, 0, 0],
            "MBTI_weights": {"E/I": 0.5, "S/N": 0.5, "T/F": 0.5, "J/P": 0.5}
        }))
        .unwrap();

        assert!(matches!(
            MbtiProfile::try_from(&result),
            Err(InputError::CodeVectorMismatch { .. })
        ));
    }

    #[test]
    fn missing_or_unknown_weight_keys_are_rejected() {
        let missing: MbtiResult = serde_json::from_value(json!({
            "MBTI_code": "ESTJ",
            "MBTI_vector": [0, 0, 0, 0],
            "MBTI_weights": {"E/I": 0.5, "S/N": 0.5, "T/F": 0.5}
        }))
        .unwrap();
        let unknown: MbtiResult = serde_json::from_value(json!({
            "MBTI_code": "ESTJ",
            "MBTI_vector": [0, 0, 0, 0],
            "MBTI_weights": {"X/Y": 0.5}
        }))
        .unwrap();

        assert_eq!(
            MbtiProfile::try_from(&missing).unwrap_err(),
            InputError::MissingWeight("J/P".into())
        );
        assert!(matches!(
            MbtiProfile::try_from(&unknown),
            Err(InputError::UnknownDimension(_))
        ));
    }

    #[test]
    fn mi_result_validates_keys_and_range() {
        let ok = MiResult {
            scores: BTreeMap::from([("Lin".into(), 1.0), ("Nat".into(), 0.25)]),
        };
        let out_of_range = MiResult {
            scores: BTreeMap::from([("Lin".into(), 1.5)]),
        };
        let unknown = MiResult {
            scores: BTreeMap::from([("Cooking".into(), 0.5)]),
        };

        let profile = MiProfile::try_from(&ok).unwrap();
        assert_eq!(profile.get(Intelligence::Nat), 0.25);
        assert_eq!(MiResult::from(&profile), ok);
        assert!(MiProfile::try_from(&out_of_range).is_err());
        assert_eq!(
            MiProfile::try_from(&unknown).unwrap_err(),
            InputError::UnknownIntelligence("Cooking".into())
        );
    }
}
