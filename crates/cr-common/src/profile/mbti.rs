use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::InputError;

/// One of the four MBTI axes, in the fixed index order used by the feature vector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
)]
pub enum Dimension {
    #[serde(rename = "E/I")]
    #[strum(serialize = "E/I")]
    EI,
    #[serde(rename = "S/N")]
    #[strum(serialize = "S/N")]
    SN,
    #[serde(rename = "T/F")]
    #[strum(serialize = "T/F")]
    TF,
    #[serde(rename = "J/P")]
    #[strum(serialize = "J/P")]
    JP,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [Dimension::EI, Dimension::SN, Dimension::TF, Dimension::JP];

    pub fn index(self) -> usize {
        match self {
            Dimension::EI => 0,
            Dimension::SN => 1,
            Dimension::TF => 2,
            Dimension::JP => 3,
        }
    }

    /// Letters of the two poles; bit 0 selects the first one.
    pub fn letters(self) -> [char; 2] {
        match self {
            Dimension::EI => ['E', 'I'],
            Dimension::SN => ['S', 'N'],
            Dimension::TF => ['T', 'F'],
            Dimension::JP => ['J', 'P'],
        }
    }

    pub fn parse(raw: &str) -> Result<Self, InputError> {
        Dimension::from_str(raw.trim()).map_err(|_| InputError::UnknownDimension(raw.to_string()))
    }

    /// Pole index (0 or 1) of a letter on this axis.
    pub fn pole_of(self, letter: char) -> Option<u8> {
        let letter = letter.to_ascii_uppercase();
        self.letters()
            .iter()
            .position(|candidate| *candidate == letter)
            .map(|pos| pos as u8)
    }

    fn pole_of_choice(self, choice: &str) -> Result<u8, InputError> {
        let mut chars = choice.trim().chars();
        let pole = match (chars.next(), chars.next()) {
            (Some(letter), None) => self.pole_of(letter),
            _ => None,
        };
        pole.ok_or_else(|| InputError::InvalidChoice {
            dimension: self.as_ref().to_string(),
            choice: choice.to_string(),
        })
    }
}

/// A single answered MBTI question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbtiAnswer {
    pub question_id: i64,
    pub dimension: String,
    pub user_choice: String,
    pub weight: f64,
}

/// Four-letter type plus its bit vector and per-axis confidence.
///
/// `code[i]` is always the letter selected by `vector[i]`; constructors reject
/// anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct MbtiProfile {
    code: String,
    vector: [u8; 4],
    weights: BTreeMap<Dimension, f64>,
}

impl MbtiProfile {
    /// Builds a profile from its bit vector; the code is derived.
    pub fn from_vector(
        vector: [u8; 4],
        weights: BTreeMap<Dimension, f64>,
    ) -> Result<Self, InputError> {
        if vector.iter().any(|bit| *bit > 1) {
            return Err(InputError::InvalidVector(
                vector.iter().map(|bit| i64::from(*bit)).collect(),
            ));
        }

        for dimension in Dimension::ALL {
            let weight = weights
                .get(&dimension)
                .copied()
                .ok_or_else(|| InputError::MissingWeight(dimension.as_ref().to_string()))?;
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(InputError::DimensionWeightOutOfRange {
                    dimension: dimension.as_ref().to_string(),
                    weight,
                });
            }
        }

        let code = Dimension::ALL
            .iter()
            .map(|dimension| dimension.letters()[vector[dimension.index()] as usize])
            .collect();

        Ok(Self {
            code,
            vector,
            weights,
        })
    }

    /// Builds a profile from a code and a vector that must agree with it.
    pub fn from_parts(
        code: &str,
        vector: &[i64],
        weights: BTreeMap<Dimension, f64>,
    ) -> Result<Self, InputError> {
        let bits = code_to_vector(code)?;

        if vector.len() != 4 || vector.iter().any(|bit| *bit != 0 && *bit != 1) {
            return Err(InputError::InvalidVector(vector.to_vec()));
        }
        if vector
            .iter()
            .zip(bits.iter())
            .any(|(given, derived)| *given != i64::from(*derived))
        {
            return Err(InputError::CodeVectorMismatch {
                code: code.to_string(),
                vector: vector.to_vec(),
            });
        }

        Self::from_vector(bits, weights)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn vector(&self) -> [u8; 4] {
        self.vector
    }

    pub fn weights(&self) -> &BTreeMap<Dimension, f64> {
        &self.weights
    }

    pub fn weight(&self, dimension: Dimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(0.0)
    }

    /// Axes whose confidence is strictly above `threshold`, in axis order.
    pub fn strong_dimensions(&self, threshold: f64) -> Vec<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|dimension| self.weight(*dimension) > threshold)
            .collect()
    }
}

/// Parses a four-letter code into its bit vector.
pub fn code_to_vector(code: &str) -> Result<[u8; 4], InputError> {
    let letters: Vec<char> = code.trim().chars().collect();
    if letters.len() != 4 {
        return Err(InputError::InvalidCode(code.to_string()));
    }

    let mut vector = [0u8; 4];
    for dimension in Dimension::ALL {
        vector[dimension.index()] = dimension
            .pole_of(letters[dimension.index()])
            .ok_or_else(|| InputError::InvalidCode(code.to_string()))?;
    }
    Ok(vector)
}

/// Turns weighted MBTI answers into a profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct MbtiScorer;

impl MbtiScorer {
    /// Per axis, the pole with the larger share of answer weight wins (ties go to
    /// the first pole) and the confidence is the gap between the two shares.
    /// Axes without any weighted answer default to the first pole with 0.5.
    pub fn score(&self, answers: &[MbtiAnswer]) -> Result<MbtiProfile, InputError> {
        let mut totals = [[0.0f64; 2]; 4];

        for answer in answers {
            let dimension = Dimension::parse(&answer.dimension)?;
            let pole = dimension.pole_of_choice(&answer.user_choice)?;
            if !answer.weight.is_finite() || !(0.0..=1.0).contains(&answer.weight) {
                return Err(InputError::AnswerWeightOutOfRange {
                    question_id: answer.question_id,
                    weight: answer.weight,
                });
            }
            totals[dimension.index()][pole as usize] += answer.weight;
        }

        let mut vector = [0u8; 4];
        let mut weights = BTreeMap::new();

        for dimension in Dimension::ALL {
            let [first, second] = totals[dimension.index()];
            let total = first + second;

            let (pole, weight) = if total > 0.0 {
                let (first, second) = (first / total, second / total);
                (u8::from(first < second), (first - second).abs())
            } else {
                (0, 0.5)
            };

            vector[dimension.index()] = pole;
            weights.insert(dimension, weight);
        }

        tracing::debug!(answers = answers.len(), ?vector, "scored MBTI answers");
        MbtiProfile::from_vector(vector, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: i64, dimension: &str, choice: &str, weight: f64) -> MbtiAnswer {
        MbtiAnswer {
            question_id: id,
            dimension: dimension.into(),
            user_choice: choice.into(),
            weight,
        }
    }

    #[test]
    fn intj_answers_produce_intj_profile() {
        let answers = vec![
            answer(1, "E/I", "I", 0.8),
            answer(2, "S/N", "N", 0.7),
            answer(3, "T/F", "T", 0.9),
            answer(4, "J/P", "J", 0.6),
        ];

        let profile = MbtiScorer.score(&answers).unwrap();

        assert_eq!(profile.code(), "INTJ");
        assert_eq!(profile.vector(), [1, 1, 0, 0]);
        for dimension in Dimension::ALL {
            assert_eq!(profile.weight(dimension), 1.0);
        }
    }

    #[test]
    fn dimension_without_answers_defaults_to_first_pole() {
        let answers = vec![answer(1, "E/I", "I", 0.8)];

        let profile = MbtiScorer.score(&answers).unwrap();

        assert_eq!(profile.code(), "ISTJ");
        assert_eq!(profile.weight(Dimension::SN), 0.5);
        assert_eq!(profile.weight(Dimension::TF), 0.5);
        assert_eq!(profile.weight(Dimension::JP), 0.5);
    }

    #[test]
    fn zero_weight_answers_count_as_no_evidence() {
        let answers = vec![answer(1, "T/F", "F", 0.0)];

        let profile = MbtiScorer.score(&answers).unwrap();

        assert_eq!(profile.vector()[2], 0);
        assert_eq!(profile.weight(Dimension::TF), 0.5);
    }

    #[test]
    fn ties_resolve_to_first_pole_with_zero_confidence() {
        let answers = vec![answer(1, "S/N", "S", 0.5), answer(2, "S/N", "N", 0.5)];

        let profile = MbtiScorer.score(&answers).unwrap();

        assert_eq!(profile.vector()[1], 0);
        assert_eq!(profile.weight(Dimension::SN), 0.0);
    }

    #[test]
    fn confidence_is_share_gap() {
        let answers = vec![
            answer(1, "J/P", "P", 0.6),
            answer(2, "J/P", "J", 0.2),
            answer(3, "J/P", "P", 0.2),
        ];

        let profile = MbtiScorer.score(&answers).unwrap();

        assert_eq!(profile.code().chars().nth(3), Some('P'));
        assert!((profile.weight(Dimension::JP) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn rejects_unknown_dimension_and_foreign_choice() {
        assert!(matches!(
            MbtiScorer.score(&[answer(1, "X/Y", "X", 0.5)]),
            Err(InputError::UnknownDimension(_))
        ));
        assert!(matches!(
            MbtiScorer.score(&[answer(1, "E/I", "N", 0.5)]),
            Err(InputError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn rejects_weights_outside_unit_interval() {
        assert!(matches!(
            MbtiScorer.score(&[answer(7, "E/I", "E", 1.5)]),
            Err(InputError::AnswerWeightOutOfRange { question_id: 7, .. })
        ));
        assert!(MbtiScorer.score(&[answer(8, "E/I", "E", f64::NAN)]).is_err());
    }

    #[test]
    fn from_parts_rejects_code_vector_mismatch() {
        let weights = Dimension::ALL.into_iter().map(|d| (d, 0.6)).collect();

        let err = MbtiProfile::from_parts("INTJ", &[0, 1, 0, 0], weights).unwrap_err();

        assert!(matches!(err, InputError::CodeVectorMismatch { .. }));
    }

    #[test]
    fn from_parts_requires_every_weight() {
        let mut weights: BTreeMap<Dimension, f64> =
            Dimension::ALL.into_iter().map(|d| (d, 0.6)).collect();
        weights.remove(&Dimension::JP);

        let err = MbtiProfile::from_parts("ENFP", &[0, 1, 1, 1], weights).unwrap_err();

        assert_eq!(err, InputError::MissingWeight("J/P".into()));
    }

    #[test]
    fn strong_dimensions_use_strict_threshold() {
        let weights = BTreeMap::from([
            (Dimension::EI, 0.9),
            (Dimension::SN, 0.7),
            (Dimension::TF, 0.71),
            (Dimension::JP, 0.2),
        ]);
        let profile = MbtiProfile::from_vector([1, 1, 0, 0], weights).unwrap();

        assert_eq!(
            profile.strong_dimensions(0.7),
            vec![Dimension::EI, Dimension::TF]
        );
    }
}
