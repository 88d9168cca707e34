use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::InputError;

pub const DEFAULT_MAX_SCORE: f64 = 10.0;

/// The eight multiple-intelligence types, declared in feature-vector order.
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
pub enum Intelligence {
    Lin,
    LogMath,
    Spa,
    BodKin,
    Mus,
    Inter,
    Intra,
    Nat,
}

impl Intelligence {
    pub const ALL: [Intelligence; 8] = [
        Intelligence::Lin,
        Intelligence::LogMath,
        Intelligence::Spa,
        Intelligence::BodKin,
        Intelligence::Mus,
        Intelligence::Inter,
        Intelligence::Intra,
        Intelligence::Nat,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn parse(raw: &str) -> Result<Self, InputError> {
        Intelligence::from_str(raw.trim())
            .map_err(|_| InputError::UnknownIntelligence(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiAnswer {
    pub intelligence_type: String,
    pub score: f64,
}

/// Normalised intelligence scores in `[0, 1]`. Missing types read as 0.0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MiProfile {
    scores: BTreeMap<Intelligence, f64>,
}

impl MiProfile {
    pub fn from_scores(scores: BTreeMap<Intelligence, f64>) -> Result<Self, InputError> {
        for (intelligence, score) in &scores {
            if !score.is_finite() || !(0.0..=1.0).contains(score) {
                return Err(InputError::InvalidScore {
                    intelligence: intelligence.as_ref().to_string(),
                    score: *score,
                });
            }
        }
        Ok(Self { scores })
    }

    pub fn get(&self, intelligence: Intelligence) -> f64 {
        self.scores.get(&intelligence).copied().unwrap_or(0.0)
    }

    pub fn scores(&self) -> &BTreeMap<Intelligence, f64> {
        &self.scores
    }

    /// Mean over all eight types, counting missing ones as 0.0.
    pub fn average(&self) -> f64 {
        Intelligence::ALL.iter().map(|i| self.get(*i)).sum::<f64>() / Intelligence::ALL.len() as f64
    }

    /// All eight types ordered by descending score; ties keep canonical order.
    pub fn ranked(&self) -> Vec<(Intelligence, f64)> {
        let mut ranked: Vec<_> = Intelligence::ALL.iter().map(|i| (*i, self.get(*i))).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<(Intelligence, f64)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

/// Sums raw answer scores per type and scales them into `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct MiScorer {
    max_score: f64,
}

impl Default for MiScorer {
    fn default() -> Self {
        Self {
            max_score: DEFAULT_MAX_SCORE,
        }
    }
}

impl MiScorer {
    pub fn new(max_score: f64) -> Self {
        if !max_score.is_finite() || max_score <= 0.0 {
            tracing::warn!(
                max_score,
                fallback = DEFAULT_MAX_SCORE,
                "invalid MI max score; using default"
            );
            return Self::default();
        }
        Self { max_score }
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    pub fn score(&self, answers: &[MiAnswer]) -> Result<MiProfile, InputError> {
        let mut totals = [0.0f64; 8];

        for answer in answers {
            let intelligence = Intelligence::parse(&answer.intelligence_type)?;
            if !answer.score.is_finite() {
                return Err(InputError::InvalidScore {
                    intelligence: answer.intelligence_type.clone(),
                    score: answer.score,
                });
            }
            totals[intelligence.index()] += answer.score;
        }

        let scores = Intelligence::ALL
            .iter()
            .map(|i| (*i, (totals[i.index()] / self.max_score).clamp(0.0, 1.0)))
            .collect();

        MiProfile::from_scores(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(kind: &str, score: f64) -> MiAnswer {
        MiAnswer {
            intelligence_type: kind.into(),
            score,
        }
    }

    #[test]
    fn sums_and_normalises_against_max_score() {
        let answers = vec![answer("LogMath", 4.0), answer("LogMath", 3.0), answer("Nat", 2.0)];

        let profile = MiScorer::default().score(&answers).unwrap();

        assert!((profile.get(Intelligence::LogMath) - 0.7).abs() < 1e-9);
        assert!((profile.get(Intelligence::Nat) - 0.2).abs() < 1e-9);
        assert_eq!(profile.get(Intelligence::Lin), 0.0);
        assert_eq!(profile.scores().len(), 8);
    }

    #[test]
    fn clamps_to_unit_interval() {
        let answers = vec![answer("Spa", 12.0), answer("Mus", -3.0)];

        let profile = MiScorer::default().score(&answers).unwrap();

        assert_eq!(profile.get(Intelligence::Spa), 1.0);
        assert_eq!(profile.get(Intelligence::Mus), 0.0);
    }

    #[test]
    fn rejects_unknown_type() {
        let err = MiScorer::default()
            .score(&[answer("Cooking", 1.0)])
            .unwrap_err();

        assert_eq!(err, InputError::UnknownIntelligence("Cooking".into()));
    }

    #[test]
    fn invalid_max_score_falls_back_to_default() {
        assert_eq!(MiScorer::new(0.0).max_score(), DEFAULT_MAX_SCORE);
        assert_eq!(MiScorer::new(5.0).max_score(), 5.0);
    }

    #[test]
    fn ranked_breaks_ties_by_canonical_order() {
        let profile = MiProfile::from_scores(BTreeMap::from([
            (Intelligence::Nat, 0.5),
            (Intelligence::Lin, 0.5),
            (Intelligence::Spa, 0.9),
        ]))
        .unwrap();

        let top: Vec<_> = profile.top(3).into_iter().map(|(i, _)| i).collect();

        assert_eq!(
            top,
            vec![Intelligence::Spa, Intelligence::Lin, Intelligence::Nat]
        );
    }

    #[test]
    fn average_counts_missing_types_as_zero() {
        let profile =
            MiProfile::from_scores(BTreeMap::from([(Intelligence::Inter, 0.8)])).unwrap();

        assert!((profile.average() - 0.1).abs() < 1e-9);
    }
}
