use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lazy_static::lazy_static;

use super::{
    PredictionInput, Predictor, PredictorError, ScoredCareer, SupportsRuleBasedFallback,
    sort_descending,
};
use crate::catalog::{CareerCatalog, CareerKey};

const AFFINITY_BASE: f64 = 0.7;
const AFFINITY_MI_FACTOR: f64 = 0.2;
const FILLER_SCORE: f64 = 0.65;

const DEFAULT_AFFINITIES: [&str; 2] = ["Ciencia de Datos", "Ingeniería Mecatrónica"];

lazy_static! {
    /// MBTI code -> career names in preference order.
    static ref MBTI_CAREER_AFFINITIES: HashMap<&'static str, [&'static str; 2]> = HashMap::from([
        ("INTJ", ["Ciencia de Datos", "Ingeniería en Biotecnología"]),
        ("INTP", ["Ciencia de Datos", "Ingeniería Mecatrónica"]),
        ("ENTJ", ["Ingeniería Mecatrónica", "Diseño UX"]),
        ("ENTP", ["Diseño UX", "Ciencia de Datos"]),
        ("INFJ", ["Ingeniería Ambiental", "Diseño UX"]),
        ("INFP", ["Diseño UX", "Ingeniería Ambiental"]),
        ("ENFJ", ["Ingeniería Ambiental", "Ingeniería en Biotecnología"]),
        ("ENFP", ["Diseño UX", "Ingeniería en Biotecnología"]),
        ("ISTJ", ["Ingeniería Mecatrónica", "Ciencia de Datos"]),
        ("ISFJ", ["Ingeniería Ambiental", "Ingeniería en Biotecnología"]),
        ("ESTJ", ["Ingeniería Mecatrónica", "Ingeniería Ambiental"]),
        ("ESFJ", ["Ingeniería en Biotecnología", "Ingeniería Ambiental"]),
        ("ISTP", ["Ingeniería Mecatrónica", "Ciencia de Datos"]),
        ("ISFP", ["Diseño UX", "Ingeniería Ambiental"]),
        ("ESTP", ["Ingeniería Mecatrónica", "Diseño UX"]),
        ("ESFP", ["Diseño UX", "Ingeniería en Biotecnología"]),
    ]);
}

/// Affinity list for a code; unknown codes get the default pair.
pub fn affinities_for(code: &str) -> [&'static str; 2] {
    MBTI_CAREER_AFFINITIES
        .get(code)
        .copied()
        .unwrap_or(DEFAULT_AFFINITIES)
}

/// Static MBTI-to-career table scored against the catalog.
///
/// Careers whose name contains an affinity entry score `0.7 + avg(MI) * 0.2`;
/// the remaining slots are filled in catalog order at 0.65.
pub struct RuleBasedPredictor {
    catalog: Arc<CareerCatalog>,
}

impl RuleBasedPredictor {
    pub fn new(catalog: Arc<CareerCatalog>) -> Self {
        Self { catalog }
    }

    pub fn recommend(&self, input: &PredictionInput, top_n: usize) -> Vec<ScoredCareer> {
        let candidates = self
            .catalog
            .filter_location_or_all(input.location.as_deref());
        let affinity_score = AFFINITY_BASE + input.mi.average() * AFFINITY_MI_FACTOR;

        let mut seen: HashSet<CareerKey> = HashSet::new();
        let mut matches = Vec::new();

        for affinity in affinities_for(input.mbti.code()) {
            for record in candidates.iter().filter(|r| r.nombre.contains(affinity)) {
                if seen.insert(record.key()) {
                    matches.push(ScoredCareer::for_record(record, affinity_score));
                }
            }
        }

        for record in &candidates {
            if matches.len() >= top_n {
                break;
            }
            if seen.insert(record.key()) {
                matches.push(ScoredCareer::for_record(record, FILLER_SCORE));
            }
        }

        sort_descending(&mut matches);
        matches.truncate(top_n);
        matches
    }
}

impl Predictor for RuleBasedPredictor {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn version(&self) -> String {
        "affinity-table/v1".into()
    }

    fn predict(&self, input: &PredictionInput) -> Result<Vec<ScoredCareer>, PredictorError> {
        Ok(self.recommend(input, self.catalog.len()))
    }

    fn rule_fallback(&self) -> Option<&dyn SupportsRuleBasedFallback> {
        Some(self)
    }
}

impl SupportsRuleBasedFallback for RuleBasedPredictor {
    fn rule_based_recommendations(
        &self,
        input: &PredictionInput,
        top_n: usize,
    ) -> Vec<ScoredCareer> {
        self.recommend(input, top_n)
    }
}
