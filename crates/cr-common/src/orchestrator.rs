//! Turns raw predictor output into exactly `min(top_n, catalog size)` enriched matches.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::CareerMatch;
use crate::catalog::{CareerCatalog, CareerKey, CareerRecord};
use crate::error::RecommendError;
use crate::predictor::{
    PredictionInput, Predictor, PredictorError, PredictorRegistry, ScoredCareer, Strategy,
    SupportsRuleBasedFallback,
};

const CANDIDATE_MULTIPLIER: usize = 5;
const ALWAYS_KEEP: usize = 3;
const MIN_CONFIDENT_SCORE: f64 = 0.03;
const RULE_FALLBACK_SCORE: f64 = 0.05;
const CATALOG_FILLER_SCORE: f64 = 0.01;

pub const UNKNOWN_UNIVERSITY: &str = "Universidad no especificada";
pub const UNKNOWN_CITY: &str = "Ciudad no especificada";

/// Result of one recommendation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations {
    pub requested: Strategy,
    /// Name of the predictor that actually produced the ranking.
    pub served_by: &'static str,
    pub fell_back: bool,
    pub matches: Vec<CareerMatch>,
}

impl Recommendations {
    fn empty(requested: Strategy) -> Self {
        Self {
            requested,
            served_by: "none",
            fell_back: false,
            matches: Vec::new(),
        }
    }
}

struct Pick<'a> {
    nombre: String,
    score: f64,
    record: Option<&'a CareerRecord>,
}

pub struct RecommendationOrchestrator {
    catalog: Arc<CareerCatalog>,
    registry: Arc<PredictorRegistry>,
}

impl RecommendationOrchestrator {
    pub fn new(catalog: Arc<CareerCatalog>, registry: Arc<PredictorRegistry>) -> Self {
        Self { catalog, registry }
    }

    pub fn catalog(&self) -> &Arc<CareerCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<PredictorRegistry> {
        &self.registry
    }

    pub fn recommend(
        &self,
        strategy: Strategy,
        input: &PredictionInput,
        top_n: usize,
    ) -> Result<Recommendations, RecommendError> {
        self.recommend_with_rng(strategy, input, top_n, &mut rand::thread_rng())
    }

    pub fn recommend_with_rng<R: Rng + ?Sized>(
        &self,
        strategy: Strategy,
        input: &PredictionInput,
        top_n: usize,
        rng: &mut R,
    ) -> Result<Recommendations, RecommendError> {
        if self.catalog.is_empty() || top_n == 0 {
            return Ok(Recommendations::empty(strategy));
        }

        match self.registry.predictor(strategy) {
            Ok(predictor) => {
                self.recommend_using(strategy, predictor.as_ref(), input, top_n, rng)
            }
            Err(err) => {
                warn!(strategy = strategy.as_ref(), error = %err, "strategy unavailable; using rule-based predictor");
                let rules = self.registry.rules();
                let mut out = self.recommend_using(strategy, rules.as_ref(), input, top_n, rng)?;
                out.fell_back = true;
                Ok(out)
            }
        }
    }

    /// Runs the pipeline against a specific predictor, falling back to the
    /// rule-based predictor when it cannot produce a ranking.
    pub fn recommend_using<R: Rng + ?Sized>(
        &self,
        requested: Strategy,
        predictor: &dyn Predictor,
        input: &PredictionInput,
        top_n: usize,
        rng: &mut R,
    ) -> Result<Recommendations, RecommendError> {
        if self.catalog.is_empty() || top_n == 0 {
            return Ok(Recommendations::empty(requested));
        }

        let (served_by, fell_back, scored, fallback) = match predict_with_training(predictor, input)
        {
            Ok(scored) if !scored.is_empty() => {
                (predictor.name(), false, scored, predictor.rule_fallback())
            }
            outcome => {
                if let Err(err) = &outcome {
                    warn!(predictor = predictor.name(), error = %err, "predictor failed; using rule-based predictor");
                } else {
                    warn!(predictor = predictor.name(), "predictor returned nothing; using rule-based predictor");
                }
                let rules = self.registry.rules();
                let scored = rules.recommend(input, self.catalog.len());
                if scored.is_empty() {
                    return Err(RecommendError::NoPrediction(format!(
                        "rule-based predictor produced nothing for {}",
                        input.mbti.code()
                    )));
                }
                return self.finish(requested, "rules", true, scored, None, input, top_n, rng);
            }
        };

        self.finish(requested, served_by, fell_back, scored, fallback, input, top_n, rng)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish<R: Rng + ?Sized>(
        &self,
        requested: Strategy,
        served_by: &'static str,
        fell_back: bool,
        scored: Vec<ScoredCareer>,
        fallback: Option<&dyn SupportsRuleBasedFallback>,
        input: &PredictionInput,
        top_n: usize,
        rng: &mut R,
    ) -> Result<Recommendations, RecommendError> {
        let picks = self.select(scored, fallback, input, top_n, rng);
        let matches = picks.into_iter().map(|pick| self.enrich(pick)).collect::<Vec<_>>();

        info!(
            strategy = requested.as_ref(),
            served_by,
            fell_back,
            results = matches.len(),
            "generated recommendations"
        );

        Ok(Recommendations {
            requested,
            served_by,
            fell_back,
            matches,
        })
    }

    fn resolve(&self, career: &ScoredCareer) -> Option<&CareerRecord> {
        match &career.universidad {
            Some(universidad) => self.catalog.get(&career.nombre, universidad),
            None => self.catalog.find_by_name(&career.nombre),
        }
    }

    fn key_of(career: &ScoredCareer, record: Option<&CareerRecord>) -> CareerKey {
        record.map(CareerRecord::key).unwrap_or_else(|| {
            CareerKey::new(&career.nombre, career.universidad.as_deref().unwrap_or_default())
        })
    }

    fn select<'a, R: Rng + ?Sized>(
        &'a self,
        scored: Vec<ScoredCareer>,
        fallback: Option<&dyn SupportsRuleBasedFallback>,
        input: &PredictionInput,
        top_n: usize,
        rng: &mut R,
    ) -> Vec<Pick<'a>> {
        let target = top_n.min(self.catalog.len());
        let mut seen: HashSet<CareerKey> = HashSet::new();
        let mut picks: Vec<Pick<'a>> = Vec::with_capacity(target);

        let candidates = scored
            .into_iter()
            .filter(|c| c.score.is_finite())
            .take(top_n.saturating_mul(CANDIDATE_MULTIPLIER));
        for (rank, candidate) in candidates.enumerate() {
            if picks.len() >= target {
                break;
            }
            if rank >= ALWAYS_KEEP && candidate.score <= MIN_CONFIDENT_SCORE {
                debug!(career = %candidate.nombre, score = candidate.score, "dropping low-confidence candidate");
                continue;
            }
            let record = self.resolve(&candidate);
            if seen.insert(Self::key_of(&candidate, record)) {
                picks.push(Pick {
                    nombre: candidate.nombre,
                    score: candidate.score,
                    record,
                });
            }
        }

        if picks.len() < target {
            if let Some(fallback) = fallback {
                for career in fallback.rule_based_recommendations(input, top_n) {
                    if picks.len() >= target {
                        break;
                    }
                    let record = self.resolve(&career);
                    if seen.insert(Self::key_of(&career, record)) {
                        debug!(career = %career.nombre, "padding with rule-based pick");
                        picks.push(Pick {
                            nombre: career.nombre,
                            score: RULE_FALLBACK_SCORE,
                            record,
                        });
                    }
                }
            }
        }

        if picks.len() < target {
            let mut unchosen: Vec<&CareerRecord> = self
                .catalog
                .records()
                .iter()
                .filter(|r| !seen.contains(&r.key()))
                .collect();
            unchosen.shuffle(rng);
            for record in unchosen.into_iter().take(target - picks.len()) {
                debug!(career = %record.nombre, "padding with catalog career");
                picks.push(Pick {
                    nombre: record.nombre.clone(),
                    score: CATALOG_FILLER_SCORE,
                    record: Some(record),
                });
            }
        }

        picks
    }

    fn enrich(&self, pick: Pick<'_>) -> CareerMatch {
        match pick.record {
            Some(record) => CareerMatch {
                nombre: pick.nombre,
                universidad: record.universidad.clone(),
                ciudad: record.ubicacion.clone(),
                match_score: pick.score,
            },
            None => {
                warn!(career = %pick.nombre, "career missing from catalog; using placeholders");
                CareerMatch {
                    nombre: pick.nombre,
                    universidad: UNKNOWN_UNIVERSITY.into(),
                    ciudad: UNKNOWN_CITY.into(),
                    match_score: pick.score,
                }
            }
        }
    }
}

/// Trains on first use when the predictor supports it, then retries once.
fn predict_with_training(
    predictor: &dyn Predictor,
    input: &PredictionInput,
) -> Result<Vec<ScoredCareer>, PredictorError> {
    match predictor.predict(input) {
        Err(PredictorError::ModelNotTrained(kind)) => {
            let training = predictor
                .training()
                .ok_or(PredictorError::ModelNotTrained(kind))?;
            info!(%kind, "no trained model; training on default data");
            training.train_default()?;
            predictor.predict(input)
        }
        outcome => outcome,
    }
}
