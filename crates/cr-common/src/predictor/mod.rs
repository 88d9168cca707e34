//! Interchangeable career predictors over the same profile input.
//!
//! - `ClassifierPredictor`: trained neural network or random forest over the 16-dim feature vector
//! - `SemanticPredictor`: description embeddings vs. a rendered profile text
//! - `RuleBasedPredictor`: static MBTI affinities, the last-resort fallback
//!
//! Trained state lives in [`registry::ModelSlot`]s owned by the [`PredictorRegistry`].

pub mod classifier;
pub mod forest;
pub mod neural;
pub mod registry;
pub mod riasec;
pub mod rule_based;
pub mod semantic;
pub mod similarity;
pub mod store;
pub mod synthetic;
pub mod trainer;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

use crate::features::{FeatureEncoder, FeatureVector};
use crate::profile::{MbtiProfile, MiProfile};

pub use classifier::ClassifierPredictor;
pub use registry::{ModelKind, ModelSlot, ModelState, ModelStatus, PredictorRegistry};
pub use rule_based::RuleBasedPredictor;
pub use semantic::SemanticPredictor;
pub use trainer::ModelTrainer;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("model {0} has not been trained")]
    ModelNotTrained(ModelKind),
    #[error("predictor unavailable: {0}")]
    Unavailable(String),
    #[error("training failed: {0}")]
    Training(String),
    #[error("training already in progress for {0}")]
    TrainingInProgress(ModelKind),
    #[error("model persistence failed: {0}")]
    Persistence(String),
}

/// Which predictor a caller asks for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    #[default]
    Neural,
    Forest,
    Semantic,
    Rules,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Neural,
        Strategy::Forest,
        Strategy::Semantic,
        Strategy::Rules,
    ];
}

/// Everything a predictor may look at for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInput {
    pub mbti: MbtiProfile,
    pub mi: MiProfile,
    pub location: Option<String>,
}

impl PredictionInput {
    pub fn new(mbti: MbtiProfile, mi: MiProfile) -> Self {
        Self {
            mbti,
            mi,
            location: None,
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self
    }

    pub fn features(&self) -> FeatureVector {
        FeatureEncoder.encode_profiles(&self.mbti, &self.mi)
    }
}

/// A ranked candidate. `universidad` is known for catalog-backed predictors;
/// classifiers only know career names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCareer {
    pub nombre: String,
    pub universidad: Option<String>,
    pub score: f64,
}

impl ScoredCareer {
    pub fn named(nombre: impl Into<String>, score: f64) -> Self {
        Self {
            nombre: nombre.into(),
            universidad: None,
            score,
        }
    }

    pub fn for_record(record: &crate::CareerRecord, score: f64) -> Self {
        Self {
            nombre: record.nombre.clone(),
            universidad: Some(record.universidad.clone()),
            score,
        }
    }
}

pub trait Predictor: Send + Sync {
    fn name(&self) -> &'static str;

    fn version(&self) -> String;

    /// Every known career, sorted by descending score.
    fn predict(&self, input: &PredictionInput) -> Result<Vec<ScoredCareer>, PredictorError>;

    fn rule_fallback(&self) -> Option<&dyn SupportsRuleBasedFallback> {
        None
    }

    fn training(&self) -> Option<&dyn SupportsTraining> {
        None
    }
}

/// Predictors that can pad short result lists with rule-based picks.
pub trait SupportsRuleBasedFallback: Send + Sync {
    fn rule_based_recommendations(&self, input: &PredictionInput, top_n: usize)
    -> Vec<ScoredCareer>;
}

/// Predictors that can train themselves on default data when first used.
pub trait SupportsTraining: Send + Sync {
    fn train_default(&self) -> Result<ModelStatus, PredictorError>;
}

pub(crate) fn sort_descending(scored: &mut [ScoredCareer]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
