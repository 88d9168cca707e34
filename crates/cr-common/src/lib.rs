pub mod analysis;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod orchestrator;
pub mod predictor;
pub mod profile;
pub mod run_id;

use serde::{Deserialize, Serialize};

pub use catalog::{CareerCatalog, CareerRecord};
pub use error::{InputError, RecommendError};
pub use features::{FeatureEncoder, FeatureVector};
pub use orchestrator::{RecommendationOrchestrator, Recommendations};
pub use predictor::{PredictionInput, Predictor, PredictorError, Strategy};
pub use profile::{Dimension, Intelligence, MbtiProfile, MiProfile};

/// A recommended career as returned to callers.
///
/// `match_score` is only comparable within a single strategy: classifier
/// probabilities, cosine similarities and rule scores live on different scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerMatch {
    pub nombre: String,
    pub universidad: String,
    pub ciudad: String,
    pub match_score: f64,
}
