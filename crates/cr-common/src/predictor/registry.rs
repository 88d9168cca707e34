use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{info, warn};

use super::forest::RandomForest;
use super::neural::NeuralNetwork;
use super::semantic::{SemanticPredictor, create_embedder};
use super::store::ModelStore;
use super::{
    ClassifierPredictor, ModelTrainer, PredictionInput, Predictor, PredictorError,
    RuleBasedPredictor, ScoredCareer, Strategy, sort_descending,
};
use crate::catalog::CareerCatalog;
use crate::config::RecommenderConfig;
use crate::features::FeatureVector;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelKind {
    Neural,
    Forest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Neural, ModelKind::Forest];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Neural => "neural",
            ModelKind::Forest => "forest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "model", rename_all = "lowercase")]
pub enum Classifier {
    Neural(NeuralNetwork),
    Forest(RandomForest),
}

impl Classifier {
    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::Neural(_) => ModelKind::Neural,
            Classifier::Forest(_) => ModelKind::Forest,
        }
    }

    pub fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        match self {
            Classifier::Neural(net) => net.predict_proba(features),
            Classifier::Forest(forest) => forest.predict_proba(features),
        }
    }

    pub fn classes(&self) -> usize {
        match self {
            Classifier::Neural(net) => net.classes(),
            Classifier::Forest(forest) => forest.classes(),
        }
    }
}

/// A classifier together with the label set and provenance it was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub feature_layout: String,
    pub labels: Vec<String>,
    pub classifier: Classifier,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
    pub accuracy: Option<f64>,
    pub run_id: String,
    pub source: String,
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        self.classifier.kind()
    }

    /// One entry per label, most probable first.
    pub fn predict(&self, features: &FeatureVector) -> Vec<ScoredCareer> {
        let mut scored: Vec<ScoredCareer> = self
            .labels
            .iter()
            .zip(self.classifier.predict_proba(features))
            .map(|(label, p)| ScoredCareer::named(label.clone(), p))
            .collect();
        sort_descending(&mut scored);
        scored
    }

    pub fn predict_label(&self, features: &FeatureVector) -> Option<&str> {
        let probs = self.classifier.predict_proba(features);
        probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .and_then(|(idx, _)| self.labels.get(idx))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Untrained,
    Training,
    Trained,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub kind: ModelKind,
    pub state: ModelState,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub sample_count: Option<usize>,
    pub accuracy: Option<f64>,
    pub run_id: Option<String>,
    pub source: Option<String>,
}

/// Holder of one classifier kind.
///
/// Readers clone the current `Arc` and never observe a half-trained model:
/// training builds a fresh model outside the lock and swaps it in on success.
/// The training mutex keeps at most one run in flight per slot.
pub struct ModelSlot {
    kind: ModelKind,
    model: RwLock<Option<Arc<TrainedModel>>>,
    training: Mutex<()>,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ModelSlot {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            model: RwLock::new(None),
            training: Mutex::new(()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.model
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn swap(&self, model: Option<Arc<TrainedModel>>) {
        *self
            .model
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = model;
    }

    pub fn install(&self, model: TrainedModel) -> Result<(), PredictorError> {
        if model.kind() != self.kind {
            return Err(PredictorError::Persistence(format!(
                "cannot install a {} model into the {} slot",
                model.kind(),
                self.kind
            )));
        }
        self.swap(Some(Arc::new(model)));
        Ok(())
    }

    /// Drops the serving model. Fails fast while a training run is in flight so
    /// the run cannot reinstall a model after the reset.
    pub fn reset(&self) -> Result<ModelStatus, PredictorError> {
        self.reset_with(|| Ok(()))
    }

    /// Like [`reset`](Self::reset), running `cleanup` while the training lock is held.
    pub fn reset_with(
        &self,
        cleanup: impl FnOnce() -> Result<(), PredictorError>,
    ) -> Result<ModelStatus, PredictorError> {
        let _guard = self.lock_training()?;
        self.swap(None);
        cleanup()?;
        info!(kind = %self.kind, "model reset to untrained");
        Ok(self.status())
    }

    fn lock_training(&self) -> Result<MutexGuard<'_, ()>, PredictorError> {
        match self.training.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                Err(PredictorError::TrainingInProgress(self.kind))
            }
        }
    }

    pub fn status(&self) -> ModelStatus {
        let model = self.current();
        let state = if self.in_flight.load(Ordering::SeqCst) {
            ModelState::Training
        } else if model.is_some() {
            ModelState::Trained
        } else {
            ModelState::Untrained
        };

        ModelStatus {
            kind: self.kind,
            state,
            last_trained_at: model.as_ref().map(|m| m.trained_at),
            sample_count: model.as_ref().map(|m| m.sample_count),
            accuracy: model.as_ref().and_then(|m| m.accuracy),
            run_id: model.as_ref().map(|m| m.run_id.clone()),
            source: model.as_ref().map(|m| m.source.clone()),
        }
    }

    fn run_training(
        &self,
        train: impl FnOnce() -> Result<TrainedModel, PredictorError>,
    ) -> Result<ModelStatus, PredictorError> {
        self.in_flight.store(true, Ordering::SeqCst);
        let in_flight = InFlight(&self.in_flight);

        let model = train()?;
        self.install(model)?;
        drop(in_flight);
        Ok(self.status())
    }

    /// Trains unless another run is already in flight, in which case it fails fast.
    pub fn try_train_with(
        &self,
        train: impl FnOnce() -> Result<TrainedModel, PredictorError>,
    ) -> Result<ModelStatus, PredictorError> {
        let _guard = self.lock_training()?;
        self.run_training(train)
    }

    /// Trains only when the slot is still empty after waiting for any run in flight.
    pub fn train_if_empty(
        &self,
        train: impl FnOnce() -> Result<TrainedModel, PredictorError>,
    ) -> Result<ModelStatus, PredictorError> {
        let _guard = self
            .training
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.current().is_some() {
            return Ok(self.status());
        }
        self.run_training(train)
    }
}

/// Owns every predictor the service can route to.
pub struct PredictorRegistry {
    rules: Arc<RuleBasedPredictor>,
    neural: Arc<ClassifierPredictor>,
    forest: Arc<ClassifierPredictor>,
    semantic: Result<Arc<SemanticPredictor>, PredictorError>,
    trainer: Arc<ModelTrainer>,
}

impl PredictorRegistry {
    /// Builds every predictor. Persisted classifiers are loaded from the model
    /// directory when present and compatible; otherwise their slots start untrained.
    pub fn new(catalog: Arc<CareerCatalog>, config: &RecommenderConfig) -> Self {
        let store = config.model_dir.clone().map(ModelStore::new);
        let trainer = Arc::new(ModelTrainer::new(
            catalog.clone(),
            config.training.clone(),
            store.clone(),
        ));
        let rules = Arc::new(RuleBasedPredictor::new(catalog.clone()));

        let slot_for = |kind: ModelKind| {
            let slot = Arc::new(ModelSlot::new(kind));
            if let Some(store) = &store {
                match store.load(kind) {
                    Ok(Some(model)) => {
                        info!(%kind, run_id = %model.run_id, "loaded persisted model");
                        if let Err(err) = slot.install(model) {
                            warn!(%kind, error = %err, "ignoring persisted model");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%kind, error = %err, "ignoring persisted model"),
                }
            }
            Arc::new(ClassifierPredictor::new(slot, trainer.clone(), rules.clone()))
        };
        let neural = slot_for(ModelKind::Neural);
        let forest = slot_for(ModelKind::Forest);

        let semantic = if config.semantic.enabled {
            create_embedder(&config.semantic.embedder, config.semantic.dimension)
                .and_then(|embedder| SemanticPredictor::new(catalog.clone(), embedder, rules.clone()))
                .map(Arc::new)
        } else {
            Err(PredictorError::Unavailable(
                "semantic predictor disabled".into(),
            ))
        };
        if let Err(err) = &semantic {
            warn!(error = %err, "semantic predictor unavailable");
        }

        Self {
            rules,
            neural,
            forest,
            semantic,
            trainer,
        }
    }

    pub fn predictor(&self, strategy: Strategy) -> Result<Arc<dyn Predictor>, PredictorError> {
        match strategy {
            Strategy::Neural => Ok(self.neural.clone()),
            Strategy::Forest => Ok(self.forest.clone()),
            Strategy::Semantic => self
                .semantic
                .as_ref()
                .map(|p| p.clone() as Arc<dyn Predictor>)
                .map_err(Clone::clone),
            Strategy::Rules => Ok(self.rules.clone()),
        }
    }

    pub fn rules(&self) -> Arc<RuleBasedPredictor> {
        self.rules.clone()
    }

    pub fn classifier(&self, kind: ModelKind) -> &Arc<ClassifierPredictor> {
        match kind {
            ModelKind::Neural => &self.neural,
            ModelKind::Forest => &self.forest,
        }
    }

    pub fn slot(&self, kind: ModelKind) -> &Arc<ModelSlot> {
        self.classifier(kind).slot()
    }

    pub fn trainer(&self) -> &Arc<ModelTrainer> {
        &self.trainer
    }

    pub fn statuses(&self) -> Vec<ModelStatus> {
        ModelKind::ALL
            .iter()
            .map(|kind| self.slot(*kind).status())
            .collect()
    }

    pub fn semantic_available(&self) -> bool {
        self.semantic.is_ok()
    }

    /// Convenience for callers that only need raw scores from one strategy.
    pub fn predict(
        &self,
        strategy: Strategy,
        input: &PredictionInput,
    ) -> Result<Vec<ScoredCareer>, PredictorError> {
        self.predictor(strategy)?.predict(input)
    }
}
