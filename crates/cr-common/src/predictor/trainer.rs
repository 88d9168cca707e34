use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use super::PredictorError;
use super::forest::RandomForest;
use super::neural::NeuralNetwork;
use super::registry::{Classifier, ModelKind, ModelSlot, ModelStatus, TrainedModel};
use super::store::ModelStore;
use super::synthetic::{LabeledSample, SyntheticSource, TrainingSource};
use crate::catalog::CareerCatalog;
use crate::config::TrainingConfig;
use crate::features::{FEATURE_LAYOUT_VERSION, FeatureVector};
use crate::run_id;

const MIN_SAMPLES_FOR_HOLDOUT: usize = 10;

/// Builds classifiers from a [`TrainingSource`] against the catalog's career names.
pub struct ModelTrainer {
    catalog: Arc<CareerCatalog>,
    config: TrainingConfig,
    store: Option<ModelStore>,
}

impl ModelTrainer {
    pub fn new(catalog: Arc<CareerCatalog>, config: TrainingConfig, store: Option<ModelStore>) -> Self {
        Self {
            catalog,
            config,
            store,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&ModelStore> {
        self.store.as_ref()
    }

    pub fn default_source(&self) -> SyntheticSource {
        SyntheticSource::new(self.config.num_samples)
    }

    /// Trains a fresh model. Nothing shared is touched; callers decide whether to install it.
    pub fn train(
        &self,
        kind: ModelKind,
        source: &dyn TrainingSource,
        seed: Option<u64>,
    ) -> Result<TrainedModel, PredictorError> {
        let started = Instant::now();
        let labels = self.catalog.career_names();
        if labels.is_empty() {
            return Err(PredictorError::Training(
                "catalog has no careers to learn".into(),
            ));
        }

        let seed = seed.or(self.config.seed).unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut samples = source.load(&labels, &mut rng)?;
        if samples.is_empty() {
            return Err(PredictorError::Training(format!(
                "{} source produced no samples",
                source.name()
            )));
        }
        samples.shuffle(&mut rng);

        let label_index: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();
        let encoded: Vec<(FeatureVector, usize)> = samples
            .iter()
            .filter_map(|s| label_index.get(s.label.as_str()).map(|i| (s.features, *i)))
            .collect();

        let holdout = if encoded.len() >= MIN_SAMPLES_FOR_HOLDOUT {
            (encoded.len() as f64 * self.config.validation_fraction) as usize
        } else {
            0
        };
        let (validation, training) = encoded.split_at(holdout);

        let classifier = match kind {
            ModelKind::Neural => Classifier::Neural(NeuralNetwork::train(
                training,
                labels.len(),
                &self.config.neural,
                &mut rng,
            )?),
            ModelKind::Forest => Classifier::Forest(RandomForest::train(
                training,
                labels.len(),
                &self.config.forest,
                &mut rng,
            )?),
        };

        let mut model = TrainedModel {
            feature_layout: FEATURE_LAYOUT_VERSION.to_string(),
            labels,
            classifier,
            trained_at: Utc::now(),
            sample_count: training.len(),
            accuracy: None,
            run_id: run_id::generate(),
            source: source.name().to_string(),
        };
        if !validation.is_empty() {
            model.accuracy = Some(accuracy(&model, validation));
        }

        info!(
            %kind,
            seed,
            source = source.name(),
            samples = training.len(),
            holdout,
            accuracy = model.accuracy,
            run_id = %model.run_id,
            process_run_id = run_id::process(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trained model"
        );
        Ok(model)
    }

    fn train_and_persist(
        &self,
        kind: ModelKind,
        source: &dyn TrainingSource,
        seed: Option<u64>,
    ) -> Result<TrainedModel, PredictorError> {
        let model = self.train(kind, source, seed)?;
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&model) {
                warn!(%kind, error = %err, "trained model could not be persisted; serving from memory");
            }
        }
        Ok(model)
    }

    /// Explicit retraining; fails fast when the slot is already training.
    pub fn train_into(
        &self,
        slot: &ModelSlot,
        source: &dyn TrainingSource,
        seed: Option<u64>,
    ) -> Result<ModelStatus, PredictorError> {
        slot.try_train_with(|| self.train_and_persist(slot.kind(), source, seed))
    }

    /// First-use training on default synthetic data. A no-op once the slot holds a model.
    pub fn ensure_trained(&self, slot: &ModelSlot) -> Result<ModelStatus, PredictorError> {
        let source = self.default_source();
        slot.train_if_empty(|| self.train_and_persist(slot.kind(), &source, None))
    }

    /// Drops the serving model and any persisted copy so a restart starts untrained too.
    pub fn reset(&self, slot: &ModelSlot) -> Result<ModelStatus, PredictorError> {
        slot.reset_with(|| match &self.store {
            Some(store) => store.remove(slot.kind()).map(|_| ()),
            None => Ok(()),
        })
    }

    /// Share of samples whose most probable label matches.
    pub fn evaluate(model: &TrainedModel, samples: &[LabeledSample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .iter()
            .filter(|s| model.predict_label(&s.features) == Some(s.label.as_str()))
            .count();
        correct as f64 / samples.len() as f64
    }
}

fn accuracy(model: &TrainedModel, validation: &[(FeatureVector, usize)]) -> f64 {
    let correct = validation
        .iter()
        .filter(|(features, label)| {
            model.predict_label(features) == model.labels.get(*label).map(String::as_str)
        })
        .count();
    correct as f64 / validation.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::forest::ForestParams;
    use crate::predictor::neural::NeuralParams;

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            num_samples: 200,
            seed: Some(7),
            validation_fraction: 0.2,
            neural: NeuralParams {
                epochs: 5,
                ..NeuralParams::default()
            },
            forest: ForestParams {
                n_trees: 5,
                ..ForestParams::default()
            },
            riasec_path: None,
        }
    }

    fn trainer(store: Option<ModelStore>) -> ModelTrainer {
        ModelTrainer::new(Arc::new(CareerCatalog::with_defaults()), quick_config(), store)
    }

    #[test]
    fn trains_both_kinds_over_catalog_labels() {
        let trainer = trainer(None);

        for kind in ModelKind::ALL {
            let model = trainer.train(kind, &trainer.default_source(), None).unwrap();
            assert_eq!(model.kind(), kind);
            assert_eq!(model.labels.len(), 5);
            assert_eq!(model.sample_count, 160);
            assert!(model.accuracy.is_some());
            assert_eq!(model.source, "synthetic");
        }
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let trainer = trainer(None);

        let a = trainer.train(ModelKind::Forest, &trainer.default_source(), Some(3)).unwrap();
        let b = trainer.train(ModelKind::Forest, &trainer.default_source(), Some(3)).unwrap();

        assert_eq!(a.classifier, b.classifier);
    }

    #[test]
    fn empty_catalog_cannot_train() {
        let trainer = ModelTrainer::new(Arc::new(CareerCatalog::default()), quick_config(), None);

        let err = trainer
            .train(ModelKind::Neural, &trainer.default_source(), None)
            .unwrap_err();

        assert!(matches!(err, PredictorError::Training(_)));
    }

    #[test]
    fn persisted_model_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let trainer = trainer(Some(store.clone()));
        let slot = ModelSlot::new(ModelKind::Neural);

        trainer.ensure_trained(&slot).unwrap();
        let loaded = store.load(ModelKind::Neural).unwrap().unwrap();
        let serving = slot.current().unwrap();

        assert_eq!(loaded.run_id, serving.run_id);
        assert_eq!(loaded.labels, serving.labels);
        assert_eq!(loaded.classifier.classes(), 5);
        assert!(store.load(ModelKind::Forest).unwrap().is_none());
    }

    #[test]
    fn reset_removes_persisted_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let trainer = trainer(Some(store.clone()));
        let slot = ModelSlot::new(ModelKind::Forest);
        trainer.ensure_trained(&slot).unwrap();
        assert!(store.path_for(ModelKind::Forest).exists());

        let status = trainer.reset(&slot).unwrap();

        assert_eq!(status.state, crate::predictor::ModelState::Untrained);
        assert!(!store.path_for(ModelKind::Forest).exists());
        assert!(!store.remove(ModelKind::Forest).unwrap());
    }

    #[test]
    fn reset_during_training_keeps_persisted_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let trainer = trainer(Some(store.clone()));
        let slot = ModelSlot::new(ModelKind::Forest);
        trainer.ensure_trained(&slot).unwrap();

        let err = slot
            .try_train_with(|| {
                let err = trainer.reset(&slot).unwrap_err();
                assert_eq!(err, PredictorError::TrainingInProgress(ModelKind::Forest));
                Err(PredictorError::Training("aborted".into()))
            })
            .unwrap_err();

        assert_eq!(err, PredictorError::Training("aborted".into()));
        assert!(store.path_for(ModelKind::Forest).exists());
        assert_eq!(slot.status().state, crate::predictor::ModelState::Trained);
    }

    #[test]
    fn store_refuses_incompatible_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let trainer = trainer(None);
        let mut model = trainer
            .train(ModelKind::Forest, &trainer.default_source(), None)
            .unwrap();
        model.feature_layout = "legacy".into();
        store.save(&model).unwrap();

        assert!(matches!(
            store.load(ModelKind::Forest),
            Err(PredictorError::Persistence(_))
        ));
    }

    #[test]
    fn evaluate_reports_share_of_correct_labels() {
        let trainer = trainer(None);
        let model = trainer
            .train(ModelKind::Forest, &trainer.default_source(), None)
            .unwrap();
        let samples = vec![LabeledSample {
            features: FeatureVector([0.5; 16]),
            label: "not a career".into(),
        }];

        assert_eq!(ModelTrainer::evaluate(&model, &samples), 0.0);
    }
}
