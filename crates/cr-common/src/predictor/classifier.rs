use std::sync::Arc;

use super::registry::{ModelSlot, ModelStatus};
use super::{
    ModelTrainer, PredictionInput, Predictor, PredictorError, RuleBasedPredictor, ScoredCareer,
    SupportsRuleBasedFallback, SupportsTraining,
};

/// Serves whichever model currently sits in its slot.
pub struct ClassifierPredictor {
    slot: Arc<ModelSlot>,
    trainer: Arc<ModelTrainer>,
    rules: Arc<RuleBasedPredictor>,
}

impl ClassifierPredictor {
    pub fn new(
        slot: Arc<ModelSlot>,
        trainer: Arc<ModelTrainer>,
        rules: Arc<RuleBasedPredictor>,
    ) -> Self {
        Self {
            slot,
            trainer,
            rules,
        }
    }

    pub fn slot(&self) -> &Arc<ModelSlot> {
        &self.slot
    }
}

impl Predictor for ClassifierPredictor {
    fn name(&self) -> &'static str {
        self.slot.kind().name()
    }

    fn version(&self) -> String {
        self.slot
            .current()
            .map(|model| model.run_id.clone())
            .unwrap_or_else(|| "untrained".into())
    }

    fn predict(&self, input: &PredictionInput) -> Result<Vec<ScoredCareer>, PredictorError> {
        let model = self
            .slot
            .current()
            .ok_or(PredictorError::ModelNotTrained(self.slot.kind()))?;
        Ok(model.predict(&input.features()))
    }

    fn rule_fallback(&self) -> Option<&dyn SupportsRuleBasedFallback> {
        Some(self.rules.as_ref())
    }

    fn training(&self) -> Option<&dyn SupportsTraining> {
        Some(self)
    }
}

impl SupportsTraining for ClassifierPredictor {
    fn train_default(&self) -> Result<ModelStatus, PredictorError> {
        self.trainer.ensure_trained(&self.slot)
    }
}
