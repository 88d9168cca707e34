use std::str::FromStr;
use std::time::Instant;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::{info, warn};

use cr_common::PredictorError;
use cr_common::predictor::riasec::RiasecSource;
use cr_common::predictor::synthetic::{SyntheticSource, TrainingSource};
use cr_common::predictor::{ModelKind, ModelStatus};
use cr_metrics::TrainingOutcome;

use super::join_error;
use crate::SharedState;
use crate::error::ApiError;
use crate::extract::ApiQuery;

/// Where training samples come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    #[default]
    Synthetic,
    /// The RIASEC export at `CR_RIASEC_PATH`; `num_samples` caps the rows used.
    Riasec,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrainQuery {
    pub num_samples: Option<usize>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub source: SampleSource,
}

fn parse_kind(raw: &str) -> Result<ModelKind, ApiError> {
    ModelKind::from_str(raw.trim())
        .map_err(|_| ApiError::NotFound(format!("unknown model kind '{raw}'")))
}

pub async fn status(State(state): State<SharedState>) -> Json<Vec<ModelStatus>> {
    Json(state.registry().statuses())
}

pub async fn train(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    ApiQuery(query): ApiQuery<TrainQuery>,
) -> Result<Json<ModelStatus>, ApiError> {
    let kind = parse_kind(&kind)?;
    if let Some(requested) = query.num_samples {
        if requested == 0 || requested > state.config.max_training_samples {
            return Err(ApiError::BadRequest(format!(
                "num_samples must be between 1 and {}",
                state.config.max_training_samples
            )));
        }
    }

    let source: Box<dyn TrainingSource> = match query.source {
        SampleSource::Synthetic => Box::new(SyntheticSource::new(
            query
                .num_samples
                .unwrap_or(state.recommender.training.num_samples),
        )),
        SampleSource::Riasec => {
            let path = state.recommender.training.riasec_path.clone().ok_or_else(|| {
                ApiError::ServiceUnavailable("RIASEC training needs CR_RIASEC_PATH".into())
            })?;
            Box::new(RiasecSource::new(path).with_sample_size(query.num_samples))
        }
    };
    let num_samples = query.num_samples;

    let registry = state.registry().clone();
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || {
        registry
            .trainer()
            .train_into(registry.slot(kind), source.as_ref(), query.seed)
    })
    .await
    .map_err(join_error)?;

    let outcome = match &result {
        Ok(_) => TrainingOutcome::Trained,
        Err(PredictorError::TrainingInProgress(_)) => TrainingOutcome::Rejected,
        Err(_) => TrainingOutcome::Failed,
    };
    cr_metrics::record_training(kind.name(), outcome, started.elapsed());

    let status = result.inspect_err(|err| {
        warn!(%kind, error = %err, "training request failed");
    })?;
    if let Some(accuracy) = status.accuracy {
        cr_metrics::record_model_accuracy(kind.name(), accuracy);
    }
    info!(
        %kind,
        run_id = ?status.run_id,
        source = ?status.source,
        num_samples,
        "model retrained"
    );

    Ok(Json(status))
}

pub async fn reset(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> Result<Json<ModelStatus>, ApiError> {
    let kind = parse_kind(&kind)?;
    let registry = state.registry().clone();

    let status = tokio::task::spawn_blocking(move || registry.trainer().reset(registry.slot(kind)))
        .await
        .map_err(join_error)??;
    info!(%kind, "model reset");

    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use cr_common::predictor::ModelState;

    use super::*;
    use crate::test_state;

    #[tokio::test]
    async fn train_then_reset_cycles_state() {
        let state = test_state();

        let Json(trained) = train(
            State(state.clone()),
            Path("forest".into()),
            ApiQuery(TrainQuery {
                num_samples: Some(150),
                seed: Some(3),
                ..TrainQuery::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(trained.state, ModelState::Trained);
        assert_eq!(trained.kind, ModelKind::Forest);

        let Json(after) = reset(State(state.clone()), Path("forest".into()))
            .await
            .unwrap();
        assert_eq!(after.state, ModelState::Untrained);
    }

    #[tokio::test]
    async fn unknown_kind_is_not_found() {
        let result = train(
            State(test_state()),
            Path("svm".into()),
            ApiQuery(TrainQuery::default()),
        )
        .await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn oversized_sample_count_is_rejected() {
        let result = train(
            State(test_state()),
            Path("neural".into()),
            ApiQuery(TrainQuery {
                num_samples: Some(10_000_000),
                ..TrainQuery::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    fn riasec_export(dir: &std::path::Path) -> std::path::PathBuf {
        let mut columns: Vec<String> = ["R", "I", "A", "S", "E", "C"]
            .iter()
            .flat_map(|letter| (1..=8).map(move |i| format!("{letter}{i}")))
            .collect();
        columns.extend((1..=10).map(|i| format!("TIPI{i}")));

        let mut body = columns.join(",");
        for (levels, tipi) in [([4, 5, 1, 1, 3, 1], 5), ([1, 3, 5, 4, 1, 1], 3)].repeat(20) {
            let answers: Vec<String> = levels
                .iter()
                .flat_map(|level: &u8| std::iter::repeat_n(level.to_string(), 8))
                .chain(std::iter::repeat_n(tipi.to_string(), 10))
                .collect();
            body.push('\n');
            body.push_str(&answers.join(","));
        }

        let path = dir.join("riasec.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn riasec_training_uses_configured_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::test_recommender_config();
        config.training.riasec_path = Some(riasec_export(dir.path()));
        let state = crate::test_state_with(config);

        let Json(trained) = train(
            State(state),
            Path("forest".into()),
            ApiQuery(TrainQuery {
                source: SampleSource::Riasec,
                ..TrainQuery::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(trained.state, ModelState::Trained);
        assert_eq!(trained.source.as_deref(), Some("riasec"));
        assert_eq!(trained.sample_count, Some(32));
    }

    #[tokio::test]
    async fn riasec_training_without_export_is_unavailable() {
        let result = train(
            State(test_state()),
            Path("forest".into()),
            ApiQuery(TrainQuery {
                source: SampleSource::Riasec,
                ..TrainQuery::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::ServiceUnavailable(_))));
    }
}
