use std::path::{Path, PathBuf};

use tracing::info;

use super::PredictorError;
use super::registry::{ModelKind, TrainedModel};
use crate::features::FEATURE_LAYOUT_VERSION;

/// One JSON file per classifier kind (`<dir>/<kind>.json`).
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.name()))
    }

    /// Writes to a temporary file first so readers never see a partial model.
    pub fn save(&self, model: &TrainedModel) -> Result<PathBuf, PredictorError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| PredictorError::Persistence(format!("create {}: {err}", self.dir.display())))?;

        let path = self.path_for(model.kind());
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(model).map_err(|err| PredictorError::Persistence(err.to_string()))?;
        std::fs::write(&tmp, body)
            .map_err(|err| PredictorError::Persistence(format!("write {}: {err}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|err| PredictorError::Persistence(format!("rename {}: {err}", path.display())))?;

        info!(kind = %model.kind(), path = %path.display(), run_id = %model.run_id, "persisted model");
        Ok(path)
    }

    /// Returns whether a file was removed.
    pub fn remove(&self, kind: ModelKind) -> Result<bool, PredictorError> {
        let path = self.path_for(kind);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(%kind, path = %path.display(), "removed persisted model");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(PredictorError::Persistence(format!(
                "remove {}: {err}",
                path.display()
            ))),
        }
    }

    /// `Ok(None)` when nothing was persisted for this kind.
    pub fn load(&self, kind: ModelKind) -> Result<Option<TrainedModel>, PredictorError> {
        let path = self.path_for(kind);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(PredictorError::Persistence(format!(
                    "read {}: {err}",
                    path.display()
                )));
            }
        };

        let model: TrainedModel = serde_json::from_slice(&raw).map_err(|err| {
            PredictorError::Persistence(format!("parse {}: {err}", path.display()))
        })?;

        if model.feature_layout != FEATURE_LAYOUT_VERSION {
            return Err(PredictorError::Persistence(format!(
                "{} uses feature layout {}, expected {FEATURE_LAYOUT_VERSION}",
                path.display(),
                model.feature_layout
            )));
        }
        if model.kind() != kind || model.classifier.classes() != model.labels.len() {
            return Err(PredictorError::Persistence(format!(
                "{} does not hold a consistent {kind} model",
                path.display()
            )));
        }

        Ok(Some(model))
    }
}
