//! Training data sources.
//!
//! `SyntheticSource` is the bootstrap generator used until real labelled data
//! exists; `JsonDatasetSource` reads labelled profiles exported from elsewhere.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::PredictorError;
use crate::features::{FeatureEncoder, FeatureVector};
use crate::profile::{Dimension, Intelligence};

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: String,
}

pub trait TrainingSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Samples labelled with names from `careers`.
    fn load(&self, careers: &[String], rng: &mut StdRng) -> Result<Vec<LabeledSample>, PredictorError>;
}

/// Balanced random profiles with hand-tuned trait/career correlations.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    pub num_samples: usize,
}

impl SyntheticSource {
    pub fn new(num_samples: usize) -> Self {
        Self { num_samples }
    }

    fn mi_score(
        intelligence: Intelligence,
        career: &str,
        vector: &[u8; 4],
        rng: &mut StdRng,
    ) -> f64 {
        let boosted = |careers: &[&str]| careers.contains(&career);
        let thinking = vector[Dimension::TF.index()] == 0;
        let extravert = vector[Dimension::EI.index()] == 0;

        let range = match intelligence {
            Intelligence::LogMath if thinking => 0.7..1.0,
            Intelligence::Inter if extravert => 0.7..1.0,
            Intelligence::Lin
                if boosted(&["Ciencia de Datos", "Ingeniería en Sistemas Computacionales"]) =>
            {
                0.7..1.0
            }
            Intelligence::Spa if boosted(&["Ingeniería Aeroespacial", "Física de Materiales"]) => {
                0.7..1.0
            }
            Intelligence::Nat
                if boosted(&["Ingeniería Ambiental", "Oceanografía", "Geología"]) =>
            {
                0.8..1.0
            }
            Intelligence::BodKin
                if boosted(&["Ingeniería Mecatrónica", "Ingeniería en Robótica"]) =>
            {
                0.7..1.0
            }
            Intelligence::Intra
                if !extravert && boosted(&["Neurociencias", "Bioinformática"]) =>
            {
                0.7..1.0
            }
            _ => 0.2..0.8,
        };
        rng.gen_range(range)
    }
}

impl TrainingSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn load(&self, careers: &[String], rng: &mut StdRng) -> Result<Vec<LabeledSample>, PredictorError> {
        if careers.is_empty() {
            return Err(PredictorError::Training(
                "cannot generate samples without careers".into(),
            ));
        }

        let per_career = self.num_samples / careers.len();
        let remainder = self.num_samples % careers.len();
        let mut samples = Vec::with_capacity(self.num_samples);

        for (career_index, career) in careers.iter().enumerate() {
            let count = per_career + usize::from(career_index < remainder);
            for _ in 0..count {
                let vector: [u8; 4] = std::array::from_fn(|_| rng.gen_range(0..=1));
                let weights: BTreeMap<Dimension, f64> = Dimension::ALL
                    .into_iter()
                    .map(|d| (d, rng.gen_range(0.5..1.0)))
                    .collect();
                let mi: BTreeMap<Intelligence, f64> = Intelligence::ALL
                    .into_iter()
                    .map(|i| (i, Self::mi_score(i, career, &vector, rng)))
                    .collect();

                samples.push(LabeledSample {
                    features: FeatureEncoder.encode(vector, &weights, &mi),
                    label: career.clone(),
                });
            }
        }

        samples.shuffle(rng);
        info!(
            samples = samples.len(),
            careers = careers.len(),
            "generated synthetic training data"
        );
        Ok(samples)
    }
}

/// One labelled row of an exported dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub mbti_vector: Vec<u8>,
    pub mbti_weights: BTreeMap<String, f64>,
    pub mi_scores: BTreeMap<String, f64>,
    pub career_label: String,
}

impl DatasetRow {
    fn features(&self) -> Result<FeatureVector, String> {
        let vector: [u8; 4] = self
            .mbti_vector
            .as_slice()
            .try_into()
            .map_err(|_| format!("mbti_vector must have 4 entries, got {}", self.mbti_vector.len()))?;
        if vector.iter().any(|bit| *bit > 1) {
            return Err(format!("mbti_vector must be 0/1, got {vector:?}"));
        }

        let weights = self
            .mbti_weights
            .iter()
            .map(|(k, v)| Dimension::parse(k).map(|d| (d, *v)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(|err| err.to_string())?;
        let mi = self
            .mi_scores
            .iter()
            .map(|(k, v)| Intelligence::parse(k).map(|i| (i, *v)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(|err| err.to_string())?;

        Ok(FeatureEncoder.encode(vector, &weights, &mi))
    }
}

/// JSON array of [`DatasetRow`]s. Rows labelled with unknown careers are skipped.
#[derive(Debug, Clone)]
pub struct JsonDatasetSource {
    pub path: PathBuf,
}

impl JsonDatasetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TrainingSource for JsonDatasetSource {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load(&self, careers: &[String], _rng: &mut StdRng) -> Result<Vec<LabeledSample>, PredictorError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| {
            PredictorError::Training(format!("failed to read {}: {err}", self.path.display()))
        })?;
        let rows: Vec<DatasetRow> = serde_json::from_str(&raw).map_err(|err| {
            PredictorError::Training(format!("failed to parse {}: {err}", self.path.display()))
        })?;

        let mut samples = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (line, row) in rows.iter().enumerate() {
            if !careers.contains(&row.career_label) {
                skipped += 1;
                continue;
            }
            let features = row.features().map_err(|err| {
                PredictorError::Training(format!("row {line}: {err}"))
            })?;
            samples.push(LabeledSample {
                features,
                label: row.career_label.clone(),
            });
        }

        if skipped > 0 {
            warn!(skipped, path = %self.path.display(), "skipped rows with careers outside the catalog");
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn careers() -> Vec<String> {
        crate::CareerCatalog::with_defaults().career_names()
    }

    #[test]
    fn synthetic_data_is_balanced_across_careers() {
        let samples = SyntheticSource::new(1002)
            .load(&careers(), &mut StdRng::seed_from_u64(1))
            .unwrap();

        assert_eq!(samples.len(), 1002);
        let count = |name: &str| samples.iter().filter(|s| s.label == name).count();
        assert_eq!(count("Ingeniería en Biotecnología"), 201);
        assert_eq!(count("Ciencia de Datos"), 201);
        assert_eq!(count("Ingeniería Ambiental"), 200);
    }

    #[test]
    fn synthetic_data_respects_correlations() {
        let samples = SyntheticSource::new(500)
            .load(&careers(), &mut StdRng::seed_from_u64(2))
            .unwrap();

        for sample in &samples {
            let f = sample.features.as_slice();
            assert!(f[..4].iter().all(|v| *v == 0.0 || *v == 1.0));
            assert!(f[4..8].iter().all(|v| (0.5..1.0).contains(v)));
            if f[2] == 0.0 {
                assert!(f[8 + Intelligence::LogMath.index()] >= 0.7);
            }
            if sample.label == "Ingeniería Ambiental" {
                assert!(f[8 + Intelligence::Nat.index()] >= 0.8);
            }
        }
    }

    #[test]
    fn same_seed_gives_same_samples() {
        let a = SyntheticSource::new(50)
            .load(&careers(), &mut StdRng::seed_from_u64(3))
            .unwrap();
        let b = SyntheticSource::new(50)
            .load(&careers(), &mut StdRng::seed_from_u64(3))
            .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn json_dataset_skips_unknown_careers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let rows = vec![
            DatasetRow {
                mbti_vector: vec![1, 1, 0, 0],
                mbti_weights: BTreeMap::from([("E/I".to_string(), 0.8)]),
                mi_scores: BTreeMap::from([("LogMath".to_string(), 0.9)]),
                career_label: "Ciencia de Datos".into(),
            },
            DatasetRow {
                mbti_vector: vec![0, 0, 0, 0],
                mbti_weights: BTreeMap::new(),
                mi_scores: BTreeMap::new(),
                career_label: "Astronomía".into(),
            },
        ];
        std::fs::write(&path, serde_json::to_string(&rows).unwrap()).unwrap();

        let samples = JsonDatasetSource::new(&path)
            .load(&careers(), &mut StdRng::seed_from_u64(0))
            .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].features.as_slice()[4], 0.8);
        assert_eq!(samples[0].features.as_slice()[9], 0.9);
    }

    #[test]
    fn json_dataset_rejects_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let rows = vec![DatasetRow {
            mbti_vector: vec![1, 1, 0, 0],
            mbti_weights: BTreeMap::new(),
            mi_scores: BTreeMap::from([("Cooking".to_string(), 0.9)]),
            career_label: "Ciencia de Datos".into(),
        }];
        std::fs::write(&path, serde_json::to_string(&rows).unwrap()).unwrap();

        let err = JsonDatasetSource::new(&path)
            .load(&careers(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();

        assert!(matches!(err, PredictorError::Training(_)));
    }
}
