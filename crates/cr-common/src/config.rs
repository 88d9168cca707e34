use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::predictor::forest::ForestParams;
use crate::predictor::neural::NeuralParams;
use crate::profile::mi::DEFAULT_MAX_SCORE;

pub const DEFAULT_TOP_N: usize = 3;
pub const DEFAULT_TRAINING_SAMPLES: usize = 1000;

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse::<T>().ok())
}

fn parse_env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().map(|value| {
        let value = value.trim();
        value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
    })
}

fn parse_env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub num_samples: usize,
    /// Fixed seed for reproducible runs; random when unset.
    pub seed: Option<u64>,
    /// Share of samples held out to measure accuracy.
    pub validation_fraction: f64,
    pub neural: NeuralParams,
    pub forest: ForestParams,
    /// RIASEC questionnaire export used when training is asked for real data.
    pub riasec_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_samples: DEFAULT_TRAINING_SAMPLES,
            seed: None,
            validation_fraction: 0.2,
            neural: NeuralParams::default(),
            forest: ForestParams::default(),
            riasec_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticConfig {
    pub enabled: bool,
    pub embedder: String,
    pub dimension: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embedder: "hash".into(),
            dimension: 256,
        }
    }
}

/// Engine knobs, read from `CR_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderConfig {
    pub default_top_n: usize,
    pub mi_max_score: f64,
    pub training: TrainingConfig,
    pub semantic: SemanticConfig,
    /// Directory for persisted classifiers; models live in memory only when unset.
    pub model_dir: Option<PathBuf>,
    /// JSON catalog; the built-in five careers are used when unset.
    pub catalog_path: Option<PathBuf>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            default_top_n: DEFAULT_TOP_N,
            mi_max_score: DEFAULT_MAX_SCORE,
            training: TrainingConfig::default(),
            semantic: SemanticConfig::default(),
            model_dir: None,
            catalog_path: None,
        }
    }
}

impl RecommenderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let neural = NeuralParams {
            hidden_units: parse_env("CR_NN_HIDDEN_UNITS").unwrap_or(defaults.training.neural.hidden_units),
            epochs: parse_env("CR_NN_EPOCHS").unwrap_or(defaults.training.neural.epochs),
            learning_rate: parse_env("CR_NN_LEARNING_RATE")
                .filter(|v: &f64| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.training.neural.learning_rate),
            batch_size: parse_env("CR_NN_BATCH_SIZE").unwrap_or(defaults.training.neural.batch_size),
            l2: defaults.training.neural.l2,
        };
        let forest = ForestParams {
            n_trees: parse_env("CR_FOREST_TREES").unwrap_or(defaults.training.forest.n_trees),
            max_depth: parse_env("CR_FOREST_MAX_DEPTH").unwrap_or(defaults.training.forest.max_depth),
            min_samples_split: defaults.training.forest.min_samples_split,
            max_features: parse_env("CR_FOREST_MAX_FEATURES"),
        };

        Self {
            default_top_n: parse_env("CR_DEFAULT_TOP_N")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.default_top_n),
            mi_max_score: parse_env("CR_MI_MAX_SCORE")
                .filter(|v: &f64| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.mi_max_score),
            training: TrainingConfig {
                num_samples: parse_env("CR_TRAINING_SAMPLES")
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(defaults.training.num_samples),
                seed: parse_env("CR_TRAINING_SEED"),
                validation_fraction: parse_env("CR_VALIDATION_FRACTION")
                    .filter(|v: &f64| (0.0..0.9).contains(v))
                    .unwrap_or(defaults.training.validation_fraction),
                neural,
                forest,
                riasec_path: parse_env_path("CR_RIASEC_PATH"),
            },
            semantic: SemanticConfig {
                enabled: parse_env_bool("CR_SEMANTIC_ENABLED").unwrap_or(defaults.semantic.enabled),
                embedder: env::var("CR_EMBEDDER").unwrap_or(defaults.semantic.embedder),
                dimension: parse_env("CR_EMBEDDING_DIMENSION").unwrap_or(defaults.semantic.dimension),
            },
            model_dir: parse_env_path("CR_MODEL_DIR"),
            catalog_path: parse_env_path("CR_CATALOG_PATH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn with_envs(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = ENV_GUARD.lock().unwrap();

        let previous: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(var, value)| {
                let old = env::var(var).ok();
                match value {
                    Some(v) => unsafe { env::set_var(var, v) },
                    None => unsafe { env::remove_var(var) },
                }
                (*var, old)
            })
            .collect();

        f();

        for (var, previous_value) in previous {
            match previous_value {
                Some(v) => unsafe { env::set_var(var, v) },
                None => unsafe { env::remove_var(var) },
            }
        }
    }

    #[test]
    fn reads_overrides_from_env() {
        with_envs(
            &[
                ("CR_DEFAULT_TOP_N", Some("5")),
                ("CR_TRAINING_SAMPLES", Some("250")),
                ("CR_TRAINING_SEED", Some("42")),
                ("CR_SEMANTIC_ENABLED", Some("false")),
                ("CR_MODEL_DIR", Some("/tmp/cr-models")),
                ("CR_RIASEC_PATH", Some("/data/riasec.csv")),
            ],
            || {
                let cfg = RecommenderConfig::from_env();
                assert_eq!(cfg.default_top_n, 5);
                assert_eq!(cfg.training.num_samples, 250);
                assert_eq!(cfg.training.seed, Some(42));
                assert!(!cfg.semantic.enabled);
                assert_eq!(cfg.model_dir, Some(PathBuf::from("/tmp/cr-models")));
                assert_eq!(cfg.training.riasec_path, Some(PathBuf::from("/data/riasec.csv")));
            },
        );
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        with_envs(
            &[
                ("CR_DEFAULT_TOP_N", Some("0")),
                ("CR_MI_MAX_SCORE", Some("-3")),
                ("CR_TRAINING_SAMPLES", Some("lots")),
            ],
            || {
                let cfg = RecommenderConfig::from_env();
                assert_eq!(cfg.default_top_n, DEFAULT_TOP_N);
                assert_eq!(cfg.mi_max_score, DEFAULT_MAX_SCORE);
                assert_eq!(cfg.training.num_samples, DEFAULT_TRAINING_SAMPLES);
            },
        );
    }
}
