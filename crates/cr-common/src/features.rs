use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profile::{Dimension, Intelligence, MbtiProfile, MiProfile};

pub const FEATURE_DIM: usize = 16;

/// Identifies the layout below. Persisted models carry it and are refused when
/// it differs; bump it whenever the ordering changes.
pub const FEATURE_LAYOUT_VERSION: &str = "mbti4-weights4-mi8/v1";

/// `[vector(4) | weights in axis order(4) | MI in canonical order(8)]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_DIM]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Pure and order-independent. Missing weights or MI types encode as 0.0;
    /// values are copied through without clamping.
    pub fn encode(
        &self,
        vector: [u8; 4],
        weights: &BTreeMap<Dimension, f64>,
        mi_scores: &BTreeMap<Intelligence, f64>,
    ) -> FeatureVector {
        let mut features = [0.0f64; FEATURE_DIM];

        for (slot, bit) in features[..4].iter_mut().zip(vector) {
            *slot = f64::from(bit);
        }
        for dimension in Dimension::ALL {
            features[4 + dimension.index()] = weights.get(&dimension).copied().unwrap_or(0.0);
        }
        for intelligence in Intelligence::ALL {
            features[8 + intelligence.index()] =
                mi_scores.get(&intelligence).copied().unwrap_or(0.0);
        }

        FeatureVector(features)
    }

    pub fn encode_profiles(&self, mbti: &MbtiProfile, mi: &MiProfile) -> FeatureVector {
        self.encode(mbti.vector(), mbti.weights(), mi.scores())
    }
}
