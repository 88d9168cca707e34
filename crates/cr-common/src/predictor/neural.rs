//! Single-hidden-layer perceptron with softmax output, trained by mini-batch SGD.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::PredictorError;
use crate::features::{FEATURE_DIM, FeatureVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralParams {
    pub hidden_units: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub l2: f64,
}

impl Default for NeuralParams {
    fn default() -> Self {
        Self {
            hidden_units: 32,
            epochs: 60,
            learning_rate: 0.05,
            batch_size: 32,
            l2: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    /// hidden x input
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    /// classes x hidden
    w2: Vec<Vec<f64>>,
    b2: Vec<f64>,
}

struct Gradients {
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<Vec<f64>>,
    b2: Vec<f64>,
}

impl Gradients {
    fn zeros(hidden: usize, classes: usize) -> Self {
        Self {
            w1: vec![vec![0.0; FEATURE_DIM]; hidden],
            b1: vec![0.0; hidden],
            w2: vec![vec![0.0; hidden]; classes],
            b2: vec![0.0; classes],
        }
    }
}

fn glorot<R: Rng + ?Sized>(rng: &mut R, fan_in: usize, fan_out: usize) -> f64 {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    rng.gen_range(-limit..limit)
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl NeuralNetwork {
    pub fn train<R: Rng + ?Sized>(
        samples: &[(FeatureVector, usize)],
        classes: usize,
        params: &NeuralParams,
        rng: &mut R,
    ) -> Result<Self, PredictorError> {
        if samples.is_empty() || classes == 0 {
            return Err(PredictorError::Training("no samples to train on".into()));
        }
        if let Some((_, label)) = samples.iter().find(|(_, label)| *label >= classes) {
            return Err(PredictorError::Training(format!(
                "label index {label} out of range for {classes} classes"
            )));
        }

        let hidden = params.hidden_units.max(1);
        let batch_size = params.batch_size.max(1);

        let mut network = Self {
            w1: (0..hidden)
                .map(|_| (0..FEATURE_DIM).map(|_| glorot(rng, FEATURE_DIM, hidden)).collect())
                .collect(),
            b1: vec![0.0; hidden],
            w2: (0..classes)
                .map(|_| (0..hidden).map(|_| glorot(rng, hidden, classes)).collect())
                .collect(),
            b2: vec![0.0; classes],
        };

        let mut order: Vec<usize> = (0..samples.len()).collect();
        for epoch in 0..params.epochs {
            order.shuffle(rng);
            let mut loss = 0.0;

            for batch in order.chunks(batch_size) {
                let mut grads = Gradients::zeros(hidden, classes);
                for &idx in batch {
                    let (features, label) = &samples[idx];
                    loss += network.accumulate(features, *label, &mut grads);
                }
                network.apply(&grads, batch.len(), params);
            }

            let mean_loss = loss / samples.len() as f64;
            if !mean_loss.is_finite() {
                return Err(PredictorError::Training(format!(
                    "loss diverged at epoch {epoch}"
                )));
            }
            tracing::trace!(epoch, mean_loss, "neural epoch finished");
        }

        Ok(network)
    }

    fn hidden_activations(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let pre: Vec<f64> = self
            .w1
            .iter()
            .zip(&self.b1)
            .map(|(row, b)| b + row.iter().zip(x).map(|(w, xi)| w * xi).sum::<f64>())
            .collect();
        let act = pre.iter().map(|v| v.max(0.0)).collect();
        (pre, act)
    }

    fn logits(&self, hidden: &[f64]) -> Vec<f64> {
        self.w2
            .iter()
            .zip(&self.b2)
            .map(|(row, b)| b + row.iter().zip(hidden).map(|(w, h)| w * h).sum::<f64>())
            .collect()
    }

    /// Adds this sample's gradients and returns its cross-entropy loss.
    fn accumulate(&self, features: &FeatureVector, label: usize, grads: &mut Gradients) -> f64 {
        let x = features.as_slice();
        let (pre, hidden) = self.hidden_activations(x);
        let probs = softmax(&self.logits(&hidden));

        let mut delta_out = probs.clone();
        delta_out[label] -= 1.0;

        for (k, delta) in delta_out.iter().enumerate() {
            grads.b2[k] += delta;
            for (j, h) in hidden.iter().enumerate() {
                grads.w2[k][j] += delta * h;
            }
        }

        for j in 0..hidden.len() {
            if pre[j] <= 0.0 {
                continue;
            }
            let delta_hidden: f64 = delta_out
                .iter()
                .enumerate()
                .map(|(k, delta)| self.w2[k][j] * delta)
                .sum();
            grads.b1[j] += delta_hidden;
            for (i, xi) in x.iter().enumerate() {
                grads.w1[j][i] += delta_hidden * xi;
            }
        }

        -probs[label].max(1e-12).ln()
    }

    fn apply(&mut self, grads: &Gradients, batch_len: usize, params: &NeuralParams) {
        let scale = params.learning_rate / batch_len as f64;
        let decay = params.learning_rate * params.l2;

        for (row, grow) in self.w1.iter_mut().zip(&grads.w1) {
            for (w, g) in row.iter_mut().zip(grow) {
                *w -= scale * g + decay * *w;
            }
        }
        for (b, g) in self.b1.iter_mut().zip(&grads.b1) {
            *b -= scale * g;
        }
        for (row, grow) in self.w2.iter_mut().zip(&grads.w2) {
            for (w, g) in row.iter_mut().zip(grow) {
                *w -= scale * g + decay * *w;
            }
        }
        for (b, g) in self.b2.iter_mut().zip(&grads.b2) {
            *b -= scale * g;
        }
    }

    /// Class probabilities summing to 1.
    pub fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        let (_, hidden) = self.hidden_activations(features.as_slice());
        softmax(&self.logits(&hidden))
    }

    pub fn classes(&self) -> usize {
        self.b2.len()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn separable_samples() -> Vec<(FeatureVector, usize)> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..200)
            .map(|i| {
                let label = i % 2;
                let mut f = [0.0; FEATURE_DIM];
                for v in f.iter_mut() {
                    *v = rng.gen_range(0.0..0.3);
                }
                f[8 + label] = rng.gen_range(0.8..1.0);
                (FeatureVector(f), label)
            })
            .collect()
    }

    #[test]
    fn learns_a_separable_problem() {
        let samples = separable_samples();
        let mut rng = StdRng::seed_from_u64(42);
        let params = NeuralParams {
            epochs: 100,
            learning_rate: 0.2,
            ..NeuralParams::default()
        };

        let net = NeuralNetwork::train(&samples, 2, &params, &mut rng).unwrap();

        let correct = samples
            .iter()
            .filter(|(f, label)| {
                let p = net.predict_proba(f);
                (p[1] > p[0]) == (*label == 1)
            })
            .count();
        assert!(correct as f64 / samples.len() as f64 > 0.9);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let samples = separable_samples();
        let mut rng = StdRng::seed_from_u64(1);
        let net = NeuralNetwork::train(&samples, 2, &NeuralParams::default(), &mut rng).unwrap();

        let p = net.predict_proba(&samples[0].0);

        assert_eq!(p.len(), 2);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let samples = separable_samples();
        let params = NeuralParams {
            epochs: 3,
            ..NeuralParams::default()
        };

        let a = NeuralNetwork::train(&samples, 2, &params, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = NeuralNetwork::train(&samples, 2, &params, &mut StdRng::seed_from_u64(9)).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let samples = vec![(FeatureVector([0.0; FEATURE_DIM]), 3)];

        let err = NeuralNetwork::train(&samples, 2, &NeuralParams::default(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();

        assert!(matches!(err, PredictorError::Training(_)));
    }
}
