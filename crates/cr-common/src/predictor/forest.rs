//! Bagged CART trees (Gini impurity, random feature subsets per split).

use rand::Rng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use super::PredictorError;
use crate::features::{FEATURE_DIM, FeatureVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features tried per split; `None` means `ceil(sqrt(FEATURE_DIM))`.
    pub max_features: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 8,
            min_samples_split: 4,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn distribution(&self, x: &[f64]) -> &[f64] {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    samples: &'a [(FeatureVector, usize)],
    classes: usize,
    params: &'a ForestParams,
    max_features: usize,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|c| {
            let p = *c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

impl TreeBuilder<'_> {
    fn counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes];
        for &i in indices {
            counts[self.samples[i].1] += 1;
        }
        counts
    }

    fn leaf(&self, counts: &[usize], total: usize) -> Node {
        let distribution = counts
            .iter()
            .map(|c| *c as f64 / total.max(1) as f64)
            .collect();
        Node::Leaf { distribution }
    }

    fn build<R: Rng + ?Sized>(&self, indices: &mut [usize], depth: usize, rng: &mut R) -> Node {
        let counts = self.counts(indices);
        let total = indices.len();
        let parent_impurity = gini(&counts, total);

        if depth >= self.params.max_depth
            || total < self.params.min_samples_split
            || parent_impurity == 0.0
        {
            return self.leaf(&counts, total);
        }

        let Some((feature, threshold, impurity)) = self.best_split(indices, rng) else {
            return self.leaf(&counts, total);
        };
        if impurity >= parent_impurity {
            return self.leaf(&counts, total);
        }

        let (mut left, mut right) =
            partition(indices, |i| self.samples[i].0.as_slice()[feature] <= threshold);
        if left.is_empty() || right.is_empty() {
            return self.leaf(&counts, total);
        }

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(&mut left, depth + 1, rng)),
            right: Box::new(self.build(&mut right, depth + 1, rng)),
        }
    }

    /// Best (feature, threshold, weighted child impurity) over a random feature subset.
    fn best_split<R: Rng + ?Sized>(
        &self,
        indices: &mut [usize],
        rng: &mut R,
    ) -> Option<(usize, f64, f64)> {
        let total = indices.len();
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in sample(rng, FEATURE_DIM, self.max_features).into_iter() {
            let value = |i: usize| self.samples[i].0.as_slice()[feature];
            indices.sort_by(|a, b| {
                value(*a)
                    .partial_cmp(&value(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left = vec![0usize; self.classes];
            let mut right = self.counts(indices);

            for pos in 0..total - 1 {
                let label = self.samples[indices[pos]].1;
                left[label] += 1;
                right[label] -= 1;

                let (current, next) = (value(indices[pos]), value(indices[pos + 1]));
                if current == next {
                    continue;
                }

                let n_left = pos + 1;
                let n_right = total - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / total as f64;

                if best.is_none_or(|(_, _, score)| impurity < score) {
                    best = Some((feature, (current + next) / 2.0, impurity));
                }
            }
        }

        best
    }
}

fn partition(indices: &[usize], goes_left: impl Fn(usize) -> bool) -> (Vec<usize>, Vec<usize>) {
    indices.iter().partition(|i| goes_left(**i))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Node>,
    classes: usize,
}

impl RandomForest {
    pub fn train<R: Rng + ?Sized>(
        samples: &[(FeatureVector, usize)],
        classes: usize,
        params: &ForestParams,
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

        let max_features = params
            .max_features
            .unwrap_or_else(|| (FEATURE_DIM as f64).sqrt().ceil() as usize)
            .clamp(1, FEATURE_DIM);
        let builder = TreeBuilder {
            samples,
            classes,
            params,
            max_features,
        };

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let mut bootstrap: Vec<usize> = (0..samples.len())
                    .map(|_| rng.gen_range(0..samples.len()))
                    .collect();
                builder.build(&mut bootstrap, 0, rng)
            })
            .collect();

        Ok(Self { trees, classes })
    }

    /// Mean of the leaf class distributions reached in every tree.
    pub fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        let mut votes = vec![0.0; self.classes];
        for tree in &self.trees {
            for (vote, p) in votes.iter_mut().zip(tree.distribution(features.as_slice())) {
                *vote += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        votes.into_iter().map(|v| v / n).collect()
    }

    pub fn classes(&self) -> usize {
        self.classes
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn threshold_samples() -> Vec<(FeatureVector, usize)> {
        let mut rng = StdRng::seed_from_u64(3);
        (0..300)
            .map(|_| {
                let mut f = [0.0; FEATURE_DIM];
                for v in f.iter_mut() {
                    *v = rng.gen_range(0.0..1.0);
                }
                let label = usize::from(f[9] > 0.5);
                (FeatureVector(f), label)
            })
            .collect()
    }

    #[test]
    fn fits_a_single_threshold() {
        let samples = threshold_samples();
        let forest = RandomForest::train(
            &samples,
            2,
            &ForestParams {
                max_features: Some(8),
                ..ForestParams::default()
            },
            &mut StdRng::seed_from_u64(11),
        )
        .unwrap();

        let mut high = [0.2; FEATURE_DIM];
        high[9] = 0.95;
        let mut low = [0.8; FEATURE_DIM];
        low[9] = 0.05;

        assert!(forest.predict_proba(&FeatureVector(high))[1] > 0.7);
        assert!(forest.predict_proba(&FeatureVector(low))[0] > 0.7);
    }

    #[test]
    fn distributions_sum_to_one() {
        let samples = threshold_samples();
        let forest = RandomForest::train(
            &samples,
            2,
            &ForestParams {
                n_trees: 5,
                ..ForestParams::default()
            },
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap();

        let p = forest.predict_proba(&samples[0].0);

        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pure_node_becomes_leaf() {
        let samples = vec![(FeatureVector([0.5; FEATURE_DIM]), 1); 10];
        let forest = RandomForest::train(
            &samples,
            3,
            &ForestParams {
                n_trees: 1,
                ..ForestParams::default()
            },
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        assert_eq!(
            forest.predict_proba(&samples[0].0),
            vec![0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn gini_of_even_split_is_half() {
        assert!((gini(&[5, 5], 10) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[4, 0], 4), 0.0);
    }
}
