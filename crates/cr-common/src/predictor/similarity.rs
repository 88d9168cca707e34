/// Raw cosine similarity in `[-1, 1]`; 0.0 for zero vectors or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let sim = cosine_similarity(&[1.0, 2.0, 0.0], &[1.0, 2.0, 0.0]);

        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);

        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vectors_and_mismatches_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
