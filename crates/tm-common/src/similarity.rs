use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimilarityError {
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Raw cosine similarity in [-1.0, 1.0].
///
/// Vectors of unequal length are a caller error and never silently
/// truncated. A zero vector on either side yields 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Cosine similarity mapped onto the [0.0, 1.0] ranking scale used across
/// the whole pipeline. Managed-index scores arrive on the same scale, so
/// both search paths stay comparable.
pub fn normalized_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    Ok((cosine_similarity(a, b)? + 1.0) / 2.0)
}
