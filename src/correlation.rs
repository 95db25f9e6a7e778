//! Similarity measures between chroma vectors and templates.

/// Normalized cross-correlation (Pearson coefficient) of two equal-length
/// vectors. `None` when either side has zero variance.
pub fn pearson(a: &[f32], b: &[f32]) -> Option<f32> {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len().min(b.len());
    if n == 0 {
        return None;
    }
    let mean_a = a[..n].iter().sum::<f32>() / n as f32;
    let mean_b = b[..n].iter().sum::<f32>() / n as f32;

    let (mut cov, mut var_a, mut var_b) = (0.0f32, 0.0f32, 0.0f32);
    for (&x, &y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    (denom > f32::EPSILON).then_some(cov / denom)
}

/// Weighted dot product normalized by the weighted magnitudes of both
/// vectors. `None` when either magnitude is zero.
pub fn weighted_cosine(a: &[f32], b: &[f32], weights: &[f32]) -> Option<f32> {
    debug_assert!(a.len() == b.len() && b.len() == weights.len());
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for ((&x, &y), &w) in a.iter().zip(b).zip(weights) {
        dot += w * x * y;
        norm_a += w * x * x;
        norm_b += w * y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    (denom > f32::EPSILON).then_some(dot / denom)
}
