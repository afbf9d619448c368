//! Math utility functions

/// Compute Euclidean distance between two vectors.
///
/// Mismatched lengths yield `f32::MAX` so the pair can never win a scan.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
