/// Compute the inner product of two vectors.
///
/// For unit-norm vectors this equals the cosine similarity: a value in
/// `[-1, 1]` where 1 means identical direction.
///
/// Uses f64 intermediate precision. Returns -1.0 (worst possible
/// similarity) on a length mismatch; callers are expected to have
/// dimension-checked already.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return -1.0;
    }

    let mut sum: f64 = 0.0;
    for i in 0..a.len() {
        sum += a[i] as f64 * b[i] as f64;
    }

    // Clamp to [-1, 1] to absorb floating point drift on unit vectors.
    sum.clamp(-1.0, 1.0) as f32
}

/// Inner-product distance: `1 - dot(a, b)`, in `[0, 2]` for unit-norm
/// inputs. Lower means more similar. This is the ordering the HNSW graph
/// traversal works with.
pub fn ip_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        let s = dot(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((s - 1.0).abs() < 0.001, "identical: got {s}");
    }

    #[test]
    fn test_orthogonal() {
        let s = dot(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(s.abs() < 0.001, "orthogonal: got {s}");
    }

    #[test]
    fn test_opposite() {
        let s = dot(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]);
        assert!((s + 1.0).abs() < 0.001, "opposite: got {s}");
    }

    #[test]
    fn test_distance_ordering() {
        let q = [1.0, 0.0];
        let near = [0.95, 0.312_25];
        let far = [0.0, 1.0];
        assert!(ip_distance(&q, &near) < ip_distance(&q, &far));
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(dot(&[1.0, 0.0], &[1.0, 0.0, 0.0]), -1.0);
    }
}
