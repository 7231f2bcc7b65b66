/// Random L2-normalized vector for index tests.
pub(crate) fn rand_unit_vec(rng: &mut impl rand::Rng, dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim).map(|_| rng.r#gen::<f32>() - 0.5).collect();
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.into_iter().map(|x| x / norm as f32).collect()
    } else {
        v
    }
}
