use num::Float;

/// L2ノルム
/// ||a|| = sqrt(Σ(a_i^2))
///
/// # Arguments
/// * `values` - ベクトルの要素
#[inline]
pub fn l2_norm<N, I>(values: I) -> N
where
    N: Float,
    I: IntoIterator<Item = N>,
{
    values
        .into_iter()
        .fold(N::zero(), |acc, v| acc + v * v)
        .sqrt()
}

/// Gaussian penalty on a length difference
/// exp(-(delta^2) / (2 * sigma^2))
///
/// Returns 1.0 when `delta` is zero and decays towards 0.0 as it grows.
#[inline]
pub fn gaussian_penalty<N: Float>(delta: N, sigma: N) -> N {
    let two = N::one() + N::one();
    (-(delta * delta) / (two * sigma * sigma)).exp()
}

/// Arithmetic mean, 0.0 for an empty slice
#[inline]
pub fn mean<N: Float>(values: &[N]) -> N {
    if values.is_empty() {
        return N::zero();
    }
    let sum = values.iter().fold(N::zero(), |acc, &v| acc + v);
    // len は usize なので from で変換、失敗はしない想定
    sum / N::from(values.len()).unwrap_or_else(N::one)
}

/// Population standard deviation, 0.0 for an empty slice
#[inline]
pub fn std_dev<N: Float>(values: &[N]) -> N {
    if values.is_empty() {
        return N::zero();
    }
    let m = mean(values);
    let var: Vec<N> = values.iter().map(|&v| (v - m) * (v - m)).collect();
    mean(&var).sqrt()
}
