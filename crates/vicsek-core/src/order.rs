//! Global alignment diagnostic.

/// Weighted polar order parameter `|sum w_j (cos, sin)| / sum w_j` in `[0, 1]`.
///
/// Returns 0 when the total weight is zero.
pub fn order_parameter(headings: &[f64], weights: &[f64]) -> f64 {
    debug_assert_eq!(headings.len(), weights.len());
    weighted_order_parameter(headings.iter().copied().zip(weights.iter().copied()))
}

/// [`order_parameter`] over `(heading, weight)` pairs.
pub fn weighted_order_parameter(pairs: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let mut cos = 0.0;
    let mut sin = 0.0;
    let mut total = 0.0;
    for (heading, weight) in pairs {
        let (s, c) = heading.sin_cos();
        cos += weight * c;
        sin += weight * s;
        total += weight;
    }
    if total <= 0.0 {
        return 0.0;
    }
    (cos.hypot(sin) / total).clamp(0.0, 1.0)
}

/// Unweighted order parameter.
pub fn order_parameter_uniform(headings: &[f64]) -> f64 {
    if headings.is_empty() {
        return 0.0;
    }
    let (cos, sin) = headings.iter().fold((0.0, 0.0), |(c, s), h| {
        let (hs, hc) = h.sin_cos();
        (c + hc, s + hs)
    });
    (cos.hypot(sin) / headings.len() as f64).clamp(0.0, 1.0)
}
