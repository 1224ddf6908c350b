/// Max-norm constraint.
///
/// `norm` is the square root of the summed squared weights gathered during
/// the last apply step. Returns the factor every weight must be multiplied
/// by to bring the norm back to `bound`, or `None` when it is within bounds.
pub fn max_norm_scale(norm: f64, bound: f64) -> Option<f64> {
    if norm > bound {
        Some(bound / (1e-18 + norm))
    } else {
        None
    }
}
