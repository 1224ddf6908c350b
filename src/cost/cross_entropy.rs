/// Binary cross-entropy averaged over the output neurons.
pub struct CrossEntropyCost;

/// Keeps the logarithms finite when an output saturates at 0 or 1.
const EPS: f64 = 1e-15;

impl CrossEntropyCost {
    /// -mean(y·ln(p + ε) + (1 - y)·ln(1 + ε - p))
    pub fn cost(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        -predicted.iter().zip(expected.iter())
            .map(|(p, y)| y * (p + EPS).ln() + (1.0 - y) * (1.0 + EPS - p).ln())
            .sum::<f64>() / n
    }
}
