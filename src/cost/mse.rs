pub struct MseCost;

impl MseCost {
    /// Scalar MSE: mean((predicted - expected)²)
    pub fn cost(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n
    }
}
