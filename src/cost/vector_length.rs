pub struct VectorLengthCost;

impl VectorLengthCost {
    /// Euclidean distance between the output and the target.
    pub fn cost(predicted: &[f64], expected: &[f64]) -> f64 {
        predicted.iter().zip(expected.iter())
            .map(|(p, y)| (p - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}
