use crate::cost::{CrossEntropyCost, MseCost, VectorLengthCost};
use crate::error::{NetError, Result};
use crate::util::format_name;

/// Selects which cost function the training and test loops report.
///
/// - `MeanSquaredError`: mean of squared differences; the default.
/// - `CrossEntropy`: binary cross-entropy; pair with Sigmoid outputs.
/// - `VectorLength`: Euclidean distance between output and target.
/// - `Custom`: caller-supplied `f(predicted, expected)`.
#[derive(Debug, Clone, Copy)]
pub enum Cost {
    MeanSquaredError,
    CrossEntropy,
    VectorLength,
    Custom(fn(&[f64], &[f64]) -> f64),
}

impl Cost {
    pub fn from_name(name: &str) -> Result<Cost> {
        match format_name(name).as_str() {
            "meansquarederror" | "mse" => Ok(Cost::MeanSquaredError),
            "crossentropy" => Ok(Cost::CrossEntropy),
            "vectorlength" => Ok(Cost::VectorLength),
            other => Err(NetError::UnknownCost(other.to_string())),
        }
    }

    /// Scalar error of one sample.
    pub fn error(&self, predicted: &[f64], expected: &[f64]) -> f64 {
        match self {
            Cost::MeanSquaredError => MseCost::cost(predicted, expected),
            Cost::CrossEntropy => CrossEntropyCost::cost(predicted, expected),
            Cost::VectorLength => VectorLengthCost::cost(predicted, expected),
            Cost::Custom(f) => f(predicted, expected),
        }
    }
}
