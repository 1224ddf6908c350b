use serde::{Deserialize, Serialize};

/// One data point: an input vector and its target.
///
/// The target may be given under either `expected` or `output`; `expected`
/// wins when both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<f64>>,
}

impl Record {
    pub fn new(input: Vec<f64>, expected: Vec<f64>) -> Record {
        Record {
            input: Some(input),
            expected: Some(expected),
            output: None,
        }
    }

    pub fn target(&self) -> Option<&[f64]> {
        self.expected.as_deref().or(self.output.as_deref())
    }

    /// `(input, target)`, or `None` when either key is missing.
    pub fn parts(&self) -> Option<(&[f64], &[f64])> {
        Some((self.input.as_deref()?, self.target()?))
    }
}
