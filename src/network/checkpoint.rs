use serde::{Deserialize, Serialize};

/// Weight state of a whole network, one entry per layer in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub layers: Vec<LayerSnapshot>,
}

/// Weight state of one layer: one unit per neuron (fully-connected) or per
/// filter (convolutional). The input layer serialises as an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub weights: Vec<UnitSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub bias: f64,
    pub weights: UnitWeights,
}

/// A neuron's incoming weights, or a filter's `[channel][row][col]` kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitWeights {
    Flat(Vec<f64>),
    Volume(Vec<Vec<Vec<f64>>>),
}

impl UnitWeights {
    pub fn len(&self) -> usize {
        match self {
            UnitWeights::Flat(w) => w.len(),
            UnitWeights::Volume(v) => v.iter().flatten().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All weights in row-major order.
    pub fn flatten(&self) -> Vec<f64> {
        match self {
            UnitWeights::Flat(w) => w.clone(),
            UnitWeights::Volume(v) => v.iter().flatten().flatten().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_weights_parse_either_shape() {
        let flat: UnitSnapshot = serde_json::from_str(r#"{"bias": 0.5, "weights": [1, 2]}"#).unwrap();
        assert_eq!(flat.weights, UnitWeights::Flat(vec![1.0, 2.0]));

        let volume: UnitSnapshot =
            serde_json::from_str(r#"{"bias": 0, "weights": [[[1, 2], [3, 4]]]}"#).unwrap();
        assert_eq!(volume.weights.len(), 4);
        assert_eq!(volume.weights.flatten(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn snapshot_shape_is_layers_of_units() {
        let snapshot = NetworkSnapshot {
            layers: vec![
                LayerSnapshot::default(),
                LayerSnapshot {
                    weights: vec![UnitSnapshot { bias: 1.0, weights: UnitWeights::Flat(vec![0.25]) }],
                },
            ],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"layers":[{"weights":[]},{"weights":[{"bias":1.0,"weights":[0.25]}]}]}"#);
    }
}
