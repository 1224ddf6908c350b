use std::{error::Error, fmt, io};

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, NetError>;

/// Everything that can go wrong while building, running or restoring a network.
#[derive(Debug)]
pub enum NetError {
    /// The layer list mixed sizes with layer objects, or held a non-positive size.
    InvalidLayers,
    UnknownActivation(String),
    UnknownCost(String),
    UnknownOptimizer(String),
    UnknownDistribution(String),
    /// `forward`/`backward` called before the layers were initialised.
    NotInitialised,
    /// A required argument was not given to the named operation.
    MissingData(&'static str),
    /// A dataset record at `index` lacks `input`, or both `expected` and `output`.
    MissingKeys { index: usize },
    EmptyDataset,
    LayerCountMismatch { given: usize, configured: usize },
    WeightsMismatch {
        layer: usize,
        given: usize,
        existing: usize,
    },
    InvalidConvGeometry {
        layer: usize,
        input: usize,
        filter: usize,
        padding: usize,
        stride: usize,
    },
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::InvalidLayers => {
                write!(f, "there was an error constructing from the layers given")
            }
            NetError::UnknownActivation(name) => write!(f, "unknown activation function `{name}`"),
            NetError::UnknownCost(name) => write!(f, "unknown cost function `{name}`"),
            NetError::UnknownOptimizer(name) => write!(f, "unknown adaptive learning rate `{name}`"),
            NetError::UnknownDistribution(name) => {
                write!(f, "unknown weights distribution `{name}`")
            }
            NetError::NotInitialised => write!(f, "the network layers have not been initialised"),
            NetError::MissingData(op) => write!(f, "no data passed to {op}"),
            NetError::MissingKeys { index } => write!(
                f,
                "data set record {index} must have keys: 'input' and 'expected' (or 'output')"
            ),
            NetError::EmptyDataset => write!(f, "no data provided"),
            NetError::LayerCountMismatch { given, configured } => write!(
                f,
                "mismatched layers ({given} layers in import data, but {configured} configured)"
            ),
            NetError::WeightsMismatch {
                layer,
                given,
                existing,
            } => write!(
                f,
                "mismatched weights count, given: {given} existing: {existing} at layer index: {layer}"
            ),
            NetError::InvalidConvGeometry {
                layer,
                input,
                filter,
                padding,
                stride,
            } => write!(
                f,
                "invalid convolution at layer {layer}: input map {input}, filter {filter}, \
                 zero padding {padding} and stride {stride} do not produce a whole output map"
            ),
            NetError::Io(e) => write!(f, "io error: {e}"),
            NetError::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for NetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NetError::Io(e) => Some(e),
            NetError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for NetError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
