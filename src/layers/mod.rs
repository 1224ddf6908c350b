pub mod conv;
pub mod fc;
pub mod layer;

pub use conv::ConvLayer;
pub use fc::FcLayer;
pub use layer::Layer;
