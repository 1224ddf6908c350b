pub mod cost_type;
pub mod cross_entropy;
pub mod mse;
pub mod vector_length;

pub use cost_type::Cost;
pub use cross_entropy::CrossEntropyCost;
pub use mse::MseCost;
pub use vector_length::VectorLengthCost;
