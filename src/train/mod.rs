pub mod epoch_stats;
pub mod loop_fn;
pub mod record;
pub mod test_fn;
pub mod train_config;

pub use epoch_stats::{EpochStats, IterationReport};
pub use record::Record;
pub use train_config::{Callback, MiniBatchSize, Shuffle, TestOptions, TrainOptions};
