use std::time::Instant;

use log::info;

use crate::error::{NetError, Result};
use crate::network::Network;
use crate::train::epoch_stats::IterationReport;
use crate::train::record::Record;
use crate::train::train_config::TestOptions;
use crate::util::format_duration;

impl Network {
    /// Runs every record forward once and returns the mean cost error.
    ///
    /// No weights change. Yields to the runtime after every record.
    pub async fn test(&mut self, dataset: &[Record], mut options: TestOptions<'_>) -> Result<f64> {
        if dataset.is_empty() {
            return Err(NetError::EmptyDataset);
        }
        if options.log {
            info!("Testing started");
        }

        let start = Instant::now();
        let mut total_error = 0.0;

        for (index, record) in dataset.iter().enumerate() {
            let (input, target) = record.parts().ok_or(NetError::MissingKeys { index })?;
            let output = self.forward(input)?;

            let error = self.ctx.hp.cost.error(&output, target);
            total_error += error;

            if let Some(callback) = options.callback.as_mut() {
                callback(&IterationReport {
                    iterations: index + 1,
                    error,
                    elapsed: start.elapsed(),
                    input,
                });
            }

            tokio::task::yield_now().await;
        }

        if options.log {
            let elapsed = start.elapsed();
            info!(
                "Testing finished. Total time: {}  Average iteration time: {}",
                format_duration(elapsed),
                format_duration(elapsed / dataset.len() as u32)
            );
        }

        Ok(total_error / dataset.len() as f64)
    }
}
