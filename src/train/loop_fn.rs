use std::time::Instant;

use log::info;

use crate::error::{NetError, Result};
use crate::network::{Network, State};
use crate::train::epoch_stats::{EpochStats, IterationReport};
use crate::train::record::Record;
use crate::train::train_config::{MiniBatchSize, Shuffle, TrainOptions};
use crate::util::{format_duration, shuffle};

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

impl Network {
    /// Trains on `dataset` for `options.epochs` epochs.
    ///
    /// Delta weights are applied every `mini_batch_size` iterations, and once
    /// more at the last record of an epoch for a trailing partial batch. The
    /// task yields to the runtime after every iteration.
    ///
    /// A network built without layers is sized from the first record. The
    /// dataset may be permuted in place, depending on `options.shuffle`.
    ///
    /// # Errors
    /// - `EmptyDataset` if `dataset` is empty
    /// - `MissingKeys` for the first record lacking an input or a target;
    ///   the run stops there
    /// - anything `init_layers` or `forward` can fail with
    pub async fn train(&mut self, dataset: &mut [Record], mut options: TrainOptions<'_>) -> Result<()> {
        let first = dataset.first().ok_or(NetError::EmptyDataset)?;
        let (input_len, target_len) = first
            .parts()
            .map(|(input, target)| (input.len(), target.len()))
            .ok_or(NetError::MissingKeys { index: 0 })?;

        self.ctx.mini_batch_size = match options.mini_batch_size {
            MiniBatchSize::Auto(true) => target_len,
            MiniBatchSize::Auto(false) => 1,
            MiniBatchSize::Size(size) => size,
        }
        .max(1);

        if options.shuffle != Shuffle::Off {
            shuffle(dataset, &mut self.ctx.rng);
        }

        if options.log {
            info!(
                "Training started. Epochs: {} Batch Size: {}",
                options.epochs, self.ctx.mini_batch_size
            );
        }

        self.init_layers(input_len, target_len)?;

        self.state = State::Training;
        self.set_layer_states(State::Training);
        self.epoch_stats.clear();

        let result = self.run_epochs(dataset, &mut options).await;

        self.state = State::Initialised;
        self.set_layer_states(State::Initialised);
        result
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    async fn run_epochs(&mut self, dataset: &mut [Record], options: &mut TrainOptions<'_>) -> Result<()> {
        let total_epochs = options.epochs.max(1);
        let batch = self.ctx.mini_batch_size;
        let start = Instant::now();

        self.reset_delta_weights();

        for run_epoch in 1..=total_epochs {
            if run_epoch > 1 && options.shuffle == Shuffle::EachEpoch {
                shuffle(dataset, &mut self.ctx.rng);
            }

            self.epochs += 1;
            self.error = 0.0;
            self.ctx.l1_error = 0.0;
            self.ctx.l2_error = 0.0;

            self.run_epoch(dataset, batch, start, options).await?;

            // The trailing partial batch was applied at the last record; clear
            // its deltas so the next epoch's first apply does not add them again.
            if dataset.len() % batch != 0 {
                self.reset_delta_weights();
            }

            let elapsed = start.elapsed();
            let records = dataset.len() as f64;
            let stats = EpochStats {
                epoch: self.epochs,
                total_epochs,
                error: self.error / records,
                l2_error: self.l2_error().map(|e| e / records),
                l1_error: self.l1_error().map(|e| e / records),
                elapsed_ms: elapsed.as_millis() as u64,
            };

            if options.log {
                let l2 = stats.l2_error.map(|e| format!(" L2 Error: {e}")).unwrap_or_default();
                info!("Epoch: {} Error: {}{}", stats.epoch, stats.error, l2);
                info!(
                    "Elapsed: {} Average Duration: {}",
                    format_duration(elapsed),
                    format_duration(elapsed / run_epoch as u32)
                );
            }
            self.epoch_stats.push(stats);
        }

        if options.log {
            let elapsed = start.elapsed();
            info!(
                "Training finished. Total time: {}  Average iteration time: {}",
                format_duration(elapsed),
                format_duration(elapsed / dataset.len() as u32)
            );
        }
        Ok(())
    }

    /// One pass over `dataset`, in order.
    async fn run_epoch(
        &mut self,
        dataset: &[Record],
        batch: usize,
        start: Instant,
        options: &mut TrainOptions<'_>,
    ) -> Result<()> {
        for (index, record) in dataset.iter().enumerate() {
            let (input, target) = record.parts().ok_or(NetError::MissingKeys { index })?;

            let output = self.forward(input)?;
            self.backward(target)?;

            let position = index + 1;
            if position % batch == 0 {
                self.apply_delta_weights();
                self.reset_delta_weights();
            } else if position == dataset.len() {
                self.apply_delta_weights();
            }

            let error = self.ctx.hp.cost.error(&output, target);
            self.error += error;
            self.ctx.iterations += 1;

            if let Some(callback) = options.callback.as_mut() {
                callback(&IterationReport {
                    iterations: self.ctx.iterations,
                    error,
                    elapsed: start.elapsed(),
                    input,
                });
            }

            tokio::task::yield_now().await;
        }
        Ok(())
    }
}
