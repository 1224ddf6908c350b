use serde::{Deserialize, Serialize};

use crate::train::epoch_stats::IterationReport;

/// Progress callback, invoked once per iteration.
pub type Callback<'a> = Box<dyn FnMut(&IterationReport<'_>) + Send + 'a>;

/// Samples per weight update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MiniBatchSize {
    /// `true` takes the target length of the first record; `false` means 1.
    Auto(bool),
    Size(usize),
}

impl Default for MiniBatchSize {
    fn default() -> Self {
        MiniBatchSize::Size(1)
    }
}

impl From<usize> for MiniBatchSize {
    fn from(value: usize) -> Self {
        MiniBatchSize::Size(value)
    }
}

impl From<bool> for MiniBatchSize {
    fn from(value: bool) -> Self {
        MiniBatchSize::Auto(value)
    }
}

/// When to permute the dataset in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shuffle {
    #[default]
    Off,
    /// Once, before the first epoch.
    Once,
    /// Before every epoch.
    EachEpoch,
}

impl From<bool> for Shuffle {
    fn from(value: bool) -> Self {
        if value {
            Shuffle::Once
        } else {
            Shuffle::Off
        }
    }
}

/// Options of a `Network::train` run.
pub struct TrainOptions<'a> {
    /// A value of 0 still runs one epoch.
    pub epochs: usize,
    pub callback: Option<Callback<'a>>,
    /// Log the run start, per-epoch summaries and the finish at info level.
    pub log: bool,
    pub mini_batch_size: MiniBatchSize,
    pub shuffle: Shuffle,
}

impl Default for TrainOptions<'_> {
    fn default() -> Self {
        TrainOptions {
            epochs: 1,
            callback: None,
            log: true,
            mini_batch_size: MiniBatchSize::default(),
            shuffle: Shuffle::Off,
        }
    }
}

impl<'a> TrainOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn mini_batch_size(mut self, size: impl Into<MiniBatchSize>) -> Self {
        self.mini_batch_size = size.into();
        self
    }

    pub fn shuffle(mut self, shuffle: impl Into<Shuffle>) -> Self {
        self.shuffle = shuffle.into();
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn callback(mut self, f: impl FnMut(&IterationReport<'_>) + Send + 'a) -> Self {
        self.callback = Some(Box::new(f));
        self
    }
}

/// Options of a `Network::test` run.
pub struct TestOptions<'a> {
    pub log: bool,
    pub callback: Option<Callback<'a>>,
}

impl Default for TestOptions<'_> {
    fn default() -> Self {
        TestOptions { log: true, callback: None }
    }
}

impl<'a> TestOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn callback(mut self, f: impl FnMut(&IterationReport<'_>) + Send + 'a) -> Self {
        self.callback = Some(Box::new(f));
        self
    }
}
