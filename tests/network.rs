use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lodestone_nn::activation::Activation;
use lodestone_nn::init::WeightsConfig;
use lodestone_nn::network::{LayerSnapshot, NetContext};
use lodestone_nn::{
    ConvLayer, FcLayer, Layer, LayerEntry, NetError, Network, NetworkConfig, Record, Shuffle,
    State, TestOptions, TrainOptions,
};

/// Fully-connected layer that counts how often its deltas are applied.
struct CountingLayer {
    inner: FcLayer,
    applies: Arc<AtomicUsize>,
}

impl Layer for CountingLayer {
    fn size(&self) -> usize {
        self.inner.size()
    }
    fn state(&self) -> State {
        self.inner.state()
    }
    fn set_state(&mut self, state: State) {
        self.inner.set_state(state)
    }
    fn activation(&self) -> Option<Activation> {
        self.inner.activation()
    }
    fn set_activation(&mut self, activation: Activation) {
        self.inner.set_activation(activation)
    }
    fn weights_config(&self) -> &WeightsConfig {
        self.inner.weights_config()
    }
    fn weights_config_mut(&mut self) -> &mut WeightsConfig {
        self.inner.weights_config_mut()
    }
    fn prev(&self) -> Option<usize> {
        self.inner.prev()
    }
    fn next(&self) -> Option<usize> {
        self.inner.next()
    }
    fn assign_prev(&mut self, index: usize) {
        self.inner.assign_prev(index)
    }
    fn assign_next(&mut self, index: usize) {
        self.inner.assign_next(index)
    }
    fn activations(&self) -> &[f64] {
        self.inner.activations()
    }
    fn set_input(&mut self, input: &[f64]) {
        self.inner.set_input(input)
    }
    fn init(&mut self, prev: &dyn Layer, ctx: &mut NetContext) -> lodestone_nn::Result<()> {
        self.inner.init(prev, ctx)
    }
    fn forward(&mut self, prev: &dyn Layer, ctx: &mut NetContext) {
        self.inner.forward(prev, ctx)
    }
    fn backward(
        &mut self,
        prev: &dyn Layer,
        next: Option<&dyn Layer>,
        expected: Option<&[f64]>,
        ctx: &NetContext,
    ) {
        self.inner.backward(prev, next, expected, ctx)
    }
    fn input_errors(&self) -> &[f64] {
        self.inner.input_errors()
    }
    fn reset_delta_weights(&mut self) {
        self.inner.reset_delta_weights()
    }
    fn apply_delta_weights(&mut self, ctx: &mut NetContext) {
        self.applies.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_delta_weights(ctx)
    }
    fn scale_weights(&mut self, factor: f64) {
        self.inner.scale_weights(factor)
    }
    fn to_json(&self) -> LayerSnapshot {
        self.inner.to_json()
    }
    fn check_json(&self, snapshot: &LayerSnapshot, index: usize) -> lodestone_nn::Result<()> {
        self.inner.check_json(snapshot, index)
    }
    fn from_json(&mut self, snapshot: &LayerSnapshot, index: usize) -> lodestone_nn::Result<()> {
        self.inner.from_json(snapshot, index)
    }
}

fn counted_network(applies: &Arc<AtomicUsize>, learning_rate: f64) -> Network {
    let config = NetworkConfig::new()
        .with_layers([
            LayerEntry::from(FcLayer::new(2)),
            LayerEntry::from(FcLayer::new(3)),
            LayerEntry::Layer(Box::new(CountingLayer {
                inner: FcLayer::new(1),
                applies: Arc::clone(applies),
            })),
        ])
        .with_learning_rate(learning_rate)
        .with_seed(7);
    Network::new(config).unwrap()
}

fn sized(layers: &[usize], seed: u64) -> Network {
    Network::new(NetworkConfig::new().with_layers(layers.iter().copied()).with_seed(seed)).unwrap()
}

fn dataset(len: usize) -> Vec<Record> {
    (0..len)
        .map(|i| {
            let x = (i % 2) as f64;
            Record::new(vec![x, 1.0 - x], vec![x])
        })
        .collect()
}

fn quiet<'a>() -> TrainOptions<'a> {
    TrainOptions::new().log(false)
}

#[test]
fn construction_links_neighbours() {
    let net = sized(&[4, 5, 6, 2], 1);
    assert_eq!(net.state(), State::Initialised);

    let layers = net.layers();
    for (i, layer) in layers.iter().enumerate() {
        let prev = i.checked_sub(1);
        let next = (i + 1 < layers.len()).then_some(i + 1);
        assert_eq!((layer.prev(), layer.next()), (prev, next));
    }
}

#[test]
fn forward_requires_initialisation() {
    let mut net = Network::new(NetworkConfig::new()).unwrap();
    assert!(matches!(net.forward(&[0.5, 0.5]), Err(NetError::NotInitialised)));
    assert!(matches!(net.backward(&[1.0]), Err(NetError::NotInitialised)));

    let mut net = sized(&[2, 4, 3], 2);
    assert_eq!(net.forward(&[0.5, 0.5]).unwrap().len(), 3);
}

#[test]
fn reset_then_apply_changes_nothing() {
    for optimizer in ["noadaptivelr", "rmsprop", "adam", "adagrad"] {
        let json = format!(r#"{{"layers": [3, 4, 2], "adaptiveLR": "{optimizer}", "seed": 4}}"#);
        let config: NetworkConfig = serde_json::from_str(&json).unwrap();
        let mut net = Network::new(config).unwrap();

        net.forward(&[0.1, 0.2, 0.3]).unwrap();
        net.backward(&[1.0, 0.0]).unwrap();
        let before = net.to_json();

        net.reset_delta_weights();
        net.apply_delta_weights();
        assert_eq!(net.to_json(), before, "{optimizer}");
    }
}

#[tokio::test]
async fn applies_once_per_mini_batch() {
    for (records, batch) in [(4, 1), (5, 2), (7, 3), (6, 6), (3, 5)] {
        let applies = Arc::new(AtomicUsize::new(0));
        let mut net = counted_network(&applies, 0.1);
        let mut data = dataset(records);

        net.train(&mut data, quiet().mini_batch_size(batch)).await.unwrap();
        assert_eq!(applies.load(Ordering::SeqCst), records.div_ceil(batch), "{records}/{batch}");
        assert_eq!(net.mini_batch_size(), batch);
    }
}

#[tokio::test]
async fn partial_batch_is_applied_once_per_epoch() {
    let applies = Arc::new(AtomicUsize::new(0));
    let mut net = counted_network(&applies, 0.1);
    let mut data = dataset(5);

    net.train(&mut data, quiet().epochs(3).mini_batch_size(2)).await.unwrap();
    assert_eq!(applies.load(Ordering::SeqCst), 9);
    assert_eq!(net.epochs(), 3);
    assert_eq!(net.iterations(), 15);
}

#[tokio::test]
async fn auto_mini_batch_uses_target_length() {
    let mut net = sized(&[2, 3, 2], 5);
    let mut data = vec![
        Record::new(vec![0.0, 1.0], vec![1.0, 0.0]),
        Record::new(vec![1.0, 0.0], vec![0.0, 1.0]),
    ];
    net.train(&mut data, quiet().mini_batch_size(true)).await.unwrap();
    assert_eq!(net.mini_batch_size(), 2);
}

#[test]
fn checkpoint_round_trip_reproduces_outputs() {
    let mut source = sized(&[3, 5, 2], 10);
    let mut target = sized(&[3, 5, 2], 11);
    let input = [0.3, -0.7, 0.9];
    assert_ne!(source.forward(&input).unwrap(), target.forward(&input).unwrap());

    let json = serde_json::to_string(&source.to_json()).unwrap();
    target.from_json(&serde_json::from_str(&json).unwrap()).unwrap();

    let expected = source.forward(&input).unwrap();
    let actual = target.forward(&input).unwrap();
    assert_eq!(
        expected.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
        actual.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
    );
}

#[test]
fn mismatched_import_leaves_network_untouched() {
    let mut net = sized(&[3, 4, 2], 12);
    let input = [0.1, 0.5, 0.9];
    let before = net.forward(&input).unwrap();

    let fewer = sized(&[3, 2], 13).to_json();
    assert!(matches!(
        net.from_json(&fewer),
        Err(NetError::LayerCountMismatch { given: 2, configured: 3 })
    ));
    assert_eq!(net.forward(&input).unwrap(), before);

    // Same layer count, but the last layer's shape differs.
    let reshaped = sized(&[3, 4, 3], 14).to_json();
    assert!(matches!(
        net.from_json(&reshaped),
        Err(NetError::WeightsMismatch { layer: 2, .. })
    ));
    assert_eq!(net.forward(&input).unwrap(), before);
}

#[tokio::test]
async fn test_returns_mean_error() {
    let mut net = sized(&[2, 3, 1], 20);
    let output = net.forward(&[0.2, 0.8]).unwrap();

    let exact = vec![Record::new(vec![0.2, 0.8], output.clone())];
    let error = net.test(&exact, TestOptions::new().log(false)).await.unwrap();
    assert_eq!(error, 0.0);

    let data = dataset(4);
    let mut total = 0.0;
    for record in &data {
        let (input, target) = record.parts().unwrap();
        let out = net.forward(input).unwrap();
        total += net.hyperparameters().cost.error(&out, target);
    }
    let error = net.test(&data, TestOptions::new().log(false)).await.unwrap();
    assert!((error - total / 4.0).abs() < 1e-12);
}

#[tokio::test]
async fn end_to_end_two_records() {
    let applies = Arc::new(AtomicUsize::new(0));
    let mut net = counted_network(&applies, 0.5);
    assert_eq!(net.hyperparameters().learning_rate, Some(0.5));

    let mut data = vec![
        Record::new(vec![0.0, 0.0], vec![0.0]),
        Record::new(vec![1.0, 1.0], vec![1.0]),
    ];
    net.train(&mut data, quiet().epochs(1).mini_batch_size(2)).await.unwrap();

    assert_eq!(net.epochs(), 1);
    assert_eq!(net.iterations(), 2);
    assert_eq!(applies.load(Ordering::SeqCst), 1);
    assert_eq!(net.state(), State::Initialised);
    assert!(net.layers().iter().all(|l| l.state() == State::Initialised));
    assert_eq!(net.epoch_stats().len(), 1);
}

#[tokio::test]
async fn layers_are_sized_from_first_record() {
    let mut net = Network::new(NetworkConfig::new().with_seed(3)).unwrap();
    assert_eq!(net.state(), State::NotDefined);

    let mut data = vec![Record::new(vec![0.0; 12], vec![1.0, 0.0])];
    net.train(&mut data, quiet()).await.unwrap();

    let sizes: Vec<usize> = net.layers().iter().map(|l| l.size()).collect();
    // 12 / 2 > 5: ceil(2 + 10 / 4) = 5
    assert_eq!(sizes, vec![12, 5, 2]);
    assert_eq!(net.state(), State::Initialised);
}

#[tokio::test]
async fn missing_keys_abort_the_run() {
    let mut net = sized(&[2, 2, 1], 6);
    let mut data = dataset(3);
    data[1].expected = None;

    let result = net.train(&mut data, quiet().epochs(4)).await;
    assert!(matches!(result, Err(NetError::MissingKeys { index: 1 })));
    assert_eq!(net.iterations(), 1);
    assert_eq!(net.state(), State::Initialised);
    assert!(net.layers().iter().all(|l| l.state() == State::Initialised));

    let result = net.test(&data, TestOptions::new().log(false)).await;
    assert!(matches!(result, Err(NetError::MissingKeys { index: 1 })));
}

#[tokio::test]
async fn empty_dataset_is_rejected() {
    let mut net = sized(&[2, 1], 6);
    assert!(matches!(net.train(&mut [], quiet()).await, Err(NetError::EmptyDataset)));
    assert!(matches!(
        net.test(&[], TestOptions::new().log(false)).await,
        Err(NetError::EmptyDataset)
    ));
}

#[tokio::test]
async fn output_key_is_an_accepted_target() {
    let mut net = sized(&[2, 1], 6);
    let mut data: Vec<Record> =
        serde_json::from_str(r#"[{"input": [0, 1], "output": [1]}, {"input": [1, 0], "output": [0]}]"#)
            .unwrap();
    net.train(&mut data, quiet()).await.unwrap();
    assert_eq!(net.iterations(), 2);
}

#[tokio::test]
async fn callback_sees_every_iteration() {
    let mut net = sized(&[2, 3, 1], 8);
    let mut data = dataset(4);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    net.train(
        &mut data,
        quiet().epochs(2).callback(move |report| {
            sink.lock().unwrap().push((report.iterations, report.input.len()));
        }),
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 8);
    assert_eq!(seen.first(), Some(&(1, 2)));
    assert_eq!(seen.last(), Some(&(8, 2)));
}

#[tokio::test]
async fn shuffling_keeps_every_record() {
    let mut net = sized(&[2, 3, 1], 9);
    let mut data: Vec<Record> = (0..20)
        .map(|i| Record::new(vec![i as f64, 0.0], vec![0.0]))
        .collect();

    net.train(&mut data, quiet().epochs(2).shuffle(Shuffle::EachEpoch)).await.unwrap();

    let mut firsts: Vec<i64> = data.iter().map(|r| r.input.as_ref().unwrap()[0] as i64).collect();
    firsts.sort_unstable();
    assert_eq!(firsts, (0..20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn training_reduces_error() {
    let config: NetworkConfig =
        serde_json::from_str(r#"{"layers": [2, 4, 1], "learningRate": 0.5, "seed": 21}"#).unwrap();
    let mut net = Network::new(config).unwrap();
    let mut data = vec![
        Record::new(vec![0.0, 0.0], vec![0.0]),
        Record::new(vec![0.0, 1.0], vec![0.0]),
        Record::new(vec![1.0, 0.0], vec![0.0]),
        Record::new(vec![1.0, 1.0], vec![1.0]),
    ];

    net.train(&mut data, quiet().epochs(2000)).await.unwrap();
    let stats = net.epoch_stats();
    assert_eq!(stats.len(), 2000);
    assert!(stats[1999].error < stats[0].error);
}

#[tokio::test]
async fn regularization_errors_are_reported() {
    let config: NetworkConfig =
        serde_json::from_str(r#"{"layers": [2, 3, 1], "l2": true, "l1": true, "seed": 2}"#).unwrap();
    let mut net = Network::new(config).unwrap();
    assert_eq!(net.l2_error(), Some(0.0));

    let mut data = dataset(4);
    net.train(&mut data, quiet()).await.unwrap();
    assert!(net.l2_error().unwrap() > 0.0);
    assert!(net.l1_error().unwrap() > 0.0);
    let stats = &net.epoch_stats()[0];
    assert!(stats.l2_error.is_some() && stats.l1_error.is_some());

    let plain = sized(&[2, 1], 2);
    assert_eq!((plain.l1_error(), plain.l2_error()), (None, None));
}

#[tokio::test]
async fn convolutional_stack_trains() {
    let config = NetworkConfig::new()
        .with_layers([
            LayerEntry::from(FcLayer::new(16)),
            LayerEntry::from(ConvLayer::new(2)),
            LayerEntry::from(FcLayer::new(2)),
        ])
        .with_seed(30);
    let mut net = Network::new(config).unwrap();
    assert_eq!(net.layers()[1].activations().len(), 32);

    let mut data = vec![
        Record::new((0..16).map(|i| (i % 2) as f64).collect(), vec![1.0, 0.0]),
        Record::new((0..16).map(|i| ((i + 1) % 2) as f64).collect(), vec![0.0, 1.0]),
    ];
    net.train(&mut data, quiet().epochs(3)).await.unwrap();
    assert_eq!(net.forward(&data[0].input.clone().unwrap()).unwrap().len(), 2);

    let snapshot = net.to_json();
    let mut copy = Network::new(
        NetworkConfig::new()
            .with_layers([
                LayerEntry::from(FcLayer::new(16)),
                LayerEntry::from(ConvLayer::new(2)),
                LayerEntry::from(FcLayer::new(2)),
            ])
            .with_seed(31),
    )
    .unwrap();
    copy.from_json(&snapshot).unwrap();
    let input = data[1].input.clone().unwrap();
    assert_eq!(copy.forward(&input).unwrap(), net.forward(&input).unwrap());
}

#[test]
fn conv_layer_cannot_take_raw_input() {
    let config = NetworkConfig::new().with_layers([
        LayerEntry::from(ConvLayer::new(2)),
        LayerEntry::from(FcLayer::new(2)),
    ]);
    assert!(matches!(Network::new(config), Err(NetError::InvalidLayers)));
}

#[test]
fn save_and_load_checkpoint_file() {
    let path = std::env::temp_dir().join(format!("lodestone-nn-{}.json", std::process::id()));
    let path = path.to_string_lossy().into_owned();

    let mut source = sized(&[2, 3, 2], 40);
    source.save_json(&path).unwrap();

    let mut restored = sized(&[2, 3, 2], 41);
    restored.load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored.to_json(), source.to_json());
    assert_eq!(Network::VERSION, "2.0.0");
}

#[test]
fn zero_filter_size_fails_construction() {
    let config = NetworkConfig::new().with_layers([
        LayerEntry::from(FcLayer::new(16)),
        LayerEntry::from(ConvLayer::new(2).filter_size(0)),
    ]);
    assert!(matches!(
        Network::new(config),
        Err(NetError::InvalidConvGeometry { layer: 1, filter: 0, .. })
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn runs_yield_to_other_tasks_after_every_record() {
    let mut net = sized(&[2, 3, 1], 50);
    let mut data = dataset(5);
    let ticks = AtomicUsize::new(0);
    let done = AtomicBool::new(false);
    let seen = Mutex::new(Vec::new());

    let ticker = async {
        while !done.load(Ordering::SeqCst) {
            ticks.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    };
    let runs = async {
        let options = quiet().epochs(2).callback(|_| {
            seen.lock().unwrap().push(ticks.load(Ordering::SeqCst));
        });
        net.train(&mut data, options).await.unwrap();

        let options = TestOptions::new().log(false).callback(|_| {
            seen.lock().unwrap().push(ticks.load(Ordering::SeqCst));
        });
        net.test(&data, options).await.unwrap();
        done.store(true, Ordering::SeqCst);
    };
    tokio::join!(runs, ticker);

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 15);
    assert!(seen.windows(2).all(|w| w[1] > w[0]), "{seen:?}");
}

#[tokio::test]
async fn empty_record_input_aborts_the_run() {
    let mut net = sized(&[2, 3, 1], 51);
    let mut data = dataset(3);
    data[2].input = Some(vec![]);

    let result = net.train(&mut data, quiet()).await;
    assert!(matches!(result, Err(NetError::MissingData(_))));
    assert_eq!(net.iterations(), 2);
    assert_eq!(net.state(), State::Initialised);
}

#[tokio::test]
async fn reset_then_apply_after_training() {
    let input = [0.4, 0.6];

    let mut plain = sized(&[2, 3, 1], 52);
    plain.train(&mut dataset(4), quiet()).await.unwrap();
    let before = plain.forward(&input).unwrap();
    plain.reset_delta_weights();
    plain.apply_delta_weights();
    assert_eq!(plain.forward(&input).unwrap(), before);

    // Adam keeps moving on its momentum once it has history.
    let config: NetworkConfig =
        serde_json::from_str(r#"{"layers": [2, 3, 1], "adaptiveLR": "adam", "seed": 52}"#).unwrap();
    let mut adam = Network::new(config).unwrap();
    adam.train(&mut dataset(4), quiet()).await.unwrap();
    let before = adam.forward(&input).unwrap();
    adam.reset_delta_weights();
    adam.apply_delta_weights();
    assert_ne!(adam.forward(&input).unwrap(), before);
}

#[tokio::test]
async fn partial_batch_deltas_do_not_carry_into_next_epoch() {
    let record = Record::new(vec![0.3, 0.9], vec![1.0]);

    let mut trained = sized(&[2, 3, 1], 53);
    trained
        .train(&mut [record.clone()], quiet().epochs(2).mini_batch_size(2))
        .await
        .unwrap();

    let mut manual = sized(&[2, 3, 1], 53);
    let (input, target) = record.parts().unwrap();
    for _ in 0..2 {
        manual.forward(input).unwrap();
        manual.backward(target).unwrap();
        manual.apply_delta_weights();
        manual.reset_delta_weights();
    }

    assert_eq!(trained.to_json(), manual.to_json());
}
