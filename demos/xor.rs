use lodestone_nn::{Network, NetworkConfig, Record, TestOptions, TrainOptions};

#[tokio::main]
async fn main() -> lodestone_nn::Result<()> {
    env_logger::init();

    let mut network = Network::new(
        NetworkConfig::new()
            .with_layers([2usize, 3, 1])
            .with_learning_rate(0.5)
            .with_seed(42),
    )?;

    let mut dataset = vec![
        Record::new(vec![1.0, 0.0], vec![1.0]),
        Record::new(vec![1.0, 1.0], vec![0.0]),
        Record::new(vec![0.0, 1.0], vec![1.0]),
        Record::new(vec![0.0, 0.0], vec![0.0]),
    ];

    network
        .train(
            &mut dataset,
            TrainOptions::new().epochs(5000).shuffle(true).log(false),
        )
        .await?;

    for stats in network.epoch_stats().iter().step_by(1000) {
        println!("Epoch {}: error = {:.6}", stats.epoch, stats.error);
    }

    let error = network.test(&dataset, TestOptions::new().log(false)).await?;
    println!("Mean test error: {error:.6}");

    for record in &dataset {
        if let Some((input, _)) = record.parts() {
            println!("Input: {:?} -> Output: {:.4}", input, network.forward(input)?[0]);
        }
    }
    Ok(())
}
