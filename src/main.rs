use std::error::Error;
use std::{env, fs, io, path::Path};

use log::info;

use lodestone_nn::{Network, NetworkConfig, Record, TestOptions, TrainOptions};

const USAGE: &str = "usage: lodestone-nn <config.json> <dataset.json> [epochs] [mini-batch size]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, dataset_path) = match (args.first(), args.get(1)) {
        (Some(config), Some(dataset)) => (config, dataset),
        _ => return Err(io::Error::other(USAGE).into()),
    };
    let epochs: usize = args.get(2).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(1);
    let batch: usize = args.get(3).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(1);

    let config = NetworkConfig::load_json(config_path)?;
    let mut dataset: Vec<Record> = serde_json::from_str(&fs::read_to_string(dataset_path)?)?;
    info!("loaded {} records from {dataset_path}", dataset.len());

    let mut network = Network::new(config)?;
    network
        .train(
            &mut dataset,
            TrainOptions::new().epochs(epochs).mini_batch_size(batch),
        )
        .await?;

    let error = network.test(&dataset, TestOptions::new()).await?;
    println!("mean test error: {error}");

    let checkpoint = Path::new(config_path).with_extension("weights.json");
    network.save_json(&checkpoint.to_string_lossy())?;
    info!("weights written to {}", checkpoint.display());

    Ok(())
}
