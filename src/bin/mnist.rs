//! Experiment 2: MNIST training
//!
//! Trains a fully connected 784-256-128-10 sigmoid network whose linear layers
//! are analog, then evaluates classification accuracy on the held-out split.
//! Expects the uncompressed IDX files under `data/DATASET`.
//!
//! # Usage
//! Runnable via
//! ```sh
//! cargo run --release --bin mnist -- -c noise_free.yml
//! ```

use std::error::Error;

use analog_grad::{
    config::{RunConfig, job_type},
    dataloader::DataLoader,
    device::JartV1bDevice,
    mnist,
    track::RunTracker,
    train::{TrainError, build_mnist_model, check_accelerator, evaluate, train_mnist},
};

use clap::Parser;

// Path where the datasets are stored.
const PATH_DATASET: &str = "data/DATASET";

#[derive(Parser)]
struct Args {
    /// YAML configuration file
    #[clap(short, long, default_value_t = format!("noise_free.yml"))]
    config: String,
    /// Directory for tracked run output
    #[clap(short, long, default_value_t = format!("runs"))]
    output_dir: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = RunConfig::load(&args.config)?;
    let job_type = job_type(&args.config);
    check_accelerator(&config);

    let batch_size = config.batch_size.ok_or(TrainError::MissingBatchSize)?;

    for repeat in 0..config.repeat_times {
        let mut tracker = if config.use_tracking {
            Some(RunTracker::begin(
                &args.output_dir,
                &config.project_name,
                &job_type,
                repeat,
                args.config.as_ref(),
            )?)
        } else {
            None
        };

        let train_set = mnist::load_training(PATH_DATASET)?;
        let val_set = mnist::load_validation(PATH_DATASET)?;
        let train_loader = DataLoader::new(train_set.images, train_set.labels, batch_size, true)?;
        let val_loader = DataLoader::new(val_set.images, val_set.labels, batch_size, true)?;

        let device = JartV1bDevice::from_config(&config);
        let mut rng = rand::rng();
        let model = build_mnist_model(&config, &device, &mut rng)?;

        train_mnist(&config, &model, &train_loader, tracker.as_mut(), &mut rng)?;

        let accuracy = evaluate(&model, &val_loader)?;
        log::info!("Number Of Images Tested = {}", val_loader.len());
        log::info!("Model Accuracy = {}", accuracy);
        if let Some(tracker) = tracker {
            tracker.log_summary("Model Accuracy", accuracy)?;
            tracker.finish()?;
        }
    }
    Ok(())
}
