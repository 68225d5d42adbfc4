//! Experiment 1: a single analog layer
//!
//! A network of one analog layer which learns to map two fixed input rows to
//! their target rows under the configured device noise model.
//!
//! # Usage
//! Runnable via
//! ```sh
//! cargo run --bin simple_layer -- -h
//! cargo run --bin simple_layer -- -c noise_free.yml
//! ```

use std::error::Error;

use analog_grad::{
    config::{RunConfig, job_type},
    track::RunTracker,
    train::train_simple,
};

use clap::Parser;

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

        train_simple(&config, tracker.as_mut(), &mut rand::rng())?;

        if let Some(tracker) = tracker {
            tracker.finish()?;
        }
    }
    Ok(())
}
