//! Local experiment run tracking
//!
//! Stands in for a hosted experiment tracking service: each run gets its own
//! directory under `<output>/<project>/<job_type>/run_<n>` holding a copy of the
//! configuration it ran with, per-epoch metrics as CSV, summary values, and a
//! loss curve rendered at the end of the run.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use plotters::{
    chart::ChartBuilder,
    prelude::{BitMapBackend, IntoDrawingArea},
    series::LineSeries,
    style::{Color, RED, WHITE},
};
use thiserror::Error;

/// Errors for run tracking
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Run tracking I/O failure")]
    Io(#[from] std::io::Error),
    #[error("Failed to render loss curve: {0}")]
    Plot(String),
}

/// Records one experiment run to the local filesystem
pub struct RunTracker {
    run_dir: PathBuf,
    losses: Vec<f32>,
}

impl RunTracker {
    /// Starts a run: creates the run directory, snapshots the configuration,
    /// and opens a fresh metrics file
    pub fn begin<P: AsRef<Path>>(
        output_dir: P,
        project: &str,
        job_type: &str,
        repeat: usize,
        config_path: &Path,
    ) -> Result<Self, TrackError> {
        let run_dir = output_dir
            .as_ref()
            .join(project)
            .join(job_type)
            .join(format!("run_{}", repeat));
        fs::create_dir_all(&run_dir)?;
        fs::copy(config_path, run_dir.join("config.yml"))?;
        let mut metrics = File::create(run_dir.join("metrics.csv"))?;
        writeln!(metrics, "epoch,loss")?;
        log::info!("tracking run in '{}'", run_dir.display());
        Ok(Self {
            run_dir,
            losses: vec![],
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Appends one epoch's training loss to the metrics file
    pub fn log_epoch(&mut self, epoch: usize, loss: f32) -> Result<(), TrackError> {
        let mut metrics = OpenOptions::new()
            .append(true)
            .open(self.run_dir.join("metrics.csv"))?;
        writeln!(metrics, "{},{:.16}", epoch, loss)?;
        self.losses.push(loss);
        Ok(())
    }

    /// Records a named summary value (e.g. final model accuracy)
    pub fn log_summary(&self, name: &str, value: f64) -> Result<(), TrackError> {
        let mut summary = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir.join("summary.csv"))?;
        writeln!(summary, "{},{}", name, value)?;
        Ok(())
    }

    /// Closes the run, rendering the loss curve from the logged epochs
    pub fn finish(&self) -> Result<(), TrackError> {
        if self.losses.is_empty() {
            return Ok(());
        }
        let file_name = self.run_dir.join("loss_curve.png");
        self.plot_loss_curve(&file_name)
            .map_err(|e| TrackError::Plot(e.to_string()))?;
        log::info!("Loss curve saved to '{}'.", file_name.display());
        Ok(())
    }

    fn plot_loss_curve(&self, file_name: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let root_area = BitMapBackend::new(file_name, (640, 480)).into_drawing_area();
        root_area.fill(&WHITE)?;

        let max_loss = self.losses.iter().cloned().fold(f32::EPSILON, f32::max);

        let mut chart = ChartBuilder::on(&root_area)
            .caption("Training Loss", ("sans-serif", 50))
            .margin(20)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_cartesian_2d(0.0f32..self.losses.len() as f32, 0.0f32..max_loss * 1.05)?;

        chart.configure_mesh().draw()?;

        chart.draw_series(LineSeries::new(
            self.losses
                .iter()
                .enumerate()
                .map(|(epoch, loss)| (epoch as f32, *loss)),
            RED.stroke_width(2),
        ))?;

        root_area.present()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_output(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("analog_grad_track_{}_{}", tag, std::process::id()))
    }

    fn temp_config(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("analog_grad_cfg_{}_{}.yml", tag, std::process::id()));
        fs::write(&path, "project_name: test\n").unwrap();
        path
    }

    #[test]
    fn test_run_layout_and_metrics() {
        let output = temp_output("layout");
        let config = temp_config("layout");
        let mut tracker = RunTracker::begin(&output, "proj", "noise_free", 0, &config).unwrap();
        tracker.log_epoch(1, 0.5).unwrap();
        tracker.log_epoch(2, 0.25).unwrap();
        tracker.log_summary("Model Accuracy", 0.73).unwrap();

        let run_dir = output.join("proj").join("noise_free").join("run_0");
        assert_eq!(tracker.run_dir(), run_dir);
        assert!(run_dir.join("config.yml").exists());
        let metrics = fs::read_to_string(run_dir.join("metrics.csv")).unwrap();
        let lines: Vec<&str> = metrics.lines().collect();
        assert_eq!(lines[0], "epoch,loss");
        assert!(lines[1].starts_with("1,0.5"));
        assert!(lines[2].starts_with("2,0.25"));
        let summary = fs::read_to_string(run_dir.join("summary.csv")).unwrap();
        assert_eq!(summary.trim(), "Model Accuracy,0.73");
    }

    #[test]
    fn test_finish_renders_loss_curve() {
        let output = temp_output("curve");
        let config = temp_config("curve");
        let mut tracker = RunTracker::begin(&output, "proj", "noise_free", 1, &config).unwrap();
        for epoch in 0..5 {
            tracker.log_epoch(epoch, 1.0 / (epoch + 1) as f32).unwrap();
        }
        tracker.finish().unwrap();
        assert!(tracker.run_dir().join("loss_curve.png").exists());
    }

    #[test]
    fn test_finish_without_epochs_is_noop() {
        let output = temp_output("empty");
        let config = temp_config("empty");
        let tracker = RunTracker::begin(&output, "proj", "noise_free", 2, &config).unwrap();
        tracker.finish().unwrap();
        assert!(!tracker.run_dir().join("loss_curve.png").exists());
    }
}
