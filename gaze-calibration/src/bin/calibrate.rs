use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gaze_calibration::{
    calibrate_button_label, rating_text, Alignment, CalibrationConfig, CalibrationSession,
    LogDisplay, ScreenSize,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracker_client::{SimulatedTracker, SimulationScript, TrackerService, TrackerState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeviceState {
    Connected,
    NoUsb3,
    BadFirmware,
    NotConnected,
    NoStream,
}

impl From<DeviceState> for TrackerState {
    fn from(state: DeviceState) -> Self {
        match state {
            DeviceState::Connected => TrackerState::Connected,
            DeviceState::NoUsb3 => TrackerState::ConnectedNoUsb3,
            DeviceState::BadFirmware => TrackerState::ConnectedBadFirmware,
            DeviceState::NotConnected => TrackerState::NotConnected,
            DeviceState::NoStream => TrackerState::ConnectedNoStream,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run an eye-tracker calibration against a simulated tracker", long_about = None)]
struct Args {
    #[arg(short, long, help = "JSON calibration config to start from")]
    config: Option<PathBuf>,

    #[arg(short = 'n', long, help = "Number of calibration targets (1, a perfect square, or 12)")]
    points: Option<usize>,

    #[arg(long, help = "Screen width in pixels")]
    screen_width: Option<u32>,

    #[arg(long, help = "Screen height in pixels")]
    screen_height: Option<u32>,

    #[arg(long, help = "Calibration area width in pixels (defaults to screen)")]
    area_width: Option<u32>,

    #[arg(long, help = "Calibration area height in pixels (defaults to screen)")]
    area_height: Option<u32>,

    #[arg(long, value_enum, help = "Horizontal placement of the calibration area")]
    horizontal: Option<Alignment>,

    #[arg(long, value_enum, help = "Vertical placement of the calibration area")]
    vertical: Option<Alignment>,

    #[arg(long, help = "Settle time before sampling each target, in milliseconds")]
    latency_ms: Option<u64>,

    #[arg(long, help = "Sampling time per target, in milliseconds")]
    recording_ms: Option<u64>,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Targets the simulated tracker flags in each successive result, e.g. 2,1"
    )]
    resample_rounds: Vec<usize>,

    #[arg(long, help = "Average angular error reported by the simulated tracker", default_value = "0.45")]
    error_degrees: f64,

    #[arg(long, help = "Simulated tracker answer delay in milliseconds", default_value = "20")]
    response_ms: u64,

    #[arg(long, value_enum, help = "Initial device state", default_value = "connected")]
    device_state: DeviceState,

    #[arg(long, help = "Disconnect the simulated device after this many sampled targets")]
    disconnect_after: Option<usize>,

    #[arg(long, help = "Simulate an empty calibration result")]
    empty_result: bool,

    #[arg(long, help = "Cancel the calibration after this many milliseconds")]
    cancel_after_ms: Option<u64>,

    #[arg(short, long, help = "Write the outcome as JSON to this file")]
    output: Option<PathBuf>,
}

impl Args {
    fn calibration_config(&self) -> Result<CalibrationConfig> {
        let mut config = match &self.config {
            Some(path) => CalibrationConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => CalibrationConfig::default(),
        };

        if let Some(points) = self.points {
            config.point_count = points;
        }
        if let Some(width) = self.screen_width {
            config.screen.width = width;
        }
        if let Some(height) = self.screen_height {
            config.screen.height = height;
        }
        if self.area_width.is_some() || self.area_height.is_some() {
            config.area = Some(ScreenSize::new(
                self.area_width.unwrap_or(config.screen.width),
                self.area_height.unwrap_or(config.screen.height),
            ));
        }
        if let Some(horizontal) = self.horizontal {
            config.horizontal_alignment = horizontal;
        }
        if let Some(vertical) = self.vertical {
            config.vertical_alignment = vertical;
        }
        if let Some(latency_ms) = self.latency_ms {
            config.latency_ms = latency_ms;
        }
        if let Some(recording_ms) = self.recording_ms {
            config.recording_ms = recording_ms;
        }

        config.validate().context("Invalid calibration settings")?;
        Ok(config)
    }

    fn simulation_script(&self) -> SimulationScript {
        let mut script = SimulationScript::default()
            .with_resample_rounds(self.resample_rounds.iter().copied())
            .with_average_error(self.error_degrees)
            .with_response_delay(Duration::from_millis(self.response_ms));
        script.empty_result = self.empty_result;
        if let Some(targets) = self.disconnect_after {
            script = script.with_disconnect_after(targets);
        }
        script
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = args.calibration_config()?;
    let tracker = SimulatedTracker::new(args.device_state.into(), args.simulation_script());

    info!(
        "Calibrating {} targets on {} (area {:?})",
        config.point_count, config.screen, config.area
    );

    let session = CalibrationSession::new(tracker, LogDisplay::default(), &config)?;
    if let Some(cancel_ms) = args.cancel_after_ms {
        let handle = session.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(cancel_ms)).await;
            info!("Cancelling calibration");
            handle.cancel();
        });
    }

    let (outcome, tracker) = session.run().await;

    println!("Outcome: {}", outcome.kind);
    if !outcome.message.is_empty() {
        println!("Message: {}", outcome.message);
    }
    let quality = rating_text(outcome.report.as_ref());
    if !quality.is_empty() {
        println!("{quality}");
    }
    println!(
        "Next action: {}",
        calibrate_button_label(tracker.last_calibration().is_some())
    );

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write outcome to {}", path.display()))?;
        info!("Outcome written to {}", path.display());
    }

    Ok(())
}
