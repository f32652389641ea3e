use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use cropsight::config::CropSightConfig;
use cropsight::pipeline::MonitorPipeline;
use cropsight::record::{HeightCommandRecord, JsonRecorder};
use cropsight::session::CaptureSetting;
use cropsight::telemetry::TelemetrySource;
use cropsight::thresholds::ThresholdResolver;
use cropsight::{CropType, WeatherCondition};

#[derive(Parser)]
#[command(name = "cropsight")]
#[command(about = "Crop-monitoring frame quality scoring and altitude feedback")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "cropsight.toml")]
    config: String,

    /// Image file or directory of frames to analyze
    #[arg(short, long, default_value = "frames")]
    input: String,

    /// Crop type (wheat, corn, rice, cotton, soybean, general)
    #[arg(long)]
    crop: Option<String>,

    /// Weather condition (clear, cloudy, overcast, sunny, rainy)
    #[arg(long)]
    weather: Option<String>,

    /// Capture mode: field, close-up or auto
    #[arg(long, value_parser = parse_capture)]
    capture_mode: Option<CaptureSetting>,

    /// Current flight height in meters
    #[arg(long)]
    height: Option<f64>,

    /// Feed simulated altimeter readings
    #[arg(long)]
    simulate_height: bool,

    /// Keep watching the input directory for new frames
    #[arg(short, long)]
    watch: bool,

    /// Print the resolved thresholds and exit
    #[arg(long)]
    show_thresholds: bool,

    /// Print the newest height command record and exit
    #[arg(long)]
    latest_command: bool,

    /// Do not write JSON records
    #[arg(long)]
    no_record: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_capture(s: &str) -> std::result::Result<CaptureSetting, String> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "field" => Ok(CaptureSetting::Field),
        "close_up" | "closeup" => Ok(CaptureSetting::CloseUp),
        "auto" => Ok(CaptureSetting::Auto),
        other => Err(format!("unknown capture mode '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(format!("cropsight={}", log_level))
        .try_init(); // Use try_init to avoid panic if already initialized

    let mut config = CropSightConfig::load(&args.config).await?;
    info!("Configuration loaded from {}", args.config);

    if let Some(crop) = &args.crop {
        config.analysis.crop_type = crop.clone();
    }
    if let Some(weather) = &args.weather {
        config.analysis.weather_condition = weather.clone();
    }
    if let Some(mode) = args.capture_mode {
        config.analysis.capture_mode = mode;
    }
    if args.height.is_some() {
        config.height.initial_height_m = args.height;
    }
    if args.simulate_height {
        config.telemetry.source = TelemetrySource::Simulated;
    }
    if args.no_record {
        config.recorder.enabled = false;
    }

    if args.show_thresholds {
        let crop = CropType::from_name_lossy(&config.analysis.crop_type);
        let weather = WeatherCondition::from_name_lossy(&config.analysis.weather_condition);
        let thresholds = ThresholdResolver::resolve(crop, weather);
        println!("{}", serde_json::to_string_pretty(&thresholds)?);
        println!(
            "optimal height: {:.1}m +/- {:.1}m",
            crop.profile().optimal_height_m,
            crop.profile().height_tolerance_m
        );
        return Ok(());
    }

    if args.latest_command {
        let recorder = JsonRecorder::new(&config.recorder.commands_path, config.recorder.max_entries);
        match recorder.latest::<HeightCommandRecord>().await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => warn!("No height commands recorded in {}", recorder.path().display()),
        }
        return Ok(());
    }

    let mut pipeline = MonitorPipeline::new(config, &args.input)?.watch(args.watch);

    let running = pipeline.running_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current frame");
            *running.write().await = false;
        }
    });

    match pipeline.run().await {
        Ok(summary) => {
            info!(
                "Analyzed {} frames, mean score {:.1}, worst priority {}",
                summary.frames_processed, summary.mean_score, summary.worst_priority
            );
        }
        Err(e) => {
            error!("Monitoring error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
