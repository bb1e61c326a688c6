use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ponto::{ClockInApp, ClockInError, Config, Intent, Screen};
use ponto_core::types::{ClassificationMode, DetectionMode, LandmarkMode};
use ponto_core::{DetectionOptions, FaceDetector, HttpRecognitionClient, ScrfdDetector};
use ponto_hw::{Camera, CaptureOptions, Facing, PermissionStatus, StillImageCamera};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ponto", about = "Clock in by face recognition")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a photo, detect a face and submit it for recognition
    ClockIn {
        /// Image file served as the camera frame
        #[arg(short, long)]
        image: PathBuf,
        /// Camera to open (front or back); overrides PONTO_CAMERA_FACING
        #[arg(long)]
        facing: Option<Facing>,
    },
    /// Run face detection only and print the faceData JSON
    Detect {
        /// Image file to analyze
        #[arg(short, long)]
        image: PathBuf,
        /// Use the larger detector input
        #[arg(long)]
        accurate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    match cli.command {
        Commands::ClockIn { image, facing } => clock_in(&config, image, facing).await,
        Commands::Detect { image, accurate } => detect(&config, image, accurate).await,
    }
}

async fn clock_in(config: &Config, image: PathBuf, facing: Option<Facing>) -> Result<ExitCode> {
    let detector = load_detector(config)?;
    let service = HttpRecognitionClient::new(&config.recognition_url, config.client_options())
        .context("failed to create recognition client")?;
    tracing::info!(endpoint = %service.endpoint(), "recognition service configured");

    let app = Arc::new(ClockInApp::new(
        Arc::new(StillImageCamera::new(image)),
        facing.unwrap_or(config.camera_facing),
        detector,
        Arc::new(service),
        config.network_timeout(),
    ));

    app.start().await.context("failed to open camera")?;
    let screen = Screen::from_state(&app.state());
    if screen == Screen::NoCameraAccess {
        println!("{screen}");
        return Ok(ExitCode::FAILURE);
    }
    app.dispatch(Intent::CameraReady).await?;

    let on_interrupt = tokio::spawn({
        let app = app.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted; leaving");
                app.leave().await;
            }
        }
    });

    let result = app.clock_in().await;
    on_interrupt.abort();

    let code = match result {
        Ok(outcome) => {
            println!("{}", outcome.message());
            if outcome.is_recognized() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(ClockInError::Cancelled) => {
            eprintln!("cancelled");
            ExitCode::from(130)
        }
        Err(e) => return Err(e.into()),
    };

    app.dispatch(Intent::Leave).await?;
    Ok(code)
}

async fn detect(config: &Config, image: PathBuf, accurate: bool) -> Result<ExitCode> {
    let detector = load_detector(config)?;

    let camera = StillImageCamera::new(&image);
    if camera.request_permission().await == PermissionStatus::Denied {
        anyhow::bail!("cannot read {}", camera.path().display());
    }
    camera.open_preview(config.camera_facing).await?;
    let photo = camera.take_picture(CaptureOptions::default()).await?;
    camera.close_preview().await;

    let options = DetectionOptions {
        mode: if accurate {
            DetectionMode::Accurate
        } else {
            DetectionMode::Fast
        },
        landmarks: LandmarkMode::All,
        classifications: ClassificationMode::All,
    };
    let result = detector.detect(&photo, &options).await?;
    tracing::info!(faces = result.len(), "detection complete");

    let body = serde_json::json!({ "faceData": result.faces });
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(if result.face_present() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_detector(config: &Config) -> Result<Arc<ScrfdDetector>> {
    let path = config.scrfd_model_path();
    let detector = ScrfdDetector::load(&path)
        .with_context(|| format!("failed to load detector from {}", path.display()))?;
    tracing::info!(model = %path.display(), "face detector loaded");
    Ok(Arc::new(detector))
}
