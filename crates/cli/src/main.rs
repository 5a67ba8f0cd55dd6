mod commands;
mod config_file;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{select, Receiver};

use privacy_guard_core::blurring::infrastructure::cpu_frame_obscurer::CpuFrameObscurer;
use privacy_guard_core::capture::domain::capture_device::CaptureDevice;
use privacy_guard_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use privacy_guard_core::capture::infrastructure::still_image_device::StillImageDevice;
use privacy_guard_core::config::GuardConfig;
use privacy_guard_core::detection::domain::face_detector::FaceDetector;
use privacy_guard_core::detection::domain::face_embedder::FaceEmbedder;
use privacy_guard_core::detection::domain::verifier::Verifier;
use privacy_guard_core::detection::infrastructure::histogram_embedder::HistogramEmbedder;
use privacy_guard_core::detection::infrastructure::onnx_arcface_embedder::OnnxArcfaceEmbedder;
use privacy_guard_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use privacy_guard_core::detection::infrastructure::template_verifier::TemplateVerifier;
use privacy_guard_core::pipeline::pipeline_events::PipelineEvent;
use privacy_guard_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use privacy_guard_core::pipeline::privacy_pipeline::{PipelineParts, PrivacyPipeline};
use privacy_guard_core::render::display_sink::{DisplaySink, NullDisplaySink};
use privacy_guard_core::render::infrastructure::logging_display_sink::LoggingDisplaySink;
use privacy_guard_core::render::infrastructure::snapshot_display_sink::SnapshotDisplaySink;
use privacy_guard_core::render::status_overlay::load_font;
use privacy_guard_core::shared::constants::{DETECTOR_MODEL_NAME, EMBEDDER_MODEL_NAME};

use commands::{spawn_stdin_reader, Command, HELP};

/// Obscures the screen while someone other than the operator is watching it.
#[derive(Parser)]
#[command(name = "privacy-guard")]
struct Cli {
    /// JSON configuration file (default: <config dir>/PrivacyGuard/config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera device, e.g. /dev/video0 or "0".
    #[arg(long)]
    device: Option<String>,

    /// ffmpeg input format (v4l2, avfoundation, dshow).
    #[arg(long)]
    input_format: Option<String>,

    /// Replay these images instead of opening a camera.
    #[arg(long, num_args = 1..)]
    replay: Vec<PathBuf>,

    /// Capture reads each replayed image is held for before the next one.
    #[arg(long, default_value = "30")]
    replay_hold: u32,

    /// BlazeFace ONNX model (default: <data dir>/PrivacyGuard/models).
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// ArcFace ONNX model used with --template.
    #[arg(long)]
    embedder_model: Option<PathBuf>,

    /// Use the model-free colour histogram embedder with --template.
    #[arg(long)]
    histogram_embedder: bool,

    /// Enrollment template (JSON array of floats). Enables verification.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Write composed frames as PNG to this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Periodic snapshot interval in rendered frames (0 = only on state change).
    #[arg(long, default_value = "150")]
    snapshot_every: u64,

    /// Font file for the status text drawn into composed frames.
    #[arg(long)]
    font: Option<PathBuf>,

    /// No display output.
    #[arg(long)]
    headless: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Consecutive risky assessments before privacy turns on.
    #[arg(long)]
    debounce_on: Option<u32>,

    /// Continuous safe seconds before privacy turns off.
    #[arg(long)]
    debounce_off: Option<f64>,

    /// Minimum face area as a fraction of the frame (0.0-1.0).
    #[arg(long)]
    area_ratio: Option<f64>,

    /// OTHER faces needed for a risky assessment.
    #[arg(long)]
    face_count: Option<usize>,

    /// Gaussian blur kernel size.
    #[arg(long)]
    blur_strength: Option<usize>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let mut config = config_file::load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let mut parts = PipelineParts::new(
        build_device(&cli, &config)?,
        build_detector(&cli, &config)?,
        Box::new(CpuFrameObscurer::new(config.blur_kernel_size())),
        build_sink(&cli, &config)?,
    )
    .with_loggers(
        Box::new(SummaryPipelineLogger::new("analysis")),
        Box::new(SummaryPipelineLogger::new("render")),
    );
    if let Some(verifier) = build_verifier(&cli, &config)? {
        parts = parts.with_verifier(verifier);
    }
    if let Some(path) = &config.ui.font_path {
        parts = parts.with_font(load_font(path)?);
    }

    let mut pipeline = PrivacyPipeline::new(config, parts)?;
    let stop = pipeline.stop_signal();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;

    pipeline.start()?;
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    spawn_stdin_reader(command_tx);
    eprintln!("{HELP}");

    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    supervise(&pipeline, command_rx, deadline);

    pipeline.stop()?;
    Ok(())
}

/// Serves operator commands and reports events until something stops the
/// pipeline: a quit command, Ctrl-C, the deadline, or a lost device.
fn supervise(pipeline: &PrivacyPipeline, mut commands: Receiver<Command>, deadline: Option<Instant>) {
    let events = pipeline.events();
    let started = Instant::now();

    while !pipeline.is_stopping() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Duration elapsed, stopping");
            break;
        }
        let mut next = None;
        let mut stdin_closed = false;
        select! {
            recv(commands) -> command => match command {
                Ok(command) => next = Some(command),
                Err(_) => stdin_closed = true,
            },
            recv(events) -> event => {
                if let Ok(event) = event {
                    report(&event, started);
                }
            },
            default(Duration::from_millis(100)) => {}
        }
        // stdin closed; keep running until Ctrl-C or the deadline
        if stdin_closed {
            commands = crossbeam_channel::never();
        }
        match next {
            Some(Command::Quit) => break,
            Some(command) => handle_command(pipeline, command),
            None => {}
        }
    }
}

fn handle_command(pipeline: &PrivacyPipeline, command: Command) {
    match command {
        Command::Pause => pipeline.pause(),
        Command::Resume => pipeline.resume(),
        Command::Reset => pipeline.reset(),
        Command::Status => {
            let decision = pipeline
                .current_decision()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "no decision yet".into());
            let mut flags = Vec::new();
            if pipeline.is_paused() {
                flags.push("paused");
            }
            if pipeline.is_degraded() {
                flags.push("degraded");
            }
            if flags.is_empty() {
                println!("{decision}");
            } else {
                println!("{decision} [{}]", flags.join(", "));
            }
        }
        Command::Quit => {}
    }
}

fn report(event: &PipelineEvent, started: Instant) {
    let t = started.elapsed().as_secs_f64();
    match event {
        PipelineEvent::DecisionChanged(decision) => println!("[{t:8.2}s] {decision}"),
        PipelineEvent::Degraded { consecutive_errors } => {
            println!("[{t:8.2}s] analysis degraded ({consecutive_errors} failed cycles)")
        }
        PipelineEvent::Recovered => println!("[{t:8.2}s] analysis recovered"),
        PipelineEvent::DeviceLost(reason) => log::error!("{reason}"),
        PipelineEvent::Stopped => {}
    }
}

fn apply_overrides(config: &mut GuardConfig, cli: &Cli) {
    if let Some(device) = &cli.device {
        config.camera.device = Some(device.clone());
    }
    if let Some(format) = &cli.input_format {
        config.camera.input_format = Some(format.clone());
    }
    if cli.headless {
        config.ui.headless = true;
    }
    if let Some(font) = &cli.font {
        config.ui.font_path = Some(font.clone());
    }
    if let Some(n) = cli.debounce_on {
        config.privacy.debounce_on_frames = n;
    }
    if let Some(secs) = cli.debounce_off {
        config.privacy.debounce_off_seconds = secs;
    }
    if let Some(ratio) = cli.area_ratio {
        config.privacy.area_ratio_threshold = ratio;
    }
    if let Some(n) = cli.face_count {
        config.privacy.face_count_threshold = n;
    }
    if let Some(k) = cli.blur_strength {
        config.privacy.blur_kernel_size = k;
    }
}

fn build_device(
    cli: &Cli,
    config: &GuardConfig,
) -> Result<Box<dyn CaptureDevice>, Box<dyn std::error::Error>> {
    if !cli.replay.is_empty() {
        return Ok(Box::new(
            StillImageDevice::new(cli.replay.clone()).holding_each(cli.replay_hold),
        ));
    }
    Ok(Box::new(FfmpegCamera::from_config(&config.camera)?))
}

fn build_detector(
    cli: &Cli,
    config: &GuardConfig,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model = config_file::resolve_model(cli.detector_model.as_deref(), DETECTOR_MODEL_NAME)?;
    Ok(Box::new(OnnxBlazefaceDetector::new(
        &model,
        config.detection.min_detection_confidence,
    )?))
}

fn build_verifier(
    cli: &Cli,
    config: &GuardConfig,
) -> Result<Option<Box<dyn Verifier>>, Box<dyn std::error::Error>> {
    let Some(template_path) = &cli.template else {
        log::info!("No enrollment template; every face counts as OTHER");
        return Ok(None);
    };
    let template = config_file::load_template(template_path)?;
    let embedder: Box<dyn FaceEmbedder> = if cli.histogram_embedder {
        Box::new(HistogramEmbedder::new())
    } else {
        let model =
            config_file::resolve_model(cli.embedder_model.as_deref(), EMBEDDER_MODEL_NAME)?;
        Box::new(OnnxArcfaceEmbedder::new(&model)?)
    };
    Ok(Some(Box::new(TemplateVerifier::new(
        embedder,
        template,
        config.privacy.verification_threshold,
    ))))
}

fn build_sink(
    cli: &Cli,
    config: &GuardConfig,
) -> Result<Box<dyn DisplaySink>, Box<dyn std::error::Error>> {
    if let Some(dir) = &cli.snapshot_dir {
        return Ok(Box::new(SnapshotDisplaySink::new(dir, cli.snapshot_every)?));
    }
    if config.ui.headless {
        Ok(Box::new(NullDisplaySink))
    } else {
        Ok(Box::new(LoggingDisplaySink::new()))
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(secs) = cli.duration {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!("Duration must be a positive number of seconds, got {secs}").into());
        }
    }
    for path in &cli.replay {
        if !path.exists() {
            return Err(format!("Replay image not found: {}", path.display()).into());
        }
        if !StillImageDevice::is_supported(path) {
            return Err(format!("Not a supported image: {}", path.display()).into());
        }
    }
    if cli.histogram_embedder && cli.embedder_model.is_some() {
        return Err("--histogram-embedder and --embedder-model are mutually exclusive".into());
    }
    Ok(())
}
