//! visiond - camera vision pipeline daemon
//!
//! Wires the full pipeline together:
//! 1. Loads configuration and telemetry, gates startup on a readiness signal
//! 2. Starts one capture thread per configured camera
//! 3. Runs the processing pipeline (resize + overlay) over the picked source
//! 4. Runs the detection worker on pipeline output, publishing targets to
//!    telemetry
//! 5. Feeds frame sinks and reports lifecycle state until Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vision_pipeline::{
    attach_sink, BrightSpotFinder, CameraSettings, CaptureSource, DetectionWorker, Frame,
    InMemoryTelemetryStore, OverlayProcessor, Pipeline, ReadySignal, ResizeProcessor,
    SourcePicker, SourceProcessor, StatsSink, TargetOverlayProcessor, TelemetryStore,
    VisiondConfig,
};

#[derive(Parser, Debug)]
#[command(name = "visiond", about = "Camera vision pipeline daemon")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long, env = "VISION_CONFIG")]
    config: Option<String>,

    /// Synthesize this many stub cameras instead of the configured list.
    #[arg(long)]
    cameras: Option<usize>,

    /// First camera index when synthesizing cameras.
    #[arg(long, default_value_t = 0)]
    camera_offset: usize,

    /// Diagnostic mode: draw detected targets on output frames and route
    /// them through a display sink.
    #[arg(long)]
    display: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = VisiondConfig::load_from(args.config.as_deref())?;
    if let Some(count) = args.cameras {
        cfg.cameras = synthesize_cameras(&cfg, count, args.camera_offset);
    }
    log::info!(
        "visiond {}: {} camera(s), output {}",
        env!("CARGO_PKG_VERSION"),
        cfg.cameras.len(),
        cfg.output_resolution
    );

    let telemetry: Arc<InMemoryTelemetryStore> = Arc::new(InMemoryTelemetryStore::new());
    let store: Arc<dyn TelemetryStore> = telemetry.clone();
    store.put_string("state", "starting")?;

    // Startup gate: anything that must wait for the telemetry backend waits
    // on this signal. The in-memory store is ready immediately; a networked
    // store marks it from its connection listener.
    let ready = Arc::new(ReadySignal::new());
    ready.mark_ready();
    if !ready.wait_ready(Duration::from_secs(30)) {
        anyhow::bail!("telemetry store never became ready");
    }

    // Capture threads, one per camera.
    let mut sources = Vec::new();
    for camera in &cfg.cameras {
        let source = CaptureSource::open(camera, store.clone())
            .with_context(|| format!("configure camera '{}'", camera.name))?;
        source.start()?;
        sources.push(Arc::new(source));
    }
    store.put_string("state", "capturing")?;

    let picker = Arc::new(SourcePicker::new(sources.clone())?);

    // Detection worker, fed from pipeline output below.
    let worker = Arc::new(DetectionWorker::new(
        Box::new(BrightSpotFinder::new().with_threshold(cfg.detection.threshold)),
        store.clone(),
    ));

    let mut processors: Vec<Box<dyn SourceProcessor>> = vec![
        Box::new(ResizeProcessor::new(cfg.output_resolution)),
        Box::new(OverlayProcessor::new()),
    ];
    if args.display {
        processors.push(Box::new(TargetOverlayProcessor::new(
            worker.targets_handle(),
        )));
    }

    let pipeline = Arc::new(Pipeline::new(picker.clone(), processors));

    if cfg.detection.enabled {
        let detection = worker.clone();
        pipeline.subscribe(move |frame: &Frame| detection.on_frame(frame));
        worker.start()?;
    }

    let stream_sink = Arc::new(StatsSink::new("stream", 100));
    attach_sink(&pipeline, stream_sink);
    if args.display {
        let display_sink = Arc::new(StatsSink::new("display", 100));
        attach_sink(&pipeline, display_sink);
    }

    pipeline.start()?;
    store.put_string("state", "processing")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("install ctrl-c handler")?;

    log::info!("visiond running; ctrl-c to stop");
    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    pipeline.stop();
    if cfg.detection.enabled {
        worker.stop();
    }
    for source in &sources {
        source.stop();
    }
    store.put_string("state", "stopped")?;
    log::debug!("final telemetry: {}", telemetry.snapshot()?);
    Ok(())
}

fn synthesize_cameras(
    cfg: &VisiondConfig,
    count: usize,
    offset: usize,
) -> Vec<CameraSettings> {
    let template = &cfg.cameras[0];
    (0..count)
        .map(|i| {
            let index = i + offset;
            CameraSettings {
                name: format!("camera{}", index),
                device: format!("stub://{}", index),
                ..template.clone()
            }
        })
        .collect()
}
