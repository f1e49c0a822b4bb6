//! End-to-end pipeline tests over synthetic cameras.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use vision_pipeline::{
    BrightSpotFinder, CameraSettings, CaptureSource, DetectionWorker, Frame,
    InMemoryTelemetryStore, OverlayProcessor, Pipeline, ResizeProcessor, Resolution,
    SourcePicker, SourceProcessor, StatsSink, StubFinder, TargetOverlayProcessor,
    TelemetryStore, VisionTarget,
};

fn stub_camera(index: usize, telemetry: Arc<InMemoryTelemetryStore>) -> Arc<CaptureSource> {
    let settings = CameraSettings {
        name: format!("camera{}", index),
        device: format!("stub://{}", index),
        width: 64,
        height: 48,
        target_fps: 60,
        exposure: 0.01,
    };
    Arc::new(
        CaptureSource::open(&settings, telemetry).expect("stub camera"),
    )
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn picker_switch_routes_subsequent_frames_to_new_camera() {
    let telemetry = Arc::new(InMemoryTelemetryStore::new());
    let cam0 = stub_camera(0, telemetry.clone());
    let cam1 = stub_camera(1, telemetry.clone());
    let picker = Arc::new(SourcePicker::new(vec![cam0.clone(), cam1.clone()]).unwrap());

    let pipeline = Pipeline::new(picker.clone(), vec![]);
    let published: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = published.clone();
    pipeline.subscribe(move |frame: &Frame| {
        sink.lock().unwrap().push(frame.source.clone());
    });

    cam0.start().unwrap();
    cam1.start().unwrap();
    pipeline.start().unwrap();

    // Ticks deliver camera0 frames while index 0 is selected.
    assert!(wait_until(Duration::from_secs(5), || {
        published.lock().unwrap().len() >= 5
    }));
    assert!(published
        .lock()
        .unwrap()
        .iter()
        .all(|source| source == "camera0"));

    picker.select(1).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        published.lock().unwrap().iter().any(|s| s == "camera1")
    }));
    // Let a few more frames through, then stop.
    assert!(wait_until(Duration::from_secs(5), || {
        published.lock().unwrap().len() >= 15
    }));

    pipeline.stop();
    cam0.stop();
    cam1.stop();

    // At most one in-flight camera0 frame may appear after the switch, but
    // never after camera1's first post-switch frame.
    let sources = published.lock().unwrap().clone();
    let first_cam1 = sources.iter().position(|s| s == "camera1").unwrap();
    for source in &sources[first_cam1..] {
        assert_eq!(source, "camera1", "stale camera0 frame after switch");
    }
}

#[test]
fn full_pipeline_feeds_detection_and_telemetry() {
    let telemetry = Arc::new(InMemoryTelemetryStore::new());
    let store: Arc<dyn TelemetryStore> = telemetry.clone();
    let camera = stub_camera(0, telemetry.clone());
    let picker = Arc::new(SourcePicker::new(vec![camera.clone()]).unwrap());

    let target = VisionTarget::centered((0.5, 0.5), 0.25);
    let worker = Arc::new(DetectionWorker::new(
        Box::new(StubFinder::new(vec![target])),
        store,
    ));

    let processors: Vec<Box<dyn SourceProcessor>> = vec![
        Box::new(ResizeProcessor::new(Resolution::new(32, 24))),
        Box::new(OverlayProcessor::new()),
        Box::new(TargetOverlayProcessor::new(worker.targets_handle())),
    ];
    let pipeline = Pipeline::new(picker, processors);

    let detection = worker.clone();
    pipeline.subscribe(move |frame: &Frame| detection.on_frame(frame));
    let stream = Arc::new(StatsSink::new("stream", 1000));
    vision_pipeline::attach_sink(&pipeline, stream.clone());

    camera.start().unwrap();
    worker.start().unwrap();
    pipeline.start().unwrap();

    // Frames reach the sink at the output resolution, and detection results
    // land in telemetry.
    assert!(wait_until(Duration::from_secs(5), || {
        stream.frames_seen() >= 3
    }));
    assert!(wait_until(Duration::from_secs(5), || {
        telemetry.get_number("targets/count", -1.0).unwrap() == 1.0
    }));
    let frame = pipeline.last_frame().unwrap();
    assert_eq!(frame.resolution, Resolution::new(32, 24));

    pipeline.stop();
    worker.stop();
    camera.stop();
}

#[test]
fn detection_lags_but_pipeline_keeps_ticking() {
    let telemetry = Arc::new(InMemoryTelemetryStore::new());
    let camera = stub_camera(0, telemetry.clone());
    let picker = Arc::new(SourcePicker::new(vec![camera.clone()]).unwrap());

    // A detector far slower than the tick rate: the pipeline must not stall
    // and the worker must coalesce.
    let analyzed = Arc::new(Mutex::new(Vec::new()));
    let worker = Arc::new(DetectionWorker::new(
        Box::new(
            StubFinder::new(vec![])
                .with_delay(Duration::from_millis(200))
                .record_to(analyzed.clone()),
        ),
        telemetry.clone() as Arc<dyn TelemetryStore>,
    ));

    let pipeline = Pipeline::new(picker, vec![]);
    let ticks = Arc::new(Mutex::new(0usize));
    let tick_counter = ticks.clone();
    pipeline.subscribe(move |_: &Frame| {
        *tick_counter.lock().unwrap() += 1;
    });
    let detection = worker.clone();
    pipeline.subscribe(move |frame: &Frame| detection.on_frame(frame));

    camera.start().unwrap();
    worker.start().unwrap();
    pipeline.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        *ticks.lock().unwrap() >= 20
    }));

    pipeline.stop();
    worker.stop();
    camera.stop();

    // Many more ticks than detections: intermediate frames were skipped,
    // not queued.
    let tick_count = *ticks.lock().unwrap();
    let analyzed_count = analyzed.lock().unwrap().len();
    assert!(analyzed_count >= 1);
    assert!(
        analyzed_count < tick_count,
        "worker analyzed {} of {} ticks; expected coalescing",
        analyzed_count,
        tick_count
    );
}

#[test]
fn real_finder_runs_end_to_end() {
    let telemetry = Arc::new(InMemoryTelemetryStore::new());
    let camera = stub_camera(7, telemetry.clone());
    let picker = Arc::new(SourcePicker::new(vec![camera.clone()]).unwrap());

    // Low threshold so the synthetic pattern always yields one target.
    let worker = Arc::new(DetectionWorker::new(
        Box::new(BrightSpotFinder::new().with_threshold(0.0)),
        telemetry.clone() as Arc<dyn TelemetryStore>,
    ));

    let pipeline = Pipeline::new(picker, vec![]);
    let detection = worker.clone();
    pipeline.subscribe(move |frame: &Frame| detection.on_frame(frame));

    camera.start().unwrap();
    worker.start().unwrap();
    pipeline.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        !worker.targets().is_empty()
    }));
    let targets = worker.targets();
    assert_eq!(targets.len(), 1);
    let target = &targets[0];
    assert!(target.pos.0 >= 0.0 && target.pos.0 <= 1.0);
    assert!(target.pos.1 >= 0.0 && target.pos.1 <= 1.0);

    pipeline.stop();
    worker.stop();
    camera.stop();
}
