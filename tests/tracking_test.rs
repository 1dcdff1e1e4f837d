use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use nalgebra::{Point2, Vector3};
use qrtrack_rs::integration::{DecodeWorker, RaycastMiss};
use qrtrack_rs::{
    AnchorPoint, CameraProvider, CycleOutcome, DecodeSource, DetectionCycleDriver, DriverConfig,
    Frame, Pose, QrTracker, RawDetection, RawDetectionBuilder, Ray, RaycastSource,
    RotationConstraint, TrackerConfig, TrackingEvent, TrackingState,
};

const IMAGE_SIZE: u32 = 400;

/// Replays one scripted list of detections per decode call, then nothing.
struct ScriptedDecoder {
    script: VecDeque<Vec<RawDetection>>,
}

impl ScriptedDecoder {
    fn new(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl DecodeSource for ScriptedDecoder {
    type Error = String;

    fn decode(
        &mut self,
        _input: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<RawDetection>, Self::Error> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

/// Camera at the origin whose pixel rays land on the y = -1 floor, 1 cm per pixel.
struct FloorCamera;

impl CameraProvider for FloorCamera {
    fn camera_pose(&self) -> Option<Pose> {
        Some(Pose::identity())
    }

    fn pixel_to_ray(&self, pixel: Point2<i32>) -> Vector3<f32> {
        Vector3::new(pixel.x as f32 / 100.0, -1.0, pixel.y as f32 / 100.0)
    }
}

struct FloorRaycaster;

impl RaycastSource for FloorRaycaster {
    fn raycast(&mut self, ray: &Ray) -> Result<Vector3<f32>, RaycastMiss> {
        Ok(ray.origin + ray.direction)
    }
}

/// Finder patterns of a 2 x 2 m square on the floor (200 px sides).
fn square(text: &str, cell_size: u32) -> RawDetection {
    let h = IMAGE_SIZE as f32;
    RawDetectionBuilder::new()
        .finder_patterns((0.0, h), (0.0, h - 200.0), (200.0, h - 200.0))
        .cell_size(cell_size)
        .text(text)
        .build()
}

fn frame() -> Frame {
    Frame::new(vec![0; 16], IMAGE_SIZE, IMAGE_SIZE)
}

fn event_names(events: &[TrackingEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            TrackingEvent::FirstDetected(_) => "first",
            TrackingEvent::Detected(_) => "detected",
            TrackingEvent::Lost => "lost",
        })
        .collect()
}

#[test]
fn test_end_to_end_physical_size() {
    let decoder = ScriptedDecoder::new(vec![vec![square("door-7", 25)]; 3]);
    let mut driver =
        DetectionCycleDriver::new(DriverConfig::default(), decoder, FloorRaycaster, FloorCamera)
            .unwrap();
    let id = driver.add_tracker(QrTracker::new(TrackerConfig::for_target("door-7")));

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    driver.tracker_mut(id).unwrap().subscribe(move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });

    for _ in 0..3 {
        assert!(matches!(
            driver.tick(Instant::now(), &frame()),
            CycleOutcome::Completed(_)
        ));
    }

    let received = received.lock().unwrap();
    assert_eq!(
        event_names(&received),
        vec!["first", "detected", "detected", "detected"]
    );

    // 2 m finder span over 25 - 7 cells, extrapolated to 25 cells.
    let expected = 2.0 * 25.0 / 18.0;
    for event in received.iter() {
        let marker = event.marker().unwrap();
        assert!((marker.physical_size - expected).abs() < 1e-4);
        assert_eq!(marker.text, "door-7");
    }
}

#[test]
fn test_lost_is_not_absorbing() {
    let decoder = ScriptedDecoder::new(vec![
        vec![square("qr", 21)],
        vec![square("qr", 21)],
        vec![],
        vec![square("qr", 21)],
    ]);
    let mut driver =
        DetectionCycleDriver::new(DriverConfig::default(), decoder, FloorRaycaster, FloorCamera)
            .unwrap();
    let id = driver.add_tracker(QrTracker::new(TrackerConfig::for_target("qr")));

    let mut per_cycle = Vec::new();
    for _ in 0..4 {
        match driver.tick(Instant::now(), &frame()) {
            CycleOutcome::Completed(report) => {
                let events: Vec<_> = report.events.into_iter().map(|(_, e)| e).collect();
                per_cycle.push(event_names(&events));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(
        per_cycle,
        vec![
            vec!["first", "detected"],
            vec!["detected"],
            vec!["lost"],
            vec!["detected"],
        ]
    );
    assert_eq!(driver.tracker(id).unwrap().state(), TrackingState::Tracking);
}

#[test]
fn test_anchor_and_constraint_through_driver() {
    let decoder = ScriptedDecoder::new(vec![vec![square("qr", 21)]]);
    let mut driver =
        DetectionCycleDriver::new(DriverConfig::default(), decoder, FloorRaycaster, FloorCamera)
            .unwrap();
    let config = TrackerConfig {
        anchor_point: AnchorPoint::BottomLeft,
        rotation_constraint: RotationConstraint::VerticalOrHorizontal,
        scale_by_physical_size: true,
        ..TrackerConfig::for_target("qr")
    };
    let id = driver.add_tracker(QrTracker::new(config));

    driver.tick(Instant::now(), &frame());

    // Center (1, -1, 1), size 3: bottom-left anchor is 1.5 m back and left.
    let transform = *driver.tracker(id).unwrap().transform().unwrap();
    assert!((transform.position - Vector3::new(-0.5, -1.0, -0.5)).norm() < 1e-4);
    assert!(((transform.orientation * Vector3::y()) - Vector3::y()).norm() < 1e-5);
    assert!((transform.scale.unwrap() - 3.0).abs() < 1e-4);
}

#[test]
fn test_decode_worker_drives_cycles() {
    let decoder = ScriptedDecoder::new(vec![vec![square("a", 21), square("b", 21)]]);
    let worker = DecodeWorker::spawn(decoder).unwrap();
    let config = DriverConfig {
        auto_track: Some(TrackerConfig::default()),
        ..DriverConfig::default()
    };
    let mut driver =
        DetectionCycleDriver::new(config, worker, FloorRaycaster, FloorCamera).unwrap();

    let lists = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lists);
    driver.subscribe_markers(move |markers| {
        sink.lock().unwrap().push(markers.len());
        Ok(())
    });

    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(frame()).unwrap();
    tx.send(frame()).unwrap();
    drop(tx);
    driver.run(&rx);

    assert_eq!(*lists.lock().unwrap(), vec![2, 0]);
    assert_eq!(driver.trackers().len(), 2);
    let a = driver.find_tracker("a").unwrap();
    assert_eq!(driver.tracker(a).unwrap().state(), TrackingState::Lost);
}

#[test]
fn test_run_stops_on_cancellation() {
    let decoder = ScriptedDecoder::new(vec![]);
    let mut driver =
        DetectionCycleDriver::new(DriverConfig::default(), decoder, FloorRaycaster, FloorCamera)
            .unwrap();
    let token = driver.cancellation_token();
    let (tx, rx) = crossbeam_channel::unbounded::<Frame>();

    let canceller = thread::spawn(move || {
        thread::sleep(std::time::Duration::from_millis(20));
        token.cancel();
    });

    // Returns although the sender stays open.
    driver.run(&rx);
    canceller.join().unwrap();
    assert!(matches!(
        driver.tick(Instant::now(), &frame()),
        CycleOutcome::Cancelled
    ));
    drop(tx);
}

#[test]
fn test_config_from_json() {
    let config: DriverConfig = serde_json::from_str(
        r#"{
            "detection_frame_rate": 15.0,
            "auto_track": {
                "anchor_point": "TopLeft",
                "rotation_constraint": "Vertical",
                "filters": [
                    {"kind": "AspectRatio", "threshold": 0.9},
                    {"kind": "ZScore", "window_size": 8}
                ]
            }
        }"#,
    )
    .unwrap();

    assert_eq!(config.detection_frame_rate, 15.0);
    let template = config.auto_track.unwrap();
    assert_eq!(template.anchor_point, AnchorPoint::TopLeft);
    assert_eq!(template.rotation_constraint, RotationConstraint::Vertical);
    assert_eq!(template.filters.len(), 2);
    assert!(template.target_text.is_empty());
    assert!(!template.scale_by_physical_size);
}
