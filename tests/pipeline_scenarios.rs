use quirobrazo::assembler::TrackingState;
use quirobrazo::calibration::{Calibration, CalibrationConfig};
use quirobrazo::landmark_source::decode_detection;
use quirobrazo::link::RecordingLink;
use quirobrazo::pipeline::Pipeline;
use quirobrazo::types::{Landmark, LandmarkSet, FINGERTIP_JOINTS, INDEX_MCP, NUM_LANDMARKS};

fn calibration() -> Calibration {
    CalibrationConfig::default().validate().unwrap()
}

/// Mano abierta: los dedos a `reach` por encima de la muñeca
fn hand(wrist: (f64, f64), index_base: (f64, f64), reach: f64) -> LandmarkSet {
    let w = Landmark::new(wrist.0, wrist.1, 0.0);
    let mut points = [w; NUM_LANDMARKS];
    points[INDEX_MCP] = Landmark::new(index_base.0, index_base.1, 0.0);
    for &idx in FINGERTIP_JOINTS.iter() {
        points[idx] = Landmark::new(wrist.0, wrist.1 - reach, 0.0);
    }
    LandmarkSet::new(points)
}

#[test]
fn small_hand_drives_extension_to_high_bound() {
    let cal = calibration();
    let mut pipeline = Pipeline::new(&cal, RecordingLink::new());

    let outcome = pipeline
        .process(Some(&hand((0.5, 0.5), (0.6, 0.5), 0.05)))
        .unwrap();

    assert_eq!(outcome.state, TrackingState::Tracking);
    assert_eq!(outcome.command.joint3(), 180);
    assert!(outcome.transmitted);
    assert_eq!(pipeline.link().writes().len(), 1);
    assert_eq!(pipeline.link().writes()[0][2], 180);
}

#[test]
fn identical_frames_are_sent_once() {
    let cal = calibration();
    let mut pipeline = Pipeline::new(&cal, RecordingLink::new());
    let pose = hand((0.45, 0.62), (0.52, 0.48), 0.3);

    let first = pipeline.process(Some(&pose)).unwrap();
    let second = pipeline.process(Some(&pose)).unwrap();

    assert_eq!(first.command, second.command);
    assert!(first.transmitted);
    assert!(!second.transmitted);
    assert_eq!(pipeline.link().writes().len(), 1);
}

#[test]
fn lost_hand_freezes_command_and_link() {
    let cal = calibration();
    let mut pipeline = Pipeline::new(&cal, RecordingLink::new());
    let pose = hand((0.4, 0.7), (0.5, 0.6), 0.02);

    let tracked = pipeline.process(Some(&pose)).unwrap();
    let lost = pipeline.process(None).unwrap();

    assert_eq!(lost.state, TrackingState::NoHand);
    assert_eq!(lost.command, tracked.command);
    assert!(!lost.transmitted);
    assert_eq!(pipeline.command(), tracked.command);
    assert_eq!(pipeline.last_sent(), Some(tracked.command));
    assert_eq!(pipeline.link().writes(), &[tracked.command.to_bytes()]);
}

#[test]
fn reacquired_hand_sends_only_on_change() {
    let cal = calibration();
    let mut pipeline = Pipeline::new(&cal, RecordingLink::new());
    let pose = hand((0.5, 0.5), (0.6, 0.5), 0.05);
    let fist = hand((0.5, 0.5), (0.6, 0.5), 0.02);

    pipeline.process(Some(&pose)).unwrap();
    pipeline.process(None).unwrap();
    // Misma pose tras perder la mano: nada que enviar
    assert!(!pipeline.process(Some(&pose)).unwrap().transmitted);
    // Cerrar el puño cambia sólo la pinza
    let closed = pipeline.process(Some(&fist)).unwrap();
    assert!(closed.transmitted);

    let writes = pipeline.link().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0][3], 60);
    assert_eq!(writes[1][3], 150);
    assert_eq!(writes[0][..3], writes[1][..3]);
}

#[test]
fn decoded_detector_lines_flow_through_pipeline() {
    let cal = calibration();
    let mut pipeline = Pipeline::new(&cal, RecordingLink::new());

    let pose = hand((0.5, 0.5), (0.6, 0.5), 0.05);
    let landmarks: Vec<String> = pose
        .points()
        .iter()
        .map(|lm| format!(r#"{{"x":{},"y":{},"z":{}}}"#, lm.x, lm.y, lm.z))
        .collect();
    let line = format!(r#"{{"hands":[{{"landmarks":[{}]}}]}}"#, landmarks.join(","));

    for text in [line.as_str(), r#"{"hands":[]}"#, line.as_str()] {
        let detection = decode_detection(text).unwrap().unwrap();
        pipeline.process(detection.as_ref()).unwrap();
    }

    let stats = pipeline.stats();
    assert_eq!(stats.frames, 3);
    assert_eq!(stats.frames_with_hand, 2);
    assert_eq!(stats.writes, 1);
    assert_eq!(pipeline.link().writes(), &[[180, 59, 180, 60]]);
}

#[test]
fn every_command_stays_within_axis_bounds() {
    let cal = calibration();
    let mut pipeline = Pipeline::new(&cal, RecordingLink::new());

    for i in 0..20 {
        for j in 0..20 {
            let wx = 0.05 + i as f64 * 0.045;
            let wy = 0.05 + j as f64 * 0.045;
            let pose = hand((wx, wy), (wx + 0.02 + j as f64 * 0.03, wy - 0.04), 0.01 * i as f64);
            let cmd = pipeline.process(Some(&pose)).unwrap().command;

            for (value, range) in [
                (cmd.joint1(), cal.joint1),
                (cmd.joint2(), cal.joint2),
                (cmd.joint3(), cal.joint3),
            ] {
                let (lo, hi) = range.output_bounds();
                assert!(value >= lo && value <= hi);
            }
            assert!(cmd.gripper() == cal.gripper_open || cmd.gripper() == cal.gripper_closed);
        }
    }
}
