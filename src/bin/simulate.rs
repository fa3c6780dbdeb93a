// src/bin/simulate.rs
//
// Replay a scripted driveway scenario through the tracking core on a
// simulated clock and print every fired event as one JSON line. Useful for
// eyeballing event behavior and tuning thresholds without a camera.

use anyhow::Result;
use tracing::info;

use yardwatch::types::{Detection, ObjectClass};
use yardwatch::{Config, EventDetector};

fn car(bbox: [i32; 4]) -> Detection {
    let mut det = Detection::new(ObjectClass::Car, 0.87, bbox);
    det.signature = Some("silver_car".to_string());
    det.color = Some("silver".to_string());
    det.description = Some("silver car".to_string());
    det
}

fn person(bbox: [i32; 4]) -> Detection {
    Detection::new(ObjectClass::Person, 0.81, bbox)
}

fn package(bbox: [i32; 4]) -> Detection {
    Detection::new(ObjectClass::Package, 0.74, bbox)
}

fn main() -> Result<()> {
    let config = Config::load("config.yaml").unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(format!("yardwatch={}", config.logging.level))
        .init();

    info!("replaying scripted scenario");
    let mut detector = EventDetector::new(config.tracking.clone());
    detector.on_event(|event| {
        println!("{}", event.to_record());
    });

    // 10 Hz feed. A car pulls in at t=15 and stays; a visitor walks up at
    // t=40 and waits by the door; a package lands at t=70.
    let mut t = 0.0_f64;
    while t <= 300.0 {
        let mut frame: Vec<Detection> = Vec::new();
        if t >= 15.0 {
            frame.push(car([420, 310, 760, 520]));
        }
        if t >= 40.0 {
            let jitter = ((t * 10.0) as i32) % 4;
            frame.push(person([110 + jitter, 90, 170 + jitter, 300]));
        }
        if t >= 70.0 {
            frame.push(package([520, 610, 600, 670]));
        }
        detector.update(&mut frame, 1280, 720, t);
        t += 0.1;
    }

    // The car drives off; give the tolerant gone-timeout room to fire.
    while t <= 400.0 {
        detector.update(&mut [], 1280, 720, t);
        t += 0.5;
    }

    let stats = detector.parking_stats();
    info!(
        "done: {} active tracks, {} parked, {} stopped",
        detector.active_count(),
        stats.parked_count,
        stats.stopped_count
    );
    Ok(())
}
