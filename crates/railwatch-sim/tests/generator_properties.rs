//! ---
//! rw_section: "03-simulation"
//! rw_subsection: "tests"
//! rw_type: "source"
//! rw_scope: "test"
//! rw_description: "Field-range and correlation guarantees of generated messages."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::time::Duration;

use railwatch_hub::testing::RecordingConnection;
use railwatch_hub::ConnectionHub;
use railwatch_sim::{
    DefectClass, GeneratorProfile, Severity, TelemetryGenerator, TelemetryMessage,
    TelemetryStream,
};
use serde_json::Value;

const TICKS: u64 = 20_000;

fn elapsed_for(step: u64) -> Duration {
    Duration::from_millis(step * 250 + step % 7)
}

#[test]
fn telemetry_fields_stay_within_published_ranges() {
    let mut generator = TelemetryGenerator::new(GeneratorProfile::default(), 0xC0FFEE).unwrap();
    for step in 0..TICKS {
        let elapsed = elapsed_for(step);
        let sample = generator.tick(elapsed).telemetry;
        assert!((75.0..=85.0).contains(&sample.speed_kmph), "speed {}", sample.speed_kmph);
        assert!((-0.5..=0.5).contains(&sample.imu.ax));
        assert!((-0.5..=0.5).contains(&sample.imu.ay));
        assert!((0.8..=1.2).contains(&sample.imu.az), "az {}", sample.imu.az);
        assert!(sample.gps.lat >= 22.57 && sample.gps.lat <= 22.57 + 1e-4);
        assert!(sample.gps.lon >= 88.36 && sample.gps.lon <= 88.36 + 1e-4);
        assert_eq!(
            sample.chainage_m,
            (elapsed.as_secs_f64() * 20.0).floor() as u64
        );
    }
}

#[test]
fn defects_share_position_with_their_tick() {
    let mut generator = TelemetryGenerator::new(GeneratorProfile::default(), 77).unwrap();
    let mut classes = HashSet::new();
    let mut severities = HashSet::new();
    let mut defects = 0u64;

    for step in 0..TICKS {
        let tick = generator.tick(elapsed_for(step));
        if let Some(defect) = &tick.defect {
            defects += 1;
            assert_eq!(defect.gps.lat.to_bits(), tick.telemetry.gps.lat.to_bits());
            assert_eq!(defect.gps.lon.to_bits(), tick.telemetry.gps.lon.to_bits());
            assert_eq!(defect.chainage_m, tick.telemetry.chainage_m);
            assert!(defect.snapshot_url.is_none());
            classes.insert(defect.class);
            severities.insert(defect.severity);
        }
    }

    // 5% of 20k ticks; bounds are loose enough to never flake on a fixed seed.
    assert!((600..=1_400).contains(&defects), "defects {defects}");
    assert_eq!(classes, DefectClass::ALL.into_iter().collect());
    assert_eq!(severities, Severity::ALL.into_iter().collect());
}

#[test]
fn wire_records_carry_type_discriminator() {
    let profile = GeneratorProfile::default().with_defect_probability(1.0);
    let mut generator = TelemetryGenerator::new(profile, 3).unwrap();
    let tick = generator.tick(Duration::from_millis(1_500));

    let records: Vec<Value> = tick
        .messages()
        .iter()
        .map(|message| serde_json::to_value(message).unwrap())
        .collect();

    assert_eq!(records[0]["type"], "telemetry");
    assert_eq!(records[0]["chainage_m"], 30);
    for key in ["speed_kmph", "imu", "gps"] {
        assert!(records[0].get(key).is_some(), "telemetry missing {key}");
    }
    assert_eq!(records[1]["type"], "defect");
    assert_eq!(records[1]["snapshot_url"], Value::Null);
    for key in ["class", "severity", "gps", "chainage_m"] {
        assert!(records[1].get(key).is_some(), "defect missing {key}");
    }
    assert_eq!(records[1]["gps"], records[0]["gps"]);
}

#[tokio::test]
async fn bounded_stepping_feeds_every_client_in_emission_order() {
    let hub = ConnectionHub::default();
    let clients: Vec<_> = (0..3).map(|_| RecordingConnection::new()).collect();
    for client in &clients {
        hub.connect(client.clone());
    }
    let generator = TelemetryGenerator::new(
        GeneratorProfile::default().with_defect_probability(0.3),
        2024,
    )
    .unwrap();
    let mut stream = TelemetryStream::new(hub, generator, Duration::from_millis(250));

    let mut expected_kinds = Vec::new();
    for step in 0..40u64 {
        let tick = stream.step(Duration::from_millis(step * 250)).await.unwrap();
        expected_kinds.extend(tick.messages().iter().map(TelemetryMessage::kind));
    }

    for client in &clients {
        let kinds: Vec<String> = client
            .received()
            .iter()
            .map(|text| {
                let value: Value = serde_json::from_str(text).unwrap();
                value["type"].as_str().unwrap().to_owned()
            })
            .collect();
        assert_eq!(kinds, expected_kinds);
    }
    assert_eq!(clients[0].received(), clients[1].received());
    assert_eq!(clients[1].received(), clients[2].received());
}
