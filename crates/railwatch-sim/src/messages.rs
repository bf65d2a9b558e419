//! ---
//! rw_section: "03-simulation"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Wire model for telemetry and defect broadcasts."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, IntoStaticStr};

/// Message pushed to every connected client, discriminated by `type`.
///
/// Consumers branch on `type` alone; unknown extra fields are ignored when
/// deserialising so newer producers stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryMessage {
    /// Periodic sample, `"type": "telemetry"`.
    Telemetry(TelemetrySample),
    /// Anomaly report, `"type": "defect"`.
    Defect(DefectEvent),
}

impl TelemetryMessage {
    /// Value of the `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryMessage::Telemetry(_) => "telemetry",
            TelemetryMessage::Defect(_) => "defect",
        }
    }

    /// Position carried by either message kind.
    pub fn gps(&self) -> GpsFix {
        match self {
            TelemetryMessage::Telemetry(sample) => sample.gps,
            TelemetryMessage::Defect(event) => event.gps,
        }
    }

    /// Chainage carried by either message kind.
    pub fn chainage_m(&self) -> u64 {
        match self {
            TelemetryMessage::Telemetry(sample) => sample.chainage_m,
            TelemetryMessage::Defect(event) => event.chainage_m,
        }
    }
}

impl From<TelemetrySample> for TelemetryMessage {
    fn from(sample: TelemetrySample) -> Self {
        TelemetryMessage::Telemetry(sample)
    }
}

impl From<DefectEvent> for TelemetryMessage {
    fn from(event: DefectEvent) -> Self {
        TelemetryMessage::Defect(event)
    }
}

/// Inertial acceleration triple. Axis semantics are left to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Imu {
    /// Acceleration along x, in g.
    pub ax: f64,
    /// Acceleration along y, in g.
    pub ay: f64,
    /// Acceleration along z, in g; near 1 at rest.
    pub az: f64,
}

/// Position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// Periodic measurement emitted once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Ground speed in km/h.
    pub speed_kmph: f64,
    /// Inertial reading for this sample.
    pub imu: Imu,
    /// Position at which the sample was taken.
    pub gps: GpsFix,
    /// Meters travelled since the stream started.
    pub chainage_m: u64,
}

/// Episodic anomaly correlated with the telemetry sample of the same tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectEvent {
    /// Kind of defect detected.
    pub class: DefectClass,
    /// Assessed severity.
    pub severity: Severity,
    /// Same position as the telemetry sample of the tick.
    pub gps: GpsFix,
    /// Same chainage as the telemetry sample of the tick.
    pub chainage_m: u64,
    /// Reserved for imagery links; always `null` from the generator.
    pub snapshot_url: Option<String>,
}

/// Category of track defect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DefectClass {
    /// Rail crack.
    Crack,
    /// Rolling contact fatigue squats.
    Squats,
    /// Missing or loose fastening.
    LooseFastener,
    /// Insulated joint fault.
    Insulation,
}

impl DefectClass {
    /// Every class, in declaration order.
    pub const ALL: [DefectClass; DefectClass::COUNT] = [
        DefectClass::Crack,
        DefectClass::Squats,
        DefectClass::LooseFastener,
        DefectClass::Insulation,
    ];

    /// Wire name, e.g. `loose_fastener`.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Severity grade attached to a defect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumCount, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// Monitor.
    Low,
    /// Schedule maintenance.
    Medium,
    /// Act immediately.
    High,
}

impl Severity {
    /// Every severity, lowest first.
    pub const ALL: [Severity; Severity::COUNT] = [Severity::Low, Severity::Medium, Severity::High];

    /// Wire name, e.g. `medium`.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use strum::IntoEnumIterator;

    fn sample() -> TelemetrySample {
        TelemetrySample {
            speed_kmph: 80.5,
            imu: Imu {
                ax: 0.1,
                ay: -0.2,
                az: 1.0,
            },
            gps: GpsFix {
                lat: 22.57001,
                lon: 88.36002,
            },
            chainage_m: 120,
        }
    }

    #[test]
    fn telemetry_serialises_flat_with_type_tag() {
        let value = serde_json::to_value(TelemetryMessage::from(sample())).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "telemetry",
                "speed_kmph": 80.5,
                "imu": {"ax": 0.1, "ay": -0.2, "az": 1.0},
                "gps": {"lat": 22.57001, "lon": 88.36002},
                "chainage_m": 120
            })
        );
    }

    #[test]
    fn defect_serialises_null_snapshot() {
        let event = DefectEvent {
            class: DefectClass::LooseFastener,
            severity: Severity::High,
            gps: sample().gps,
            chainage_m: 120,
            snapshot_url: None,
        };
        let value = serde_json::to_value(TelemetryMessage::from(event)).unwrap();
        assert_eq!(value["type"], "defect");
        assert_eq!(value["class"], "loose_fastener");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["snapshot_url"], Value::Null);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let text = r#"{"type":"defect","class":"squats","severity":"low","gps":{"lat":1.0,"lon":2.0},"chainage_m":3,"snapshot_url":null,"confidence":0.9}"#;
        let message: TelemetryMessage = serde_json::from_str(text).unwrap();
        assert_eq!(message.kind(), "defect");
        assert_eq!(message.chainage_m(), 3);
    }

    #[test]
    fn enum_tables_match_variants() {
        assert_eq!(DefectClass::iter().collect::<Vec<_>>(), DefectClass::ALL.to_vec());
        assert_eq!(Severity::iter().collect::<Vec<_>>(), Severity::ALL.to_vec());
        assert_eq!(DefectClass::LooseFastener.as_str(), "loose_fastener");
        assert_eq!(Severity::Medium.as_str(), "medium");
    }
}
