//! ---
//! rw_section: "03-simulation"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Synthetic telemetry and defect generation."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::prelude::*;

use crate::messages::{
    DefectClass, DefectEvent, GpsFix, Imu, Severity, TelemetryMessage, TelemetrySample,
};

/// Shape of the synthetic stream. Defaults are the published field ranges
/// that client fixtures rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorProfile {
    /// Centre of the speed distribution.
    pub base_speed_kmph: f64,
    /// Uniform jitter applied either side of `base_speed_kmph`.
    pub speed_jitter_kmph: f64,
    /// Nominal position around which fixes are scattered.
    pub origin: GpsFix,
    /// Width of the uniform offset added to `origin` on each axis.
    pub gps_jitter_deg: f64,
    /// Distance covered per second of stream time.
    pub chainage_rate_m_per_s: f64,
    /// Independent chance per tick of emitting a defect.
    pub defect_probability: f64,
}

impl Default for GeneratorProfile {
    fn default() -> Self {
        Self {
            base_speed_kmph: 80.0,
            speed_jitter_kmph: 5.0,
            origin: GpsFix {
                lat: 22.57,
                lon: 88.36,
            },
            gps_jitter_deg: 1e-4,
            chainage_rate_m_per_s: 20.0,
            defect_probability: 0.05,
        }
    }
}

impl GeneratorProfile {
    /// Replace the per-tick defect probability.
    pub fn with_defect_probability(mut self, probability: f64) -> Self {
        self.defect_probability = probability;
        self
    }

    /// Reject probabilities outside [0, 1] and negative or non-finite widths.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.defect_probability) {
            return Err(anyhow!(
                "defect probability must lie within [0, 1], got {}",
                self.defect_probability
            ));
        }
        let non_negative = |value: f64| value.is_finite() && value >= 0.0;
        if !non_negative(self.speed_jitter_kmph) || !non_negative(self.gps_jitter_deg) {
            return Err(anyhow!("jitter widths must be finite and non-negative"));
        }
        if !non_negative(self.chainage_rate_m_per_s) {
            return Err(anyhow!("chainage rate must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Output of a single tick: one telemetry sample and an optional defect at
/// the same position.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Always present.
    pub telemetry: TelemetrySample,
    /// Present on roughly `defect_probability` of ticks.
    pub defect: Option<DefectEvent>,
}

impl Tick {
    /// Messages in broadcast order: telemetry first, then the defect.
    pub fn messages(&self) -> Vec<TelemetryMessage> {
        let mut messages = Vec::with_capacity(2);
        messages.push(TelemetryMessage::Telemetry(self.telemetry.clone()));
        if let Some(defect) = &self.defect {
            messages.push(TelemetryMessage::Defect(defect.clone()));
        }
        messages
    }
}

/// Anything that can produce a [`Tick`] for a given elapsed stream time.
pub trait TickSource: Send {
    /// Produce the tick for `elapsed` time since the stream started.
    fn tick(&mut self, elapsed: Duration) -> Tick;
}

/// Random-walk free generator: every tick is drawn independently.
#[derive(Debug)]
pub struct TelemetryGenerator {
    profile: GeneratorProfile,
    rng: StdRng,
}

impl TelemetryGenerator {
    /// Deterministic generator seeded with `seed`.
    pub fn new(profile: GeneratorProfile, seed: u64) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy(profile: GeneratorProfile) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            rng: StdRng::from_entropy(),
        })
    }

    /// Seeded when `seed` is given, entropy otherwise.
    pub fn with_optional_seed(profile: GeneratorProfile, seed: Option<u64>) -> Result<Self> {
        match seed {
            Some(seed) => Self::new(profile, seed),
            None => Self::from_entropy(profile),
        }
    }

    /// Chainage in whole meters for `elapsed` stream time.
    pub fn chainage_at(&self, elapsed: Duration) -> u64 {
        (elapsed.as_secs_f64() * self.profile.chainage_rate_m_per_s).floor() as u64
    }

    /// Produce the messages for one tick at `elapsed` since stream start.
    pub fn tick(&mut self, elapsed: Duration) -> Tick {
        let telemetry = self.sample(elapsed);
        let defect = if self.rng.gen_bool(self.profile.defect_probability) {
            Some(self.defect_at(telemetry.gps, telemetry.chainage_m))
        } else {
            None
        };
        Tick { telemetry, defect }
    }

    fn sample(&mut self, elapsed: Duration) -> TelemetrySample {
        let profile = &self.profile;
        let speed_kmph = profile.base_speed_kmph
            + profile.speed_jitter_kmph * (2.0 * self.rng.gen::<f64>() - 1.0);
        let imu = Imu {
            ax: self.rng.gen_range(-0.5..=0.5),
            ay: self.rng.gen_range(-0.5..=0.5),
            az: self.rng.gen_range(0.8..=1.2),
        };
        let gps = GpsFix {
            lat: profile.origin.lat + self.rng.gen::<f64>() * profile.gps_jitter_deg,
            lon: profile.origin.lon + self.rng.gen::<f64>() * profile.gps_jitter_deg,
        };
        TelemetrySample {
            speed_kmph,
            imu,
            gps,
            chainage_m: self.chainage_at(elapsed),
        }
    }

    fn defect_at(&mut self, gps: GpsFix, chainage_m: u64) -> DefectEvent {
        DefectEvent {
            class: DefectClass::ALL[self.rng.gen_range(0..DefectClass::ALL.len())],
            severity: Severity::ALL[self.rng.gen_range(0..Severity::ALL.len())],
            gps,
            chainage_m,
            snapshot_url: None,
        }
    }
}

impl TickSource for TelemetryGenerator {
    fn tick(&mut self, elapsed: Duration) -> Tick {
        TelemetryGenerator::tick(self, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generators_are_reproducible() {
        let mut a = TelemetryGenerator::new(GeneratorProfile::default(), 42).unwrap();
        let mut b = TelemetryGenerator::new(GeneratorProfile::default(), 42).unwrap();
        for step in 0..50u64 {
            let elapsed = Duration::from_millis(step * 250);
            assert_eq!(a.tick(elapsed), b.tick(elapsed));
        }
    }

    #[test]
    fn chainage_floors_elapsed_times_rate() {
        let generator = TelemetryGenerator::new(GeneratorProfile::default(), 1).unwrap();
        assert_eq!(generator.chainage_at(Duration::ZERO), 0);
        assert_eq!(generator.chainage_at(Duration::from_millis(49)), 0);
        assert_eq!(generator.chainage_at(Duration::from_millis(50)), 1);
        assert_eq!(generator.chainage_at(Duration::from_millis(1_260)), 25);
    }

    #[test]
    fn zero_probability_never_emits_defects() {
        let profile = GeneratorProfile::default().with_defect_probability(0.0);
        let mut generator = TelemetryGenerator::new(profile, 3).unwrap();
        assert!((0..500).all(|i| generator.tick(Duration::from_secs(i)).defect.is_none()));
    }

    #[test]
    fn certain_probability_always_emits_defects() {
        let profile = GeneratorProfile::default().with_defect_probability(1.0);
        let mut generator = TelemetryGenerator::new(profile, 3).unwrap();
        let tick = generator.tick(Duration::from_secs(2));
        assert_eq!(tick.messages().len(), 2);
        assert_eq!(tick.messages()[0].kind(), "telemetry");
        assert_eq!(tick.messages()[1].kind(), "defect");
    }

    #[test]
    fn invalid_profile_is_rejected() {
        let profile = GeneratorProfile::default().with_defect_probability(-0.1);
        assert!(TelemetryGenerator::new(profile, 0).is_err());
        let profile = GeneratorProfile {
            gps_jitter_deg: f64::NAN,
            ..GeneratorProfile::default()
        };
        assert!(TelemetryGenerator::from_entropy(profile).is_err());
    }
}
