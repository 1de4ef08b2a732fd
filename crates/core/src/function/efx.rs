use lumen_fixtures::FixtureId;
use serde::{Deserialize, Serialize};

use super::{Direction, FunctionId, RunOrder, Speed};
use crate::bus::{BusSnapshot, SPEED_BUS};
use crate::errors::StartError;
use crate::patch::Patch;
use crate::pattern::pattern::to_unit;
use crate::pattern::Pattern;
use crate::universe::ChannelWrite;

/// Which pattern axis drives which movement channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisMapping {
    #[default]
    PanTilt,
    TiltPan,
}

/// How the pattern phase is spread across the participating fixtures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureOrder {
    /// Every fixture is at the same point of the shape.
    #[default]
    Parallel,
    /// Fixture `i` of `n` trails the first one by `i / n` of a cycle.
    Serial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfxFixture {
    pub fixture_id: FixtureId,
    pub reverse: bool,
    pub mapping: AxisMapping,
}

impl EfxFixture {
    pub fn new(fixture_id: FixtureId) -> Self {
        Self {
            fixture_id,
            reverse: false,
            mapping: AxisMapping::default(),
        }
    }

    pub fn reversed(fixture_id: FixtureId) -> Self {
        Self {
            reverse: true,
            ..Self::new(fixture_id)
        }
    }
}

/// Parametric pan/tilt movement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Efx {
    pub fixtures: Vec<EfxFixture>,
    pub pattern: Pattern,
    pub fixture_order: FixtureOrder,
    /// Duration of one full cycle.
    pub speed: Speed,
    pub run_order: RunOrder,
    pub direction: Direction,
    /// Started with the EFX and stopped with it.
    pub start_scene: Option<FunctionId>,
    /// Started once the EFX stops.
    pub stop_scene: Option<FunctionId>,
}

impl Efx {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            fixtures: Vec::new(),
            pattern,
            fixture_order: FixtureOrder::default(),
            speed: Speed::Bus(SPEED_BUS),
            run_order: RunOrder::default(),
            direction: Direction::default(),
            start_scene: None,
            stop_scene: None,
        }
    }

    pub fn with_fixtures(mut self, fixtures: Vec<EfxFixture>) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_run_order(mut self, run_order: RunOrder, direction: Direction) -> Self {
        self.run_order = run_order;
        self.direction = direction;
        self
    }

    pub fn with_fixture_order(mut self, fixture_order: FixtureOrder) -> Self {
        self.fixture_order = fixture_order;
        self
    }

    pub fn validate(&self, function_id: FunctionId, patch: &Patch) -> Result<(), StartError> {
        if let Some(missing) = self.fixtures.iter().find(|f| !patch.contains(f.fixture_id)) {
            return Err(StartError::MissingFixture {
                function_id,
                fixture_id: missing.fixture_id,
            });
        }
        self.pattern
            .validate()
            .map_err(|reason| StartError::InvalidPattern {
                function_id,
                reason,
            })
    }

    /// Fraction of a cycle covered in `dt` seconds. A non-positive or
    /// invalid cycle time freezes the phase.
    pub fn phase_delta(&self, dt: f64, buses: &BusSnapshot) -> Option<f64> {
        let cycle = self.speed.seconds(buses)?;
        if !cycle.is_finite() || cycle <= 0.0 || !dt.is_finite() {
            return Some(0.0);
        }
        Some(dt / cycle)
    }

    /// Phase of the fixture at `index` given the instance phase.
    pub fn fixture_phase(&self, phase: f64, index: usize) -> f64 {
        match self.fixture_order {
            FixtureOrder::Parallel => phase,
            FixtureOrder::Serial => {
                let offset = index as f64 / self.fixtures.len().max(1) as f64;
                (phase + offset).rem_euclid(1.0)
            }
        }
    }

    pub fn render(&self, phase: f64, patch: &Patch, out: &mut Vec<ChannelWrite>) {
        for (index, member) in self.fixtures.iter().enumerate() {
            let Some(fixture) = patch.get(member.fixture_id) else {
                continue;
            };

            let (x, y) = self
                .pattern
                .point(self.fixture_phase(phase, index), member.reverse);
            let (pan, tilt) = match member.mapping {
                AxisMapping::PanTilt => (to_unit(x), to_unit(y)),
                AxisMapping::TiltPan => (to_unit(y), to_unit(x)),
            };

            let limits = fixture.pan_tilt_limits;
            let axes = [
                (fixture.pan_channel(), limits.pan.to_dmx(pan)),
                (fixture.tilt_channel(), limits.tilt.to_dmx(tilt)),
            ];
            for (channel, value) in axes {
                if let Some(address) = channel.and_then(|c| fixture.address_of(c)) {
                    out.push(ChannelWrite {
                        universe: fixture.universe,
                        address,
                        value,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lumen_fixtures::{AxisRange, Fixture, FixtureLibrary};

    use super::*;
    use crate::bus::BusRegistry;
    use crate::pattern::{PatternKind, PatternParams};

    fn patch() -> Patch {
        let library = FixtureLibrary::new();
        let profile = library.get("shehds-led-spot-60w").cloned().unwrap();
        let mut patch = Patch::new();
        for i in 0..4 {
            let mut fixture = Fixture::new(i, "Spot", profile.clone(), 1, 1 + i as u16 * 10);
            fixture.set_pan_tilt_limits(AxisRange::new(25.0, 75.0), AxisRange::new(10.0, 50.0));
            patch.add(fixture).unwrap();
        }
        patch
    }

    #[test]
    fn test_render_within_limits() {
        let patch = patch();
        let efx = Efx::new(Pattern::new(PatternKind::Eight))
            .with_fixtures((0..4).map(EfxFixture::new).collect());

        for step in 0..=200 {
            let mut out = Vec::new();
            efx.render(step as f64 / 200.0, &patch, &mut out);
            assert_eq!(out.len(), 8);
            for write in out {
                let offset = (write.address - 1) % 10;
                match offset {
                    0 => assert!((64..=191).contains(&write.value), "pan {}", write.value),
                    1 => assert!((26..=128).contains(&write.value), "tilt {}", write.value),
                    _ => panic!("unexpected channel {}", write.address),
                }
            }
        }
    }

    #[test]
    fn test_offsets_are_clamped() {
        let patch = patch();
        let pattern = Pattern::with_params(
            PatternKind::Circle,
            PatternParams {
                x_offset: 5.0,
                y_offset: -5.0,
                ..PatternParams::default()
            },
        );
        let efx = Efx::new(pattern).with_fixtures(vec![EfxFixture::new(0)]);
        let mut out = Vec::new();
        efx.render(0.3, &patch, &mut out);
        assert_eq!(out[0].value, 191);
        assert_eq!(out[1].value, 26);
    }

    #[test]
    fn test_reverse_and_mapping() {
        let patch = patch();
        let efx = Efx::new(Pattern::new(PatternKind::Circle)).with_fixtures(vec![
            EfxFixture::new(0),
            EfxFixture::reversed(1),
            EfxFixture {
                mapping: AxisMapping::TiltPan,
                ..EfxFixture::new(2)
            },
        ]);
        let mut out = Vec::new();
        // Circle at phase 0 sits at (0, 1)
        efx.render(0.0, &patch, &mut out);
        let values: Vec<u8> = out.iter().map(|w| w.value).collect();
        assert_eq!(values, vec![128, 128, 128, 26, 191, 77]);
    }

    #[test]
    fn test_serial_phase_offsets() {
        let efx = Efx::new(Pattern::default())
            .with_fixtures((0..4).map(EfxFixture::new).collect())
            .with_fixture_order(FixtureOrder::Serial);
        assert_eq!(efx.fixture_phase(0.5, 0), 0.5);
        assert_eq!(efx.fixture_phase(0.5, 1), 0.75);
        assert_eq!(efx.fixture_phase(0.5, 2), 0.0);
    }

    #[test]
    fn test_phase_delta() {
        let registry = BusRegistry::new();
        registry.set(SPEED_BUS, 2.0);
        let efx = Efx::new(Pattern::default());
        assert_eq!(efx.phase_delta(0.5, &registry.snapshot()), Some(0.25));

        registry.set(SPEED_BUS, 0.0);
        assert_eq!(efx.phase_delta(0.5, &registry.snapshot()), Some(0.0));

        registry.remove(SPEED_BUS);
        assert_eq!(efx.phase_delta(0.5, &registry.snapshot()), None);
    }

    #[test]
    fn test_invalid_pattern_refuses_start() {
        let mut pattern = Pattern::default();
        pattern.params.rotation = f64::INFINITY;
        let efx = Efx::new(pattern).with_fixtures(vec![EfxFixture::new(0)]);
        assert!(matches!(
            efx.validate(3, &patch()),
            Err(StartError::InvalidPattern { function_id: 3, .. })
        ));
    }
}
