use lumen_fixtures::FixtureId;
use serde::{Deserialize, Serialize};

use super::FunctionId;
use crate::errors::StartError;
use crate::patch::Patch;
use crate::universe::ChannelWrite;

/// Target level for one channel of one fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneValue {
    pub fixture_id: FixtureId,
    /// Channel index within the fixture, 0-based.
    pub channel: usize,
    pub value: u8,
    /// Disabled values are kept in the scene but never written.
    pub enabled: bool,
}

/// A static look.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scene {
    pub values: Vec<SceneValue>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, fixture_id: FixtureId, channel: usize, value: u8) -> Self {
        self.set_value(fixture_id, channel, value);
        self
    }

    /// Set or replace the level for a channel. The value is enabled.
    pub fn set_value(&mut self, fixture_id: FixtureId, channel: usize, value: u8) {
        match self
            .values
            .iter_mut()
            .find(|v| v.fixture_id == fixture_id && v.channel == channel)
        {
            Some(existing) => {
                existing.value = value;
                existing.enabled = true;
            }
            None => self.values.push(SceneValue {
                fixture_id,
                channel,
                value,
                enabled: true,
            }),
        }
    }

    /// Returns false if the scene has no value for that channel.
    pub fn set_enabled(&mut self, fixture_id: FixtureId, channel: usize, enabled: bool) -> bool {
        match self
            .values
            .iter_mut()
            .find(|v| v.fixture_id == fixture_id && v.channel == channel)
        {
            Some(existing) => {
                existing.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn remove_fixture(&mut self, fixture_id: FixtureId) {
        self.values.retain(|v| v.fixture_id != fixture_id);
    }

    pub fn fixtures(&self) -> Vec<FixtureId> {
        let mut fixtures: Vec<FixtureId> = self.values.iter().map(|v| v.fixture_id).collect();
        fixtures.sort_unstable();
        fixtures.dedup();
        fixtures
    }

    pub fn validate(&self, function_id: FunctionId, patch: &Patch) -> Result<(), StartError> {
        for value in &self.values {
            let fixture = patch
                .get(value.fixture_id)
                .ok_or(StartError::MissingFixture {
                    function_id,
                    fixture_id: value.fixture_id,
                })?;
            if value.channel >= fixture.channel_count() {
                return Err(StartError::InvalidChannel {
                    function_id,
                    fixture_id: value.fixture_id,
                    channel: value.channel,
                });
            }
        }
        Ok(())
    }

    pub fn render(&self, patch: &Patch, out: &mut Vec<ChannelWrite>) {
        for value in self.values.iter().filter(|v| v.enabled) {
            let Some(fixture) = patch.get(value.fixture_id) else {
                continue;
            };
            if let Some(address) = fixture.address_of(value.channel) {
                out.push(ChannelWrite {
                    universe: fixture.universe,
                    address,
                    value: value.value,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lumen_fixtures::{Fixture, FixtureLibrary};

    use super::*;

    fn patch() -> Patch {
        let library = FixtureLibrary::new();
        let mut patch = Patch::new();
        let profile = library.get("generic-rgb").cloned().unwrap();
        patch.add(Fixture::new(1, "RGB", profile, 2, 10)).unwrap();
        patch
    }

    #[test]
    fn test_render_skips_disabled_values() {
        let mut scene = Scene::new().with_value(1, 0, 128).with_value(1, 2, 64);
        scene.set_value(1, 1, 200);
        assert!(scene.set_enabled(1, 1, false));

        let mut out = Vec::new();
        scene.render(&patch(), &mut out);
        assert_eq!(
            out,
            vec![
                ChannelWrite {
                    universe: 2,
                    address: 10,
                    value: 128
                },
                ChannelWrite {
                    universe: 2,
                    address: 12,
                    value: 64
                },
            ]
        );
    }

    #[test]
    fn test_set_value_replaces() {
        let mut scene = Scene::new().with_value(1, 0, 10);
        scene.set_enabled(1, 0, false);
        scene.set_value(1, 0, 20);
        assert_eq!(scene.values.len(), 1);
        assert_eq!(scene.values[0].value, 20);
        assert!(scene.values[0].enabled);
        assert!(!scene.set_enabled(1, 5, true));
    }

    #[test]
    fn test_validate_channel_range() {
        let scene = Scene::new().with_value(1, 3, 255);
        assert_eq!(
            scene.validate(7, &patch()),
            Err(StartError::InvalidChannel {
                function_id: 7,
                fixture_id: 1,
                channel: 3
            })
        );
        assert!(Scene::new().with_value(1, 2, 255).validate(7, &patch()).is_ok());
    }
}
