use lumen_fixtures::UniverseId;
use serde::{Deserialize, Serialize};

use crate::patch::Patch;
use crate::universe::Universes;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrandMasterMode {
    /// Scale channels proportionally.
    #[default]
    Reduce,
    /// Cap channels at the master level.
    Limit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrandMasterScope {
    /// Only channels whose role produces light.
    #[default]
    Intensity,
    All,
}

/// Final scaling stage applied to every frame before output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrandMaster {
    mode: GrandMasterMode,
    scope: GrandMasterScope,
    level: u8,
}

impl GrandMaster {
    pub fn new(mode: GrandMasterMode, scope: GrandMasterScope) -> Self {
        Self {
            mode,
            scope,
            level: u8::MAX,
        }
    }

    pub fn mode(&self) -> GrandMasterMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GrandMasterMode) {
        self.mode = mode;
    }

    pub fn scope(&self) -> GrandMasterScope {
        self.scope
    }

    pub fn set_scope(&mut self, scope: GrandMasterScope) {
        self.scope = scope;
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = level;
    }

    /// Set the level from a percentage. Truncates, so 50% gives 127.
    /// NaN leaves the level untouched.
    pub fn set_percent(&mut self, percent: f64) {
        if percent.is_nan() {
            log::warn!("Ignoring NaN grand master level");
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        self.level = (percent * 255.0 / 100.0).floor() as u8;
    }

    pub fn percent(&self) -> f64 {
        self.level as f64 * 100.0 / 255.0
    }

    pub fn applies_to(&self, patch: &Patch, universe: UniverseId, address: u16) -> bool {
        match self.scope {
            GrandMasterScope::All => true,
            GrandMasterScope::Intensity => patch.is_intensity(universe, address),
        }
    }

    pub fn apply_value(&self, value: u8) -> u8 {
        match self.mode {
            GrandMasterMode::Reduce => (value as u32 * self.level as u32 / 255) as u8,
            GrandMasterMode::Limit => value.min(self.level),
        }
    }

    pub fn apply(&self, frame: &mut Universes, patch: &Patch) {
        if self.level == u8::MAX {
            return;
        }
        for (universe, data) in frame.iter_mut() {
            for (index, value) in data.iter_mut().enumerate() {
                if *value != 0 && self.applies_to(patch, universe, index as u16 + 1) {
                    *value = self.apply_value(*value);
                }
            }
        }
    }
}

impl Default for GrandMaster {
    fn default() -> Self {
        Self::new(GrandMasterMode::default(), GrandMasterScope::default())
    }
}

#[cfg(test)]
mod tests {
    use lumen_fixtures::{Fixture, FixtureLibrary};

    use super::*;

    fn patch() -> Patch {
        let library = FixtureLibrary::new();
        let mut patch = Patch::new();
        let profile = library.get("shehds-led-spot-60w").cloned().unwrap();
        patch.add(Fixture::new(1, "Spot", profile, 1, 1)).unwrap();
        patch
    }

    #[test]
    fn test_percent_truncates() {
        let mut master = GrandMaster::default();
        master.set_percent(50.0);
        assert_eq!(master.level(), 127);
        master.set_percent(150.0);
        assert_eq!(master.level(), 255);
        master.set_percent(f64::NAN);
        assert_eq!(master.level(), 255);
        master.set_percent(-3.0);
        assert_eq!(master.level(), 0);
    }

    #[test]
    fn test_reduce_and_limit() {
        let mut master = GrandMaster::default();
        master.set_percent(50.0);
        assert_eq!(master.apply_value(255), 127);
        assert_eq!(master.apply_value(100), 49);

        master.set_mode(GrandMasterMode::Limit);
        assert_eq!(master.apply_value(255), 127);
        assert_eq!(master.apply_value(100), 100);
    }

    #[test]
    fn test_scope() {
        let patch = patch();
        let mut frame = Universes::new();
        // Pan (1), dimmer (6) and an unpatched channel (20)
        frame.set(1, 1, 255);
        frame.set(1, 6, 255);
        frame.set(1, 20, 255);

        let mut master = GrandMaster::new(GrandMasterMode::Limit, GrandMasterScope::Intensity);
        master.set_percent(50.0);
        master.apply(&mut frame, &patch);
        assert_eq!(frame.get(1, 1), 255);
        assert_eq!(frame.get(1, 6), 127);
        assert_eq!(frame.get(1, 20), 127);

        master.set_scope(GrandMasterScope::All);
        master.apply(&mut frame, &patch);
        assert_eq!(frame.get(1, 1), 127);
    }
}
