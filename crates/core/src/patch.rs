use std::collections::{BTreeMap, HashMap};

use lumen_fixtures::{Fixture, FixtureId, UniverseId, UNIVERSE_SIZE};

use crate::errors::PatchError;

/// Registry of patched fixtures.
///
/// Besides the fixtures themselves the patch keeps a per-universe intensity
/// mask so the grand master can decide which channels it applies to without
/// walking every fixture each tick.
#[derive(Clone, Debug, Default)]
pub struct Patch {
    fixtures: BTreeMap<FixtureId, Fixture>,
    intensity_masks: HashMap<UniverseId, Vec<bool>>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fixture: Fixture) -> Result<FixtureId, PatchError> {
        if self.fixtures.contains_key(&fixture.id) {
            return Err(PatchError::DuplicateId(fixture.id));
        }

        if fixture.channels.is_empty() || !fixture.fits_universe() {
            return Err(PatchError::AddressOutOfRange {
                fixture_id: fixture.id,
                universe: fixture.universe,
                address: fixture.start_address,
            });
        }

        if let Some(other) = self.fixtures.values().find(|other| {
            other.universe == fixture.universe
                && other.start_address <= fixture.end_address()
                && fixture.start_address <= other.end_address()
        }) {
            return Err(PatchError::AddressConflict {
                fixture_id: fixture.id,
                other_id: other.id,
                universe: fixture.universe,
            });
        }

        let id = fixture.id;
        let universe = fixture.universe;
        log::info!(
            "Patched fixture {} ({}) at {}.{}",
            id,
            fixture.name,
            universe,
            fixture.start_address
        );
        self.fixtures.insert(id, fixture);
        self.rebuild_mask(universe);
        Ok(id)
    }

    pub fn remove(&mut self, id: FixtureId) -> Result<Fixture, PatchError> {
        let fixture = self
            .fixtures
            .remove(&id)
            .ok_or(PatchError::UnknownFixture(id))?;
        self.rebuild_mask(fixture.universe);
        log::info!("Unpatched fixture {} ({})", id, fixture.name);
        Ok(fixture)
    }

    /// Replace a fixture definition in place, e.g. after editing pan/tilt limits.
    pub fn update(&mut self, fixture: Fixture) -> Result<(), PatchError> {
        let previous = self.remove(fixture.id)?;
        if let Err(e) = self.add(fixture) {
            // Put the old definition back so the patch never loses a fixture.
            let _ = self.add(previous);
            return Err(e);
        }
        Ok(())
    }

    pub fn get(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(&id)
    }

    pub fn get_mut(&mut self, id: FixtureId) -> Option<&mut Fixture> {
        self.fixtures.get_mut(&id)
    }

    pub fn contains(&self, id: FixtureId) -> bool {
        self.fixtures.contains_key(&id)
    }

    pub fn fixtures(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.values()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Universes that have at least one fixture patched.
    pub fn universes(&self) -> Vec<UniverseId> {
        let mut universes: Vec<UniverseId> = self.fixtures.values().map(|f| f.universe).collect();
        universes.sort_unstable();
        universes.dedup();
        universes
    }

    /// Whether the grand master's intensity scope covers a channel. Channels
    /// that no fixture claims are treated as plain dimmers.
    pub fn is_intensity(&self, universe: UniverseId, address: u16) -> bool {
        if address == 0 || address as usize > UNIVERSE_SIZE {
            return false;
        }
        self.intensity_masks
            .get(&universe)
            .map(|mask| mask[address as usize - 1])
            .unwrap_or(true)
    }

    fn rebuild_mask(&mut self, universe: UniverseId) {
        let mut mask = vec![true; UNIVERSE_SIZE];
        for fixture in self.fixtures.values().filter(|f| f.universe == universe) {
            for (index, channel) in fixture.channels.iter().enumerate() {
                if let Some(address) = fixture.address_of(index) {
                    mask[address as usize - 1] = channel.channel_type.is_intensity();
                }
            }
        }
        self.intensity_masks.insert(universe, mask);
    }
}
