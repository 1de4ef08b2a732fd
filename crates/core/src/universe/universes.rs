use std::collections::BTreeMap;

use lumen_fixtures::{UniverseId, UNIVERSE_SIZE};

/// A single channel level produced by a running function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelWrite {
    pub universe: UniverseId,
    /// 1-based DMX address.
    pub address: u16,
    pub value: u8,
}

/// Per-universe output levels, rebuilt from scratch every tick.
#[derive(Clone, Debug, Default)]
pub struct Universes {
    frames: BTreeMap<UniverseId, Vec<u8>>,
}

impl Universes {
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }

    /// Make sure a universe is present, zero-filled if it is new.
    pub fn ensure(&mut self, universe: UniverseId) -> &mut Vec<u8> {
        self.frames
            .entry(universe)
            .or_insert_with(|| vec![0; UNIVERSE_SIZE])
    }

    /// Zero every channel while keeping the set of universes.
    pub fn clear(&mut self) {
        for data in self.frames.values_mut() {
            data.fill(0);
        }
    }

    pub fn get(&self, universe: UniverseId, address: u16) -> u8 {
        if address == 0 || address as usize > UNIVERSE_SIZE {
            return 0;
        }
        self.frames
            .get(&universe)
            .map(|data| data[address as usize - 1])
            .unwrap_or(0)
    }

    /// Write a level. Out-of-range addresses are ignored.
    pub fn set(&mut self, universe: UniverseId, address: u16, value: u8) {
        if address == 0 || address as usize > UNIVERSE_SIZE {
            log::warn!("Ignoring write to invalid address {}.{}", universe, address);
            return;
        }
        self.ensure(universe)[address as usize - 1] = value;
    }

    pub fn apply(&mut self, write: &ChannelWrite) {
        self.set(write.universe, write.address, write.value);
    }

    pub fn universe(&self, universe: UniverseId) -> Option<&[u8]> {
        self.frames.get(&universe).map(|d| d.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (UniverseId, &[u8])> {
        self.frames.iter().map(|(u, d)| (*u, d.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (UniverseId, &mut [u8])> {
        self.frames.iter_mut().map(|(u, d)| (*u, d.as_mut_slice()))
    }

    pub fn universe_ids(&self) -> Vec<UniverseId> {
        self.frames.keys().copied().collect()
    }

    /// Owned copy of every universe, for handing to output plugins.
    pub fn snapshot(&self) -> Vec<(UniverseId, Vec<u8>)> {
        self.frames.iter().map(|(u, d)| (*u, d.clone())).collect()
    }
}
