use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub type BusId = u32;

/// Seconds for a default fade.
pub const FADE_BUS: BusId = 0;
/// Seconds a chaser step holds before advancing.
pub const HOLD_BUS: BusId = 1;
/// Seconds per EFX cycle.
pub const SPEED_BUS: BusId = 2;

/// Valid value range of a bus. Time buses are in seconds, level buses are
/// dimensionless (0.0 to 1.0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusRange {
    min: f64,
    max: f64,
}

impl BusRange {
    /// Bounds are swapped if given in the wrong order. A non-finite bound
    /// falls back to 0.0 for `min` and to `min` for `max`.
    pub fn new(min: f64, max: f64) -> Self {
        let min = if min.is_finite() { min } else { 0.0 };
        let max = if max.is_finite() { max } else { min };
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn seconds(max: f64) -> Self {
        Self::new(0.0, max)
    }

    pub fn level() -> Self {
        Self::new(0.0, 1.0)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Clamp a value into the range. NaN maps to `min`. Never panics, even
    /// on a range that was deserialized with bad bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        let range = Self::new(self.min, self.max);
        if value.is_nan() {
            return range.min;
        }
        value.max(range.min).min(range.max)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub range: BusRange,
    value: f64,
}

impl Bus {
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Process-scoped registry of named timing/level values shared by functions.
///
/// The registry is a cheap handle: clones share the same buses, so a UI or
/// input thread can `set` values while the engine reads a [`BusSnapshot`]
/// once per tick.
#[derive(Clone)]
pub struct BusRegistry {
    buses: Arc<RwLock<HashMap<BusId, Bus>>>,
}

impl BusRegistry {
    /// Registry with the default Fade, Hold and Speed buses.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.insert(FADE_BUS, "Fade", BusRange::seconds(60.0), 0.0);
        registry.insert(HOLD_BUS, "Hold", BusRange::seconds(60.0), 1.0);
        registry.insert(SPEED_BUS, "Speed", BusRange::seconds(60.0), 4.0);
        registry
    }

    pub fn empty() -> Self {
        Self {
            buses: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn insert(&self, id: BusId, name: &str, range: BusRange, value: f64) {
        self.buses.write().insert(
            id,
            Bus {
                id,
                name: name.to_string(),
                range,
                value: range.clamp(value),
            },
        );
    }

    /// Define a new bus and return its id, or `None` once every id is taken.
    pub fn define(&self, name: &str, range: BusRange, value: f64) -> Option<BusId> {
        let mut buses = self.buses.write();
        let id = match buses.keys().max() {
            None => 0,
            Some(max) => match max.checked_add(1) {
                Some(id) => id,
                None => (0..BusId::MAX).find(|id| !buses.contains_key(id))?,
            },
        };
        buses.insert(
            id,
            Bus {
                id,
                name: name.to_string(),
                range,
                value: range.clamp(value),
            },
        );
        log::debug!("Defined bus {} ({})", id, name);
        Some(id)
    }

    pub fn remove(&self, id: BusId) -> Option<Bus> {
        self.buses.write().remove(&id)
    }

    pub fn contains(&self, id: BusId) -> bool {
        self.buses.read().contains_key(&id)
    }

    /// Current value of a bus. Asking for an unknown bus is a programming
    /// error: it panics in debug builds and returns 0.0 otherwise.
    pub fn get(&self, id: BusId) -> f64 {
        match self.buses.read().get(&id) {
            Some(bus) => bus.value,
            None => {
                debug_assert!(false, "unknown bus {}", id);
                log::error!("Read of unknown bus {}", id);
                0.0
            }
        }
    }

    /// Set a bus value, clamped to the bus range. Unknown buses are treated
    /// like in [`BusRegistry::get`].
    pub fn set(&self, id: BusId, value: f64) {
        match self.buses.write().get_mut(&id) {
            Some(bus) => bus.value = bus.range.clamp(value),
            None => {
                debug_assert!(false, "unknown bus {}", id);
                log::error!("Write to unknown bus {}", id);
            }
        }
    }

    pub fn buses(&self) -> Vec<Bus> {
        let mut buses: Vec<Bus> = self.buses.read().values().cloned().collect();
        buses.sort_by_key(|b| b.id);
        buses
    }

    /// Consistent copy of every bus value, taken under a single read lock.
    pub fn snapshot(&self) -> BusSnapshot {
        let buses = self.buses.read();
        BusSnapshot {
            values: buses.iter().map(|(id, bus)| (*id, bus.value)).collect(),
        }
    }
}

impl Default for BusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus values frozen at the start of a tick.
#[derive(Clone, Debug, Default)]
pub struct BusSnapshot {
    values: HashMap<BusId, f64>,
}

impl BusSnapshot {
    pub fn get(&self, id: BusId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    pub fn contains(&self, id: BusId) -> bool {
        self.values.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buses() {
        let registry = BusRegistry::new();
        assert!(registry.contains(FADE_BUS));
        assert!(registry.contains(HOLD_BUS));
        assert!(registry.contains(SPEED_BUS));
        assert_eq!(registry.get(HOLD_BUS), 1.0);
    }

    #[test]
    fn test_set_clamps_to_range() {
        let registry = BusRegistry::new();
        let level = registry.define("Level", BusRange::level(), 0.5).unwrap();
        registry.set(level, 3.0);
        assert_eq!(registry.get(level), 1.0);
        registry.set(level, -1.0);
        assert_eq!(registry.get(level), 0.0);
        registry.set(level, f64::NAN);
        assert_eq!(registry.get(level), 0.0);
    }

    #[test]
    fn test_define_allocates_new_ids() {
        let registry = BusRegistry::new();
        let a = registry.define("A", BusRange::seconds(10.0), 1.0).unwrap();
        let b = registry.define("B", BusRange::seconds(10.0), 2.0).unwrap();
        assert_ne!(a, b);
        assert!(a > SPEED_BUS);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let registry = BusRegistry::new();
        let snapshot = registry.snapshot();
        registry.set(SPEED_BUS, 10.0);
        assert_eq!(snapshot.get(SPEED_BUS), Some(4.0));
        assert_eq!(registry.snapshot().get(SPEED_BUS), Some(10.0));
    }

    #[test]
    fn test_clones_share_values() {
        let registry = BusRegistry::new();
        let handle = registry.clone();
        std::thread::spawn(move || handle.set(HOLD_BUS, 2.5))
            .join()
            .unwrap();
        assert_eq!(registry.get(HOLD_BUS), 2.5);
    }

    #[test]
    fn test_removed_bus_missing_from_snapshot() {
        let registry = BusRegistry::new();
        registry.remove(FADE_BUS);
        assert!(!registry.snapshot().contains(FADE_BUS));
    }

    #[test]
    fn test_bad_ranges_do_not_panic() {
        let registry = BusRegistry::new();

        let inverted = BusRange::new(5.0, 1.0);
        assert_eq!((inverted.min(), inverted.max()), (1.0, 5.0));
        let id = registry.define("Inverted", inverted, 3.0).unwrap();
        assert_eq!(registry.get(id), 3.0);
        registry.set(id, 9.0);
        assert_eq!(registry.get(id), 5.0);

        let nan = BusRange::new(f64::NAN, f64::NAN);
        assert_eq!((nan.min(), nan.max()), (0.0, 0.0));
        let id = registry.define("NaN", nan, 3.0).unwrap();
        assert_eq!(registry.get(id), 0.0);

        let open = BusRange::new(2.0, f64::INFINITY);
        assert_eq!(open.clamp(7.0), 2.0);
    }

    #[test]
    fn test_deserialized_inverted_range_clamps() {
        let range: BusRange = serde_json::from_str(r#"{"min": 5.0, "max": 1.0}"#).unwrap();
        assert_eq!(range.clamp(3.0), 3.0);
        assert_eq!(range.clamp(0.0), 1.0);
        assert_eq!(range.clamp(f64::NAN), 1.0);
    }

    #[test]
    fn test_concurrent_defines_get_distinct_ids() {
        let registry = BusRegistry::empty();
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            registry
                                .define(&format!("Bus {}-{}", n, i), BusRange::level(), 0.5)
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<BusId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(registry.buses().len(), 400);
    }

    #[test]
    fn test_define_after_max_id_reuses_free_id() {
        let registry = BusRegistry::empty();
        registry.insert(BusId::MAX, "Last", BusRange::level(), 0.0);
        assert_eq!(registry.define("Wrapped", BusRange::level(), 0.0), Some(0));
        assert!(registry.contains(BusId::MAX));
    }
}
