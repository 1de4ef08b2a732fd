pub mod bus_registry;

pub use bus_registry::{
    Bus, BusId, BusRange, BusRegistry, BusSnapshot, FADE_BUS, HOLD_BUS, SPEED_BUS,
};
