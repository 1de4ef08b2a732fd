pub use artnet::artnet::{ArtNet, ArtNetMode};
pub use artnet::network_config::{ArtNetDestination, NetworkConfig};
pub use bus::{Bus, BusId, BusRange, BusRegistry, BusSnapshot, FADE_BUS, HOLD_BUS, SPEED_BUS};
pub use config::{ConfigError, ConfigFile, ConfigManager, ConfigSchema};
pub use console::LightingConsole;
pub use engine::{Engine, EngineCommand, EngineEvent, EngineHandle, InstanceId, DEFAULT_MAX_RUNNING};
pub use errors::{PatchError, StartError};
pub use function::{
    AxisMapping, Chaser, ChaserStep, Collection, Direction, Efx, EfxFixture, FixtureOrder,
    Function, FunctionId, FunctionKind, RunOrder, RunState, Scene, SceneValue, Speed,
};
pub use master::{GrandMaster, GrandMasterMode, GrandMasterScope};
pub use messages::{ConsoleCommand, ConsoleEvent, Settings};
// Async module system exports
pub use modules::{AsyncModule, DmxModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage};
pub use patch::Patch;
pub use pattern::{Pattern, PatternKind, PatternParams};
pub use universe::{ChannelWrite, Universes};

mod artnet;
pub mod bus;
mod config;
mod console;
pub mod engine;
mod errors;
pub mod function;
pub mod master;
pub mod messages;
mod modules;
mod patch;
pub mod pattern;
pub mod universe;
