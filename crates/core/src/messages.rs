use lumen_fixtures::{Fixture, FixtureId, UniverseId};
use serde::{Deserialize, Serialize};

use crate::bus::{Bus, BusId};
use crate::function::{Function, FunctionId};
use crate::master::{GrandMasterMode, GrandMasterScope};

/// Commands sent to the console, typically from a UI or control surface.
#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    // System commands
    Shutdown,

    // Fixture management
    PatchFixture {
        fixture_id: FixtureId,
        name: String,
        profile_id: String,
        universe: UniverseId,
        address: u16,
    },
    UnpatchFixture {
        fixture_id: FixtureId,
    },
    SetPanTiltLimits {
        fixture_id: FixtureId,
        pan_min: f64,
        pan_max: f64,
        tilt_min: f64,
        tilt_max: f64,
    },

    // Function management
    AddFunction {
        function: Function,
    },
    RemoveFunction {
        function_id: FunctionId,
    },

    // Playback
    StartFunction {
        function_id: FunctionId,
    },
    StopFunction {
        function_id: FunctionId,
    },
    StopAll,

    // Buses
    SetBusValue {
        bus_id: BusId,
        value: f64,
    },

    // Masters
    SetGrandMaster {
        percent: f64,
    },
    SetGrandMasterMode {
        mode: GrandMasterMode,
    },
    SetGrandMasterScope {
        scope: GrandMasterScope,
    },
    SetBlackout {
        enabled: bool,
    },
    ToggleBlackout,

    // Queries
    QueryFixtures,
    QueryFunctions,
    QueryRunningFunctions,
    QueryBuses,
    QueryFrame,
    QuerySettings,
}

/// Events sent from the console to its listeners.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    // System events
    Initialized,
    ShutdownComplete,
    Error {
        message: String,
    },

    // Patch
    FixturePatched {
        fixture: Fixture,
    },
    FixtureUnpatched {
        fixture_id: FixtureId,
    },
    FixtureUpdated {
        fixture: Fixture,
    },

    // Functions
    FunctionAdded {
        function_id: FunctionId,
    },
    FunctionRemoved {
        function_id: FunctionId,
    },
    FunctionStarted {
        function_id: FunctionId,
    },
    FunctionStopped {
        function_id: FunctionId,
    },
    FunctionStartFailed {
        function_id: FunctionId,
        reason: String,
    },

    // Masters
    BusValueChanged {
        bus_id: BusId,
        value: f64,
    },
    GrandMasterChanged {
        level: u8,
        mode: GrandMasterMode,
        scope: GrandMasterScope,
    },
    BlackoutChanged {
        enabled: bool,
    },

    // Query responses
    FixturesList {
        fixtures: Vec<Fixture>,
    },
    FunctionsList {
        functions: Vec<Function>,
    },
    RunningFunctions {
        function_ids: Vec<FunctionId>,
    },
    BusesList {
        buses: Vec<Bus>,
    },
    Frame {
        universes: Vec<(UniverseId, Vec<u8>)>,
    },
    CurrentSettings {
        settings: Settings,
    },
}

/// Console settings, persisted by the config manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Engine settings
    pub tick_rate_hz: u32,
    pub max_running_functions: usize,
    pub grand_master_mode: GrandMasterMode,
    pub grand_master_scope: GrandMasterScope,

    // Output settings (DMX/Art-Net)
    pub dmx_enabled: bool,
    pub dmx_broadcast: bool,
    pub dmx_source_ip: String,
    pub dmx_dest_ip: String,
    pub dmx_port: u16,
    pub dmx_output_fps: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Engine defaults
            tick_rate_hz: 50,
            max_running_functions: 1024,
            grand_master_mode: GrandMasterMode::Reduce,
            grand_master_scope: GrandMasterScope::Intensity,

            // Output defaults
            dmx_enabled: true,
            dmx_broadcast: false,
            dmx_source_ip: "192.168.1.100".to_string(),
            dmx_dest_ip: "192.168.1.200".to_string(),
            dmx_port: 6454,
            dmx_output_fps: 44.0,
        }
    }
}
