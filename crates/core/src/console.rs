use std::time::Duration;

use lumen_fixtures::{AxisRange, Fixture, FixtureId, FixtureLibrary, UniverseId};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::artnet::network_config::NetworkConfig;
use crate::bus::BusRegistry;
use crate::engine::{Engine, EngineEvent, EngineHandle};
use crate::messages::{ConsoleCommand, ConsoleEvent, Settings};
use crate::modules::{DmxModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage};

/// Runs the function engine at a fixed rate and feeds its frames to the
/// output modules.
pub struct LightingConsole {
    engine: Engine,
    handle: EngineHandle,
    fixture_library: FixtureLibrary,
    settings: Settings,

    // Async module system
    module_manager: ModuleManager,
    message_rx: Option<mpsc::Receiver<ModuleMessage>>,
    output_enabled: bool,
    frames_dropped: u64,

    is_running: bool,
}

impl LightingConsole {
    /// Build a console. DMX output is only set up when enabled in the
    /// settings.
    pub fn new(settings: Settings, network_config: NetworkConfig) -> Result<Self, anyhow::Error> {
        let mut engine = Engine::new(BusRegistry::new());
        engine.set_max_running(settings.max_running_functions);
        engine.set_grand_master_mode(settings.grand_master_mode);
        engine.set_grand_master_scope(settings.grand_master_scope);
        engine.drain_events();

        let mut module_manager = ModuleManager::new();
        if settings.dmx_enabled {
            let mut dmx = DmxModule::new(network_config);
            dmx.set_target_fps(settings.dmx_output_fps);
            module_manager.register_module(Box::new(dmx));
        }

        Ok(Self {
            handle: engine.handle(),
            engine,
            fixture_library: FixtureLibrary::new(),
            output_enabled: settings.dmx_enabled,
            settings,
            module_manager,
            message_rx: None,
            frames_dropped: 0,
            is_running: false,
        })
    }

    pub async fn initialize(&mut self) -> Result<(), anyhow::Error> {
        log::info!("Initializing lighting console...");

        self.module_manager
            .initialize()
            .await
            .map_err(|e| anyhow::anyhow!("Module initialization failed: {}", e))?;

        self.module_manager
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("Module start failed: {}", e))?;

        self.message_rx = self.module_manager.take_message_receiver();
        self.is_running = true;
        log::info!("Lighting console initialized");
        Ok(())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Handle for queueing engine commands from other tasks.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Shared bus registry, for faders and other inputs.
    pub fn buses(&self) -> BusRegistry {
        self.engine.buses().clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fixture_library(&self) -> &FixtureLibrary {
        &self.fixture_library
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn patch_fixture(
        &mut self,
        fixture_id: FixtureId,
        name: &str,
        profile_id: &str,
        universe: UniverseId,
        address: u16,
    ) -> Result<Fixture, anyhow::Error> {
        let profile = self
            .fixture_library
            .get(profile_id)
            .ok_or_else(|| anyhow::anyhow!("Profile {} not found", profile_id))?
            .clone();

        let fixture = Fixture::new(fixture_id, name, profile, universe, address);
        self.engine.patch_fixture(fixture.clone())?;
        Ok(fixture)
    }

    /// Run one control cycle and hand the frame to the DMX module. Never
    /// waits on the output: a full queue drops the frame.
    pub fn tick(&mut self, elapsed: Duration, event_tx: &mpsc::UnboundedSender<ConsoleEvent>) {
        let frame = self.engine.tick(elapsed);

        if self.output_enabled && self.is_running {
            for (universe, data) in frame.iter() {
                let event = ModuleEvent::DmxOutput(universe, data.to_vec());
                if let Err(e) = self.module_manager.try_send_to_module(ModuleId::Dmx, event) {
                    self.frames_dropped += 1;
                    log::debug!("Dropped frame for universe {}: {}", universe, e);
                }
            }
        }

        for event in self.engine.drain_events() {
            let _ = event_tx.send(Self::console_event(event));
        }
    }

    fn console_event(event: EngineEvent) -> ConsoleEvent {
        match event {
            EngineEvent::FunctionStarted(function_id) => ConsoleEvent::FunctionStarted { function_id },
            EngineEvent::FunctionStopped(function_id) => ConsoleEvent::FunctionStopped { function_id },
            EngineEvent::StartFailed { function_id, error } => ConsoleEvent::FunctionStartFailed {
                function_id,
                reason: error.to_string(),
            },
            EngineEvent::BlackoutChanged(enabled) => ConsoleEvent::BlackoutChanged { enabled },
            EngineEvent::GrandMasterChanged { level, mode, scope } => {
                ConsoleEvent::GrandMasterChanged { level, mode, scope }
            }
        }
    }

    /// Apply a command. Playback and master changes are queued on the engine
    /// and take effect on the next tick.
    pub async fn process_command(
        &mut self,
        command: ConsoleCommand,
        event_tx: &mpsc::UnboundedSender<ConsoleEvent>,
    ) -> Result<(), anyhow::Error> {
        use ConsoleCommand::*;

        log::debug!("Processing command: {:?}", command);

        match command {
            Shutdown => {
                self.shutdown().await?;
                let _ = event_tx.send(ConsoleEvent::ShutdownComplete);
            }

            // Fixture management
            PatchFixture {
                fixture_id,
                name,
                profile_id,
                universe,
                address,
            } => {
                let fixture =
                    self.patch_fixture(fixture_id, &name, &profile_id, universe, address)?;
                let _ = event_tx.send(ConsoleEvent::FixturePatched { fixture });
            }
            UnpatchFixture { fixture_id } => {
                self.engine.unpatch_fixture(fixture_id)?;
                let _ = event_tx.send(ConsoleEvent::FixtureUnpatched { fixture_id });
                self.forward_engine_events(event_tx);
            }
            SetPanTiltLimits {
                fixture_id,
                pan_min,
                pan_max,
                tilt_min,
                tilt_max,
            } => {
                let mut fixture = self
                    .engine
                    .patch()
                    .get(fixture_id)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Fixture {} is not patched", fixture_id))?;
                fixture.set_pan_tilt_limits(
                    AxisRange::new(pan_min, pan_max),
                    AxisRange::new(tilt_min, tilt_max),
                );
                self.engine.update_fixture(fixture.clone())?;
                let _ = event_tx.send(ConsoleEvent::FixtureUpdated { fixture });
            }

            // Function management
            AddFunction { function } => {
                let function_id = function.id;
                self.engine.add_function(function);
                let _ = event_tx.send(ConsoleEvent::FunctionAdded { function_id });
                self.forward_engine_events(event_tx);
            }
            RemoveFunction { function_id } => {
                if self.engine.remove_function(function_id).is_none() {
                    anyhow::bail!("Function {} does not exist", function_id);
                }
                let _ = event_tx.send(ConsoleEvent::FunctionRemoved { function_id });
                self.forward_engine_events(event_tx);
            }

            // Playback
            StartFunction { function_id } => {
                self.handle.start(function_id);
            }
            StopFunction { function_id } => {
                self.handle.stop(function_id);
            }
            StopAll => {
                self.handle.stop_all();
            }

            // Buses
            SetBusValue { bus_id, value } => {
                let buses = self.engine.buses();
                if !buses.contains(bus_id) {
                    anyhow::bail!("Bus {} does not exist", bus_id);
                }
                buses.set(bus_id, value);
                let _ = event_tx.send(ConsoleEvent::BusValueChanged {
                    bus_id,
                    value: buses.get(bus_id),
                });
            }

            // Masters
            SetGrandMaster { percent } => {
                self.handle.set_grand_master_percent(percent);
            }
            SetGrandMasterMode { mode } => {
                self.handle.set_grand_master_mode(mode);
            }
            SetGrandMasterScope { scope } => {
                self.handle.set_grand_master_scope(scope);
            }
            SetBlackout { enabled } => {
                self.handle.set_blackout(enabled);
            }
            ToggleBlackout => {
                self.handle.toggle_blackout();
            }

            // Queries
            QueryFixtures => {
                let fixtures = self.engine.patch().fixtures().cloned().collect();
                let _ = event_tx.send(ConsoleEvent::FixturesList { fixtures });
            }
            QueryFunctions => {
                let functions = self.engine.functions().cloned().collect();
                let _ = event_tx.send(ConsoleEvent::FunctionsList { functions });
            }
            QueryRunningFunctions => {
                let function_ids = self.engine.running_functions();
                let _ = event_tx.send(ConsoleEvent::RunningFunctions { function_ids });
            }
            QueryBuses => {
                let buses = self.engine.buses().buses();
                let _ = event_tx.send(ConsoleEvent::BusesList { buses });
            }
            QueryFrame => {
                let universes = self.engine.frame().snapshot();
                let _ = event_tx.send(ConsoleEvent::Frame { universes });
            }
            QuerySettings => {
                let settings = self.settings.clone();
                let _ = event_tx.send(ConsoleEvent::CurrentSettings { settings });
            }
        }

        Ok(())
    }

    // Stops caused by patch or function edits happen outside the tick.
    fn forward_engine_events(&mut self, event_tx: &mpsc::UnboundedSender<ConsoleEvent>) {
        for event in self.engine.drain_events() {
            let _ = event_tx.send(Self::console_event(event));
        }
    }

    /// Main loop: tick at the configured rate, apply commands between ticks
    /// and relay module messages, until a `Shutdown` command arrives or the
    /// command channel closes.
    pub async fn run_with_channels(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<ConsoleCommand>,
        event_tx: mpsc::UnboundedSender<ConsoleEvent>,
    ) -> Result<(), anyhow::Error> {
        if !self.is_running {
            self.initialize().await?;
        }
        let _ = event_tx.send(ConsoleEvent::Initialized);

        let period = Duration::from_secs_f64(1.0 / self.settings.tick_rate_hz.max(1) as f64);
        let mut tick_interval = tokio::time::interval(period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        log::info!(
            "Starting console main loop at {}Hz",
            self.settings.tick_rate_hz
        );

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else {
                        log::info!("Command channel closed");
                        self.shutdown().await?;
                        break;
                    };

                    if let ConsoleCommand::Shutdown = command {
                        log::info!("Received shutdown command");
                        self.shutdown().await?;
                        let _ = event_tx.send(ConsoleEvent::ShutdownComplete);
                        break;
                    }

                    if let Err(e) = self.process_command(command, &event_tx).await {
                        log::error!("Command processing error: {}", e);
                        let _ = event_tx.send(ConsoleEvent::Error {
                            message: format!("Command processing error: {}", e)
                        });
                    }
                }

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;
                    self.tick(elapsed, &event_tx);
                }

                Some(message) = async {
                    match self.message_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match message {
                        ModuleMessage::Event(event) => {
                            log::debug!("Module event: {:?}", event);
                        }
                        ModuleMessage::Status(status) => {
                            log::info!("Module status: {}", status);
                        }
                        ModuleMessage::Error(error) => {
                            log::error!("Module error: {}", error);
                            let _ = event_tx.send(ConsoleEvent::Error { message: error });
                        }
                    }
                }
            }
        }

        log::info!("Console main loop finished");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if !self.is_running {
            return Ok(());
        }

        log::info!("Shutting down lighting console...");
        self.engine.stop_all();

        // Leave the rig dark rather than frozen on the last frame.
        if self.output_enabled {
            for universe in self.engine.frame().universe_ids() {
                let _ = self
                    .module_manager
                    .try_send_to_module(ModuleId::Dmx, ModuleEvent::DmxOutput(universe, vec![0; 512]));
            }
        }

        self.module_manager
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!("Module shutdown failed: {}", e))?;

        self.is_running = false;
        log::info!("Lighting console shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::bus::HOLD_BUS;
    use crate::function::{Function, Scene};
    use crate::master::GrandMasterMode;

    const TICK: Duration = Duration::from_millis(20);

    fn console() -> LightingConsole {
        let settings = Settings {
            dmx_enabled: false,
            ..Settings::default()
        };
        let network = NetworkConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), None, 6454, true);
        LightingConsole::new(settings, network).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ConsoleEvent>) -> Vec<ConsoleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_scene_through_commands() {
        let mut console = console();
        console.initialize().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        console
            .process_command(
                ConsoleCommand::PatchFixture {
                    fixture_id: 1,
                    name: "Dimmer".to_string(),
                    profile_id: "generic-dimmer".to_string(),
                    universe: 1,
                    address: 5,
                },
                &tx,
            )
            .await
            .unwrap();
        console
            .process_command(
                ConsoleCommand::AddFunction {
                    function: Function::scene(1, "Full", Scene::new().with_value(1, 0, 200)),
                },
                &tx,
            )
            .await
            .unwrap();
        console
            .process_command(ConsoleCommand::StartFunction { function_id: 1 }, &tx)
            .await
            .unwrap();

        // Queued until the next tick
        assert!(!console.engine().is_running(1));
        console.tick(TICK, &tx);
        assert_eq!(console.engine().frame().get(1, 5), 200);

        console
            .process_command(ConsoleCommand::QueryRunningFunctions, &tx)
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(matches!(events[0], ConsoleEvent::FixturePatched { .. }));
        assert!(matches!(events[1], ConsoleEvent::FunctionAdded { function_id: 1 }));
        assert!(matches!(events[2], ConsoleEvent::FunctionStarted { function_id: 1 }));
        match &events[3] {
            ConsoleEvent::RunningFunctions { function_ids } => assert_eq!(function_ids, &vec![1]),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_masters_through_commands() {
        let mut console = console();
        let (tx, mut rx) = mpsc::unbounded_channel();

        console
            .process_command(ConsoleCommand::SetGrandMaster { percent: 50.0 }, &tx)
            .await
            .unwrap();
        console
            .process_command(
                ConsoleCommand::SetGrandMasterMode {
                    mode: GrandMasterMode::Limit,
                },
                &tx,
            )
            .await
            .unwrap();
        console
            .process_command(ConsoleCommand::ToggleBlackout, &tx)
            .await
            .unwrap();
        console.tick(TICK, &tx);

        assert!(console.engine().blackout());
        assert_eq!(console.engine().grand_master().level(), 127);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ConsoleEvent::BlackoutChanged { enabled: true })));
        assert!(events.iter().any(|e| matches!(
            e,
            ConsoleEvent::GrandMasterChanged {
                level: 127,
                mode: GrandMasterMode::Limit,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_command_errors() {
        let mut console = console();
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(console
            .process_command(
                ConsoleCommand::PatchFixture {
                    fixture_id: 1,
                    name: "Nope".to_string(),
                    profile_id: "unknown".to_string(),
                    universe: 1,
                    address: 1,
                },
                &tx,
            )
            .await
            .is_err());
        assert!(console
            .process_command(ConsoleCommand::RemoveFunction { function_id: 3 }, &tx)
            .await
            .is_err());
        assert!(console
            .process_command(
                ConsoleCommand::SetBusValue {
                    bus_id: 99,
                    value: 1.0
                },
                &tx
            )
            .await
            .is_err());
        console
            .process_command(
                ConsoleCommand::SetBusValue {
                    bus_id: HOLD_BUS,
                    value: 2.0,
                },
                &tx,
            )
            .await
            .unwrap();
        assert_eq!(console.buses().get(HOLD_BUS), 2.0);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let console = console();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(console.run_with_channels(command_rx, event_tx));
        command_tx.send(ConsoleCommand::Shutdown).unwrap();
        handle.await.unwrap().unwrap();

        let mut saw_shutdown = false;
        while let Some(event) = event_rx.recv().await {
            if matches!(event, ConsoleEvent::ShutdownComplete) {
                saw_shutdown = true;
            }
        }
        assert!(saw_shutdown);
    }
}
