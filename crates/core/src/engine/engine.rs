use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use lumen_fixtures::{Fixture, FixtureId};
use tokio::sync::mpsc;

use super::instance::{InstanceId, RunningInstance, Runtime, Transition};
use super::validate::{initial_instance_count, validate_tree};
use crate::bus::{BusRegistry, BusSnapshot};
use crate::errors::{PatchError, StartError};
use crate::function::{Function, FunctionId, FunctionKind, RunState};
use crate::master::{GrandMaster, GrandMasterMode, GrandMasterScope};
use crate::patch::Patch;
use crate::universe::Universes;

/// Default cap on simultaneously active instances.
pub const DEFAULT_MAX_RUNNING: usize = 1024;

/// Requests from outside the tick. Applied at the start of the next tick.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCommand {
    Start(FunctionId),
    Stop(FunctionId),
    StopAll,
    SetBlackout(bool),
    ToggleBlackout,
    SetGrandMasterPercent(f64),
    SetGrandMasterMode(GrandMasterMode),
    SetGrandMasterScope(GrandMasterScope),
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The function went from no running instance to at least one.
    FunctionStarted(FunctionId),
    /// The last running instance of the function went away.
    FunctionStopped(FunctionId),
    StartFailed {
        function_id: FunctionId,
        error: StartError,
    },
    BlackoutChanged(bool),
    GrandMasterChanged {
        level: u8,
        mode: GrandMasterMode,
        scope: GrandMasterScope,
    },
}

/// Cloneable sender for engine commands, usable from any thread or task.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    pub fn send(&self, command: EngineCommand) -> bool {
        match self.tx.send(command) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Engine has shut down, dropping {:?}", e.0);
                false
            }
        }
    }

    pub fn start(&self, function_id: FunctionId) -> bool {
        self.send(EngineCommand::Start(function_id))
    }

    pub fn stop(&self, function_id: FunctionId) -> bool {
        self.send(EngineCommand::Stop(function_id))
    }

    pub fn stop_all(&self) -> bool {
        self.send(EngineCommand::StopAll)
    }

    pub fn set_blackout(&self, enabled: bool) -> bool {
        self.send(EngineCommand::SetBlackout(enabled))
    }

    pub fn toggle_blackout(&self) -> bool {
        self.send(EngineCommand::ToggleBlackout)
    }

    pub fn set_grand_master_percent(&self, percent: f64) -> bool {
        self.send(EngineCommand::SetGrandMasterPercent(percent))
    }

    pub fn set_grand_master_mode(&self, mode: GrandMasterMode) -> bool {
        self.send(EngineCommand::SetGrandMasterMode(mode))
    }

    pub fn set_grand_master_scope(&self, scope: GrandMasterScope) -> bool {
        self.send(EngineCommand::SetGrandMasterScope(scope))
    }
}

/// Function execution engine.
///
/// Owns the patch, the function definitions and every running instance.
/// All advancement and rendering happens inside [`Engine::tick`], which takes
/// `&mut self` and therefore can never run concurrently with itself. Other
/// threads talk to the engine through an [`EngineHandle`] or the shared
/// [`BusRegistry`].
///
/// Instances are kept in start order and merged in that order, so when two
/// instances write the same channel the most recently started one wins.
pub struct Engine {
    patch: Patch,
    functions: BTreeMap<FunctionId, Function>,
    buses: BusRegistry,
    instances: Vec<RunningInstance>,
    next_instance_id: u64,
    running_counts: HashMap<FunctionId, usize>,
    frame: Universes,
    grand_master: GrandMaster,
    blackout: bool,
    max_running: usize,
    /// Bus values frozen for the tick in progress.
    tick_buses: Option<BusSnapshot>,
    tx: mpsc::UnboundedSender<EngineCommand>,
    rx: mpsc::UnboundedReceiver<EngineCommand>,
    events: Vec<EngineEvent>,
}

impl Engine {
    pub fn new(buses: BusRegistry) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            patch: Patch::new(),
            functions: BTreeMap::new(),
            buses,
            instances: Vec::new(),
            next_instance_id: 1,
            running_counts: HashMap::new(),
            frame: Universes::new(),
            grand_master: GrandMaster::default(),
            blackout: false,
            max_running: DEFAULT_MAX_RUNNING,
            tick_buses: None,
            tx,
            rx,
            events: Vec::new(),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn buses(&self) -> &BusRegistry {
        &self.buses
    }

    pub fn max_running(&self) -> usize {
        self.max_running
    }

    pub fn set_max_running(&mut self, max_running: usize) {
        self.max_running = max_running.max(1);
    }

    // Patch

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn patch_fixture(&mut self, fixture: Fixture) -> Result<FixtureId, PatchError> {
        let universe = fixture.universe;
        let id = self.patch.add(fixture)?;
        self.frame.ensure(universe);
        Ok(id)
    }

    /// Remove a fixture. Every running instance that writes to it directly is
    /// stopped; later starts of those functions fail with `MissingFixture`.
    pub fn unpatch_fixture(&mut self, fixture_id: FixtureId) -> Result<Fixture, PatchError> {
        let fixture = self.patch.remove(fixture_id)?;

        let affected: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, instance)| instance.is_active())
            .filter(|(_, instance)| {
                self.functions
                    .get(&instance.function_id)
                    .is_some_and(|f| f.references_fixture(fixture_id))
            })
            .map(|(index, _)| index)
            .collect();

        for index in affected {
            log::warn!(
                "Stopping function {}: fixture {} was unpatched",
                self.instances[index].function_id,
                fixture_id
            );
            self.deactivate(index, RunState::Stopped, true);
        }

        Ok(fixture)
    }

    /// Replace a fixture definition, e.g. after changing its pan/tilt limits.
    pub fn update_fixture(&mut self, fixture: Fixture) -> Result<(), PatchError> {
        let universe = fixture.universe;
        self.patch.update(fixture)?;
        self.frame.ensure(universe);
        Ok(())
    }

    // Functions

    /// Add or replace a function. Running instances of a replaced function
    /// are stopped.
    pub fn add_function(&mut self, function: Function) -> Option<Function> {
        let id = function.id;
        if self.functions.contains_key(&id) {
            self.stop_function(id);
        }
        log::debug!("Added {} {} ({})", function.type_name(), id, function.name);
        self.functions.insert(id, function)
    }

    pub fn remove_function(&mut self, function_id: FunctionId) -> Option<Function> {
        self.stop_function(function_id);
        let removed = self.functions.remove(&function_id);
        if let Some(function) = &removed {
            log::debug!("Removed function {} ({})", function_id, function.name);
        }
        removed
    }

    pub fn function(&self, function_id: FunctionId) -> Option<&Function> {
        self.functions.get(&function_id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Check whether a function could start right now.
    pub fn validate(&self, function_id: FunctionId) -> Result<(), StartError> {
        validate_tree(
            &self.functions,
            &self.patch,
            &self.buses.snapshot(),
            function_id,
        )
    }

    // Running state

    pub fn is_running(&self, function_id: FunctionId) -> bool {
        self.running_counts
            .get(&function_id)
            .is_some_and(|count| *count > 0)
    }

    pub fn running_functions(&self) -> Vec<FunctionId> {
        let mut running: Vec<FunctionId> = self
            .running_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| *id)
            .collect();
        running.sort_unstable();
        running
    }

    pub fn active_instance_count(&self) -> usize {
        self.instances.iter().filter(|i| i.is_active()).count()
    }

    /// Start a function immediately. Starting a function that is already
    /// running on its own does nothing.
    pub fn start_function(&mut self, function_id: FunctionId) -> Result<(), StartError> {
        let buses = self.current_buses();
        self.start_with(function_id, &buses)
    }

    // Inside a tick every start sees the values the tick started with.
    fn current_buses(&self) -> BusSnapshot {
        match &self.tick_buses {
            Some(buses) => buses.clone(),
            None => self.buses.snapshot(),
        }
    }

    /// Stop every running instance of a function. Returns false if it was not
    /// running.
    pub fn stop_function(&mut self, function_id: FunctionId) -> bool {
        let indices: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.function_id == function_id && i.is_active())
            .map(|(index, _)| index)
            .collect();

        for index in &indices {
            self.deactivate(*index, RunState::Stopped, true);
        }
        !indices.is_empty()
    }

    /// Stop everything. De-initialize scenes of EFX are not started.
    pub fn stop_all(&mut self) {
        let count = self.active_instance_count();
        for index in 0..self.instances.len() {
            self.deactivate(index, RunState::Stopped, false);
        }
        if count > 0 {
            log::info!("Stopped all functions ({} instances)", count);
        }
    }

    // Masters

    pub fn blackout(&self) -> bool {
        self.blackout
    }

    pub fn set_blackout(&mut self, enabled: bool) {
        if self.blackout == enabled {
            return;
        }
        self.blackout = enabled;
        log::info!("Blackout {}", if enabled { "on" } else { "off" });
        self.events.push(EngineEvent::BlackoutChanged(enabled));
    }

    pub fn toggle_blackout(&mut self) {
        self.set_blackout(!self.blackout);
    }

    pub fn grand_master(&self) -> &GrandMaster {
        &self.grand_master
    }

    pub fn set_grand_master_percent(&mut self, percent: f64) {
        self.grand_master.set_percent(percent);
        self.grand_master_changed();
    }

    pub fn set_grand_master_mode(&mut self, mode: GrandMasterMode) {
        self.grand_master.set_mode(mode);
        self.grand_master_changed();
    }

    pub fn set_grand_master_scope(&mut self, scope: GrandMasterScope) {
        self.grand_master.set_scope(scope);
        self.grand_master_changed();
    }

    fn grand_master_changed(&mut self) {
        self.events.push(EngineEvent::GrandMasterChanged {
            level: self.grand_master.level(),
            mode: self.grand_master.mode(),
            scope: self.grand_master.scope(),
        });
    }

    // Tick

    /// Last rendered frame.
    pub fn frame(&self) -> &Universes {
        &self.frame
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run one control cycle: apply queued commands, advance every active
    /// instance in start order, then rebuild the frame.
    pub fn tick(&mut self, elapsed: Duration) -> &Universes {
        let dt = elapsed.as_secs_f64();
        let buses = self.buses.snapshot();
        self.tick_buses = Some(buses.clone());

        while let Ok(command) = self.rx.try_recv() {
            self.execute(command, &buses);
        }

        // Instances started while advancing are appended and picked up in the
        // same pass.
        let mut index = 0;
        while index < self.instances.len() {
            if self.instances[index].is_active() {
                let function_id = self.instances[index].function_id;
                let transition = match self.functions.get(&function_id) {
                    Some(function) => self.instances[index].advance(function, dt, &buses),
                    None => Transition::Invalid("function was removed".to_string()),
                };
                self.apply_transition(index, transition, &buses);
            }
            index += 1;
        }

        self.complete_collections();
        self.instances.retain(|i| i.is_active());
        self.tick_buses = None;
        self.render();
        &self.frame
    }

    fn execute(&mut self, command: EngineCommand, buses: &BusSnapshot) {
        match command {
            EngineCommand::Start(function_id) => {
                if let Err(error) = self.start_with(function_id, buses) {
                    log::warn!("Function {} failed to start: {}", function_id, error);
                    self.events.push(EngineEvent::StartFailed { function_id, error });
                }
            }
            EngineCommand::Stop(function_id) => {
                self.stop_function(function_id);
            }
            EngineCommand::StopAll => self.stop_all(),
            EngineCommand::SetBlackout(enabled) => self.set_blackout(enabled),
            EngineCommand::ToggleBlackout => self.toggle_blackout(),
            EngineCommand::SetGrandMasterPercent(percent) => {
                self.set_grand_master_percent(percent)
            }
            EngineCommand::SetGrandMasterMode(mode) => self.set_grand_master_mode(mode),
            EngineCommand::SetGrandMasterScope(scope) => self.set_grand_master_scope(scope),
        }
    }

    fn apply_transition(&mut self, index: usize, transition: Transition, buses: &BusSnapshot) {
        match transition {
            Transition::None => {}
            Transition::Finished => {
                log::debug!("Function {} completed", self.instances[index].function_id);
                self.deactivate(index, RunState::Completed, true);
            }
            Transition::Invalid(reason) => {
                log::warn!(
                    "Stopping function {}: {}",
                    self.instances[index].function_id,
                    reason
                );
                self.deactivate(index, RunState::Stopped, true);
            }
            Transition::Step { previous, next } => {
                if let Some(previous) = previous {
                    self.stop_instance(previous);
                }

                let parent = self.instances[index].id;
                let started = validate_tree(&self.functions, &self.patch, buses, next)
                    .and_then(|()| self.spawn(next, Some(parent)));
                match started {
                    Ok(child) => self.instances[index].set_child(child),
                    Err(e) => {
                        log::warn!(
                            "Stopping chaser {}: step {} failed to start: {}",
                            self.instances[index].function_id,
                            next,
                            e
                        );
                        self.deactivate(index, RunState::Stopped, true);
                    }
                }
            }
        }
    }

    // A collection is done once none of its members is running any more.
    fn complete_collections(&mut self) {
        for index in 0..self.instances.len() {
            let instance = &self.instances[index];
            if !instance.is_active() || !matches!(instance.runtime, Runtime::Collection) {
                continue;
            }
            let id = instance.id;
            let has_children = self
                .instances
                .iter()
                .any(|i| i.parent == Some(id) && i.is_active());
            if !has_children {
                log::debug!("Collection {} completed", instance.function_id);
                self.deactivate(index, RunState::Completed, true);
            }
        }
    }

    fn render(&mut self) {
        self.frame.clear();
        for universe in self.patch.universes() {
            self.frame.ensure(universe);
        }

        for instance in self.instances.iter_mut() {
            let Some(function) = self.functions.get(&instance.function_id) else {
                continue;
            };
            instance.render(function, &self.patch);
            for write in &instance.scratch {
                self.frame.apply(write);
            }
        }

        self.grand_master.apply(&mut self.frame, &self.patch);
        if self.blackout {
            self.frame.clear();
        }
    }

    // Instance lifecycle

    fn start_with(&mut self, function_id: FunctionId, buses: &BusSnapshot) -> Result<(), StartError> {
        let already_running = self
            .instances
            .iter()
            .any(|i| i.function_id == function_id && i.parent.is_none() && i.is_active());
        if already_running {
            log::debug!("Function {} is already running", function_id);
            return Ok(());
        }

        validate_tree(&self.functions, &self.patch, buses, function_id)?;

        let needed = initial_instance_count(&self.functions, function_id);
        if self.active_instance_count() + needed > self.max_running {
            return Err(StartError::TooManyRunning(self.max_running));
        }

        self.spawn(function_id, None)?;
        if let Some(function) = self.functions.get(&function_id) {
            log::info!(
                "Started {} {} ({})",
                function.type_name(),
                function_id,
                function.name
            );
        }
        Ok(())
    }

    /// Create an instance and the children it starts with. The caller has
    /// validated the function tree.
    fn spawn(
        &mut self,
        function_id: FunctionId,
        parent: Option<InstanceId>,
    ) -> Result<InstanceId, StartError> {
        if self.active_instance_count() >= self.max_running {
            return Err(StartError::TooManyRunning(self.max_running));
        }

        let function = self
            .functions
            .get(&function_id)
            .ok_or(StartError::UnknownFunction(function_id))?;

        let id = InstanceId(self.next_instance_id);
        self.next_instance_id += 1;

        let instance = RunningInstance::new(id, function, parent);
        let first_step = instance.initial_step(function);
        let (start_scene, stop_scene, members) = match &function.kind {
            FunctionKind::Efx(efx) if instance.is_active() => {
                (efx.start_scene, efx.stop_scene, Vec::new())
            }
            FunctionKind::Collection(collection) => (None, None, collection.members.clone()),
            _ => (None, None, Vec::new()),
        };

        if let Some(scene) = stop_scene {
            self.stop_top_level(scene);
        }

        // The initialize scene goes in before the EFX so the EFX wins any
        // shared channel.
        if let Some(scene) = start_scene {
            if let Err(e) = self.spawn(scene, Some(id)) {
                self.stop_children(id, false);
                return Err(e);
            }
        }

        self.push_instance(instance);

        let mut children = Vec::new();
        children.extend(first_step);
        children.extend(members);
        for (n, child) in children.into_iter().enumerate() {
            match self.spawn(child, Some(id)) {
                Ok(child_id) if n == 0 && first_step.is_some() => {
                    if let Some(instance) = self.instances.iter_mut().find(|i| i.id == id) {
                        instance.set_child(child_id);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.stop_instance(id);
                    return Err(e);
                }
            }
        }

        Ok(id)
    }

    fn push_instance(&mut self, instance: RunningInstance) {
        let function_id = instance.function_id;
        if !instance.is_active() {
            log::debug!("Function {} has nothing to run", function_id);
            if !self.is_running(function_id) {
                self.events.push(EngineEvent::FunctionStarted(function_id));
                self.events.push(EngineEvent::FunctionStopped(function_id));
            }
            return;
        }

        let count = self.running_counts.entry(function_id).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.events.push(EngineEvent::FunctionStarted(function_id));
        }
        self.instances.push(instance);
    }

    fn stop_instance(&mut self, id: InstanceId) {
        if let Some(index) = self.instances.iter().position(|i| i.id == id) {
            self.deactivate(index, RunState::Stopped, true);
        }
    }

    fn stop_top_level(&mut self, function_id: FunctionId) {
        let indices: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.function_id == function_id && i.parent.is_none() && i.is_active())
            .map(|(index, _)| index)
            .collect();
        for index in indices {
            self.deactivate(index, RunState::Stopped, true);
        }
    }

    fn stop_children(&mut self, id: InstanceId, run_stop_scenes: bool) {
        let children: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.parent == Some(id) && i.is_active())
            .map(|(index, _)| index)
            .collect();
        for index in children {
            self.deactivate(index, RunState::Stopped, run_stop_scenes);
        }
    }

    /// Take an instance out of the active set together with everything it
    /// started. Instances are only removed from the list at the end of a tick,
    /// so indices stay valid while this runs.
    fn deactivate(&mut self, index: usize, state: RunState, run_stop_scenes: bool) {
        let instance = &mut self.instances[index];
        if !instance.is_active() {
            return;
        }
        instance.state = state;
        let id = instance.id;
        let function_id = instance.function_id;

        if let Some(count) = self.running_counts.get_mut(&function_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.running_counts.remove(&function_id);
                log::info!("Function {} stopped", function_id);
                self.events.push(EngineEvent::FunctionStopped(function_id));
            }
        }

        self.stop_children(id, run_stop_scenes);

        if !run_stop_scenes {
            return;
        }
        let stop_scene = match self.functions.get(&function_id).map(|f| &f.kind) {
            Some(FunctionKind::Efx(efx)) => efx.stop_scene,
            _ => None,
        };
        if let Some(scene) = stop_scene {
            let buses = self.current_buses();
            if let Err(error) = self.start_with(scene, &buses) {
                log::warn!(
                    "De-initialize scene {} of EFX {} failed to start: {}",
                    scene,
                    function_id,
                    error
                );
                self.events.push(EngineEvent::StartFailed {
                    function_id: scene,
                    error,
                });
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(BusRegistry::new())
    }
}
