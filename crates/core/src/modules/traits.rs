use std::collections::HashMap;

use async_trait::async_trait;
use lumen_fixtures::UniverseId;
use tokio::sync::mpsc;

/// Unique identifier for each module type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Dmx,
}

/// Events sent from the console to modules
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    /// A finished frame for one universe (universe, 512 levels)
    DmxOutput(UniverseId, Vec<u8>),
    Shutdown,
}

/// Messages passed from modules back to the console
#[derive(Debug)]
pub enum ModuleMessage {
    Event(ModuleEvent),
    Status(String),
    Error(String),
}

/// Trait that all async modules must implement
#[async_trait]
pub trait AsyncModule: Send + Sync {
    fn id(&self) -> ModuleId;

    /// Called once at startup, before `run`.
    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// The module's main loop. Returns once a `Shutdown` event arrives or the
    /// event channel closes.
    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn status(&self) -> HashMap<String, String>;
}
