mod engine;
mod instance;
mod validate;

pub use engine::{Engine, EngineCommand, EngineEvent, EngineHandle, DEFAULT_MAX_RUNNING};
pub use instance::InstanceId;
