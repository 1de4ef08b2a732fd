pub mod dmx_module;
pub mod module_manager;
pub mod traits;

pub use dmx_module::DmxModule;
pub use module_manager::ModuleManager;
pub use traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
