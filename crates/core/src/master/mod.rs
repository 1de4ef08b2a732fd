pub mod grand_master;

pub use grand_master::{GrandMaster, GrandMasterMode, GrandMasterScope};
