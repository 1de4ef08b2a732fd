pub mod universes;

pub use universes::{ChannelWrite, Universes};
