pub mod artnet;
pub mod network_config;

pub use artnet::{ArtNet, ArtNetMode};
pub use network_config::{ArtNetDestination, NetworkConfig};
