use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use lumen_fixtures::UniverseId;

use super::artnet::ArtNetMode;
use crate::messages::Settings;

/// Where each universe goes on the network.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub destinations: Vec<ArtNetDestination>,
    /// universe -> destination index
    pub universe_routing: HashMap<UniverseId, usize>,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct ArtNetDestination {
    pub name: String,
    pub mode: ArtNetMode,
}

impl NetworkConfig {
    /// Single destination setup. Without a destination address unicast falls
    /// back to broadcast.
    pub fn new(
        source_ip: IpAddr,
        dest_ip: Option<IpAddr>,
        artnet_port: u16,
        broadcast: bool,
    ) -> Self {
        let mode = match dest_ip {
            Some(ip) if !broadcast => ArtNetMode::Unicast(
                SocketAddr::new(source_ip, artnet_port),
                SocketAddr::new(ip, artnet_port),
            ),
            _ => ArtNetMode::Broadcast,
        };

        NetworkConfig {
            destinations: vec![ArtNetDestination {
                name: "default".to_string(),
                mode,
            }],
            universe_routing: HashMap::new(),
            port: artnet_port,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, anyhow::Error> {
        let source_ip: IpAddr = settings
            .dmx_source_ip
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid dmx_source_ip '{}': {}", settings.dmx_source_ip, e))?;
        let dest_ip = if settings.dmx_broadcast {
            None
        } else {
            Some(settings.dmx_dest_ip.parse::<IpAddr>().map_err(|e| {
                anyhow::anyhow!("Invalid dmx_dest_ip '{}': {}", settings.dmx_dest_ip, e)
            })?)
        };
        Ok(Self::new(
            source_ip,
            dest_ip,
            settings.dmx_port,
            settings.dmx_broadcast,
        ))
    }

    pub fn new_multi_destination(
        destinations: Vec<ArtNetDestination>,
        universe_routing: HashMap<UniverseId, usize>,
        artnet_port: u16,
    ) -> Self {
        NetworkConfig {
            destinations,
            universe_routing,
            port: artnet_port,
        }
    }

    /// Add a destination and return its index
    pub fn add_destination(&mut self, destination: ArtNetDestination) -> usize {
        self.destinations.push(destination);
        self.destinations.len() - 1
    }

    /// Route a universe to a destination. Unknown destinations are ignored.
    pub fn route_universe(&mut self, universe: UniverseId, destination_index: usize) -> bool {
        if destination_index < self.destinations.len() {
            self.universe_routing.insert(universe, destination_index);
            true
        } else {
            log::warn!(
                "Cannot route universe {} to unknown destination {}",
                universe,
                destination_index
            );
            false
        }
    }

    /// Destination index for a universe. Unrouted universes go to the first
    /// destination.
    pub fn destination_for_universe(&self, universe: UniverseId) -> Option<usize> {
        match self.universe_routing.get(&universe) {
            Some(index) => Some(*index),
            None if !self.destinations.is_empty() => Some(0),
            None => None,
        }
    }

    /// Human readable list of destinations, for status output.
    pub fn describe(&self) -> String {
        if self.destinations.is_empty() {
            return "No destinations configured".to_string();
        }
        self.destinations
            .iter()
            .map(|dest| format!("{}: {}", dest.name, self.describe_mode(&dest.mode)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn describe_mode(&self, mode: &ArtNetMode) -> String {
        match mode {
            ArtNetMode::Unicast(src, destination) => {
                format!("{} -> {}", src, destination)
            }
            ArtNetMode::Broadcast => format!("255.255.255.255:{}", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn test_unicast_without_destination_falls_back_to_broadcast() {
        let source = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let config = NetworkConfig::new(source, None, 6454, false);
        assert_eq!(config.destinations[0].mode, ArtNetMode::Broadcast);

        let dest = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        let config = NetworkConfig::new(source, Some(dest), 6454, false);
        assert_eq!(
            config.describe(),
            "default: 10.0.0.1:6454 -> 10.0.0.2:6454"
        );
    }

    #[test]
    fn test_routing() {
        let mut config = NetworkConfig::new_multi_destination(Vec::new(), HashMap::new(), 6454);
        assert_eq!(config.destination_for_universe(1), None);

        config.add_destination(ArtNetDestination {
            name: "stage".to_string(),
            mode: ArtNetMode::Broadcast,
        });
        let second = config.add_destination(ArtNetDestination {
            name: "truss".to_string(),
            mode: ArtNetMode::Broadcast,
        });

        assert!(config.route_universe(2, second));
        assert!(!config.route_universe(3, 5));
        assert_eq!(config.destination_for_universe(2), Some(1));
        assert_eq!(config.destination_for_universe(3), Some(0));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            dmx_broadcast: true,
            dmx_dest_ip: "garbage".to_string(),
            ..Settings::default()
        };
        let config = NetworkConfig::from_settings(&settings).unwrap();
        assert_eq!(config.destinations[0].mode, ArtNetMode::Broadcast);

        let settings = Settings {
            dmx_source_ip: "garbage".to_string(),
            ..Settings::default()
        };
        assert!(NetworkConfig::from_settings(&settings).is_err());
    }
}
