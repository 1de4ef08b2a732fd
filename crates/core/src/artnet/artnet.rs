use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use artnet_protocol::{ArtCommand, Output};
use lumen_fixtures::UniverseId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ArtNetMode {
    Broadcast,
    /// Specify from (interface) + to (destination) addresses
    Unicast(SocketAddr, SocketAddr),
}

/// Art-Net sender for one destination.
#[derive(Debug)]
pub struct ArtNet {
    socket: UdpSocket,
    destination: SocketAddr,
    mode: ArtNetMode,
}

impl ArtNet {
    pub fn new(mode: ArtNetMode, port: u16) -> Result<Self, anyhow::Error> {
        match &mode {
            ArtNetMode::Broadcast => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
                socket.set_broadcast(true)?;
                let destination = SocketAddr::from((Ipv4Addr::BROADCAST, port));
                log::debug!("Art-Net broadcast to {}", destination);
                Ok(Self {
                    socket,
                    destination,
                    mode,
                })
            }
            ArtNetMode::Unicast(src, destination) => {
                log::debug!(
                    "Art-Net unicast from interface {} to destination {}",
                    src,
                    destination
                );
                let socket = UdpSocket::bind(src)?;
                socket.set_broadcast(false)?;
                Ok(Self {
                    socket,
                    destination: *destination,
                    mode,
                })
            }
        }
    }

    pub fn mode(&self) -> &ArtNetMode {
        &self.mode
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Send one universe as an ArtDmx packet.
    pub fn send_data(&self, universe: UniverseId, data: &[u8]) -> Result<(), anyhow::Error> {
        let packet = output_packet(universe, data)?;
        self.socket.send_to(&packet, self.destination)?;
        Ok(())
    }
}

/// Encode an ArtDmx packet for a universe.
pub fn output_packet(universe: UniverseId, data: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
    let command = ArtCommand::Output(Output {
        port_address: universe.into(),
        data: data.to_vec().into(),
        ..Output::default()
    });
    command
        .write_to_buffer()
        .map_err(|e| anyhow::anyhow!("Failed to encode ArtDmx packet: {:?}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_packet_layout() {
        let mut data = vec![0u8; 512];
        data[0] = 255;
        data[511] = 7;

        let packet = output_packet(3, &data).unwrap();
        assert_eq!(&packet[..8], b"Art-Net\0");
        // OpDmx, little endian
        assert_eq!(&packet[8..10], &[0x00, 0x50]);
        assert_eq!(packet.len(), 18 + 512);
        // Length, big endian
        assert_eq!(&packet[16..18], &[0x02, 0x00]);
        assert_eq!(packet[18], 255);
        assert_eq!(packet[packet.len() - 1], 7);
    }

    #[test]
    fn test_broadcast_socket() {
        let artnet = ArtNet::new(ArtNetMode::Broadcast, 6454).unwrap();
        assert_eq!(artnet.destination().port(), 6454);
        assert_eq!(artnet.mode(), &ArtNetMode::Broadcast);
    }
}
