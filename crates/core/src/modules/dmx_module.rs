use std::collections::HashMap;

use async_trait::async_trait;
use lumen_fixtures::UniverseId;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::artnet::artnet::ArtNet;
use crate::artnet::network_config::NetworkConfig;

/// Sends the latest frame of every universe over Art-Net at a fixed rate,
/// independent of the engine tick.
pub struct DmxModule {
    senders: Vec<ArtNet>,
    network_config: NetworkConfig,
    frames_sent: u64,
    send_errors: u64,
    target_fps: f64,
    status: HashMap<String, String>,
}

impl DmxModule {
    pub fn new(network_config: NetworkConfig) -> Self {
        Self {
            senders: Vec::new(),
            network_config,
            frames_sent: 0,
            send_errors: 0,
            target_fps: 44.0, // DMX standard 44Hz
            status: HashMap::new(),
        }
    }

    pub fn set_target_fps(&mut self, fps: f64) {
        if fps.is_finite() && fps > 0.0 {
            self.target_fps = fps;
        } else {
            log::warn!("Ignoring invalid DMX output rate {}", fps);
        }
    }

    fn send_frame(&mut self, frames: &HashMap<UniverseId, Vec<u8>>) {
        for (universe, data) in frames {
            let Some(sender) = self
                .network_config
                .destination_for_universe(*universe)
                .and_then(|index| self.senders.get(index))
            else {
                continue;
            };
            if let Err(e) = sender.send_data(*universe, data) {
                self.send_errors += 1;
                // One line per second of failures is enough.
                if self.send_errors % self.target_fps.max(1.0) as u64 == 1 {
                    log::warn!("Art-Net send to {} failed: {}", sender.destination(), e);
                }
            }
        }
        self.frames_sent += 1;
    }
}

#[async_trait]
impl AsyncModule for DmxModule {
    fn id(&self) -> ModuleId {
        ModuleId::Dmx
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!(
            "Initializing DMX module: {}",
            self.network_config.describe()
        );

        self.senders.clear();
        for destination in &self.network_config.destinations {
            let artnet = ArtNet::new(destination.mode.clone(), self.network_config.port)
                .map_err(|e| format!("Art-Net destination {}: {}", destination.name, e))?;
            self.senders.push(artnet);
        }

        self.status
            .insert("destinations".to_string(), self.network_config.describe());
        self.status
            .insert("status".to_string(), "initialized".to_string());

        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.senders.is_empty() {
            return Err("DMX module not initialized".into());
        }

        let mut frame_interval = interval(Duration::from_secs_f64(1.0 / self.target_fps));
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_dmx_data: HashMap<UniverseId, Vec<u8>> = HashMap::new();
        let report_every = (self.target_fps as u64 * 5).max(1); // every 5 seconds

        log::info!("DMX module started, running at {}Hz", self.target_fps);
        let _ = tx
            .send(ModuleMessage::Status(format!(
                "DMX module running at {}Hz",
                self.target_fps
            )))
            .await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(ModuleEvent::DmxOutput(universe, data)) => {
                            last_dmx_data.insert(universe, data);
                        }
                        Some(ModuleEvent::Shutdown) | None => {
                            log::info!("DMX module received shutdown signal");
                            // Frames queued right before shutdown still go out.
                            if !last_dmx_data.is_empty() {
                                self.send_frame(&last_dmx_data);
                            }
                            break;
                        }
                    }
                }

                _ = frame_interval.tick() => {
                    if last_dmx_data.is_empty() {
                        continue;
                    }
                    self.send_frame(&last_dmx_data);

                    if self.frames_sent % report_every == 0 {
                        self.status.insert("frames_sent".to_string(), self.frames_sent.to_string());
                        self.status.insert("send_errors".to_string(), self.send_errors.to_string());
                        self.status.insert("universes".to_string(), last_dmx_data.len().to_string());

                        let _ = tx.send(ModuleMessage::Status(format!(
                            "DMX: {} frames sent, {} universes active",
                            self.frames_sent,
                            last_dmx_data.len()
                        ))).await;
                    }
                }
            }
        }

        log::info!(
            "DMX module shutting down after sending {} frames",
            self.frames_sent
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.status
            .insert("status".to_string(), "shutdown".to_string());
        log::info!("DMX module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}
