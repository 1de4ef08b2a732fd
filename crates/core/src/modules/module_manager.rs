use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};

// Frames are tiny and produced at the tick rate, a short queue is plenty.
const MODULE_QUEUE_SIZE: usize = 64;

pub struct ModuleManager {
    modules: HashMap<ModuleId, Box<dyn AsyncModule>>,
    module_handles: HashMap<ModuleId, JoinHandle<()>>,
    module_senders: HashMap<ModuleId, mpsc::Sender<ModuleEvent>>,
    message_receiver: Option<mpsc::Receiver<ModuleMessage>>,
    message_sender: mpsc::Sender<ModuleMessage>,
    running: bool,
}

impl ModuleManager {
    pub fn new() -> Self {
        let (message_sender, message_receiver) = mpsc::channel(1000);

        Self {
            modules: HashMap::new(),
            module_handles: HashMap::new(),
            module_senders: HashMap::new(),
            message_receiver: Some(message_receiver),
            message_sender,
            running: false,
        }
    }

    pub fn register_module(&mut self, module: Box<dyn AsyncModule>) {
        let id = module.id();
        self.modules.insert(id, module);
    }

    pub fn has_module(&self, module_id: &ModuleId) -> bool {
        self.modules.contains_key(module_id) || self.module_senders.contains_key(module_id)
    }

    pub async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for (id, module) in &mut self.modules {
            match module.initialize().await {
                Ok(_) => log::info!("Module {:?} initialized successfully", id),
                Err(e) => {
                    log::error!("Failed to initialize module {:?}: {}", id, e);
                    return Err(format!("{:?} module error: {}", id, e).into());
                }
            }
        }
        Ok(())
    }

    /// Move every module into its own task.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.running {
            return Err("Module manager is already running".into());
        }

        for (id, mut module) in std::mem::take(&mut self.modules) {
            let (event_tx, event_rx) = mpsc::channel(MODULE_QUEUE_SIZE);
            let message_tx = self.message_sender.clone();
            let module_id = id.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = module.run(event_rx, message_tx.clone()).await {
                    let _ = message_tx
                        .send(ModuleMessage::Error(format!(
                            "Module {:?} error: {}",
                            module_id, e
                        )))
                        .await;
                }
                if let Err(e) = module.shutdown().await {
                    log::error!("Module {:?} shutdown error: {}", module_id, e);
                }
            });

            self.module_handles.insert(id.clone(), handle);
            self.module_senders.insert(id, event_tx);
        }

        self.running = true;
        Ok(())
    }

    pub async fn send_to_module(
        &self,
        module_id: ModuleId,
        event: ModuleEvent,
    ) -> Result<(), String> {
        let sender = self
            .module_senders
            .get(&module_id)
            .ok_or_else(|| format!("Module {:?} not found", module_id))?;
        sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event to module {:?}: {}", module_id, e))
    }

    /// Like [`ModuleManager::send_to_module`] but never waits: a full queue
    /// rejects the event.
    pub fn try_send_to_module(&self, module_id: ModuleId, event: ModuleEvent) -> Result<(), String> {
        let sender = self
            .module_senders
            .get(&module_id)
            .ok_or_else(|| format!("Module {:?} not found", module_id))?;
        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => format!("Module {:?} queue is full", module_id),
            TrySendError::Closed(_) => format!("Module {:?} has stopped", module_id),
        })
    }

    pub async fn broadcast_event(&self, event: ModuleEvent) {
        for (id, sender) in &self.module_senders {
            if let Err(e) = sender.send(event.clone()).await {
                log::warn!("Failed to broadcast event to module {:?}: {}", id, e);
            }
        }
    }

    /// Get the message receiver (should only be called once)
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<ModuleMessage>> {
        self.message_receiver.take()
    }

    pub async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.running {
            return Ok(());
        }

        log::info!("Shutting down module manager...");
        self.broadcast_event(ModuleEvent::Shutdown).await;

        for (id, handle) in std::mem::take(&mut self.module_handles) {
            log::info!("Waiting for module {:?} to shutdown...", id);
            if let Err(e) = handle.await {
                log::error!("Module {:?} shutdown error: {}", id, e);
            }
        }

        self.module_senders.clear();
        self.running = false;
        log::info!("Module manager shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Status of modules that have not been started yet.
    pub fn get_status(&self) -> HashMap<ModuleId, HashMap<String, String>> {
        self.modules
            .iter()
            .map(|(id, module)| (id.clone(), module.status()))
            .collect()
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    struct RecordingModule {
        received: Arc<Mutex<Vec<ModuleEvent>>>,
        shut_down: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl AsyncModule for RecordingModule {
        fn id(&self) -> ModuleId {
            ModuleId::Dmx
        }

        async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        async fn run(
            &mut self,
            mut rx: mpsc::Receiver<ModuleEvent>,
            _tx: mpsc::Sender<ModuleMessage>,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            while let Some(event) = rx.recv().await {
                let done = event == ModuleEvent::Shutdown;
                self.received.lock().push(event);
                if done {
                    break;
                }
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            *self.shut_down.lock() = true;
            Ok(())
        }

        fn status(&self) -> HashMap<String, String> {
            HashMap::new()
        }
    }

    #[tokio::test]
    async fn test_events_reach_module() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let shut_down = Arc::new(Mutex::new(false));
        let mut manager = ModuleManager::new();
        manager.register_module(Box::new(RecordingModule {
            received: received.clone(),
            shut_down: shut_down.clone(),
        }));
        assert!(manager.has_module(&ModuleId::Dmx));

        manager.initialize().await.unwrap();
        manager.start().await.unwrap();
        assert!(manager.start().await.is_err());

        manager
            .try_send_to_module(ModuleId::Dmx, ModuleEvent::DmxOutput(1, vec![0; 512]))
            .unwrap();
        manager.shutdown().await.unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1], ModuleEvent::Shutdown);
        assert!(*shut_down.lock());
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn test_send_to_unknown_module() {
        let manager = ModuleManager::new();
        assert!(manager
            .try_send_to_module(ModuleId::Dmx, ModuleEvent::Shutdown)
            .is_err());
        assert!(manager
            .send_to_module(ModuleId::Dmx, ModuleEvent::Shutdown)
            .await
            .is_err());
    }
}
