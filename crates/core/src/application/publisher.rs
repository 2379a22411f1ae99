// Publisher - topic fan-out to registered listeners
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::domain::DhTopic;
use crate::error::{AppError, Result};
use crate::port::PublisherListener;

type Listeners = HashMap<DhTopic, Vec<Arc<dyn PublisherListener>>>;

#[derive(Default)]
pub struct Publisher {
    listeners: RwLock<Listeners>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same listener id twice on a topic is a no-op
    pub fn register(&self, topic: DhTopic, listener: Arc<dyn PublisherListener>) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let entries = listeners.entry(topic).or_default();
        if entries.iter().any(|l| l.listener_id() == listener.listener_id()) {
            debug!(topic = %topic, listener = %listener.listener_id(), "Listener already registered");
            return;
        }
        info!(topic = %topic, listener = %listener.listener_id(), "Listener registered");
        entries.push(listener);
    }

    pub fn unregister(&self, topic: DhTopic, listener_id: &str) -> Result<()> {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let not_registered =
            || AppError::NotFound(format!("listener {} not registered on {}", listener_id, topic));
        let entries = listeners.get_mut(&topic).ok_or_else(not_registered)?;
        let before = entries.len();
        entries.retain(|l| l.listener_id() != listener_id);
        if entries.len() == before {
            return Err(not_registered());
        }
        if entries.is_empty() {
            listeners.remove(&topic);
        }
        info!(topic = %topic, listener = %listener_id, "Listener unregistered");
        Ok(())
    }

    /// Deliver a message to every listener of the topic, returning how many
    /// received it. Listeners are called outside the lock.
    pub fn publish(&self, topic: DhTopic, message: &str) -> Result<usize> {
        if message.is_empty() {
            return Err(AppError::Validation("published message is empty".into()));
        }
        let targets: Vec<Arc<dyn PublisherListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .cloned()
            .unwrap_or_default();

        for listener in &targets {
            listener.on_message(topic, message);
        }
        debug!(topic = %topic, delivered = targets.len(), "Message published");
        Ok(targets.len())
    }

    pub fn listener_count(&self, topic: DhTopic) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .map_or(0, Vec::len)
    }
}
