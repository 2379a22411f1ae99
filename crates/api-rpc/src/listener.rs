//! Listener mailboxes
//!
//! Remote callers refer to listeners by id. The stub turns an id into a
//! [`PublisherListener`] through a [`ListenerResolver`]; the RPC layer's
//! resolver hands out mailboxes that buffer published messages until the
//! owner drains them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use dhfwk_core::domain::DhTopic;
use dhfwk_core::error::{AppError, Result};
use dhfwk_core::port::PublisherListener;

use crate::types::ListenerMessage;

/// Messages kept per mailbox before the oldest is dropped
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Live mailboxes allowed at once
pub const MAX_MAILBOXES: usize = 1024;

/// Maps remote listener ids to listeners, tracking which topics each one is
/// registered on
pub trait ListenerResolver: Send + Sync {
    /// Listener for a registration on `topic`, created on first use
    fn acquire(&self, listener_id: &str, topic: DhTopic) -> Result<Arc<dyn PublisherListener>>;

    /// Existing listener only; `NotFound` for ids never acquired
    fn lookup(&self, listener_id: &str) -> Result<Arc<dyn PublisherListener>>;

    /// Forget `topic` for the listener; the listener is dropped with its last topic
    fn release(&self, listener_id: &str, topic: DhTopic);
}

pub struct MailboxListener {
    id: String,
    capacity: usize,
    queue: Mutex<VecDeque<ListenerMessage>>,
}

impl MailboxListener {
    fn queue(&self) -> MutexGuard<'_, VecDeque<ListenerMessage>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn drain(&self) -> Vec<ListenerMessage> {
        self.queue().drain(..).collect()
    }
}

impl PublisherListener for MailboxListener {
    fn listener_id(&self) -> &str {
        &self.id
    }

    fn on_message(&self, topic: DhTopic, message: &str) {
        let mut queue = self.queue();
        if queue.len() >= self.capacity {
            warn!(listener = %self.id, "Mailbox full, dropping oldest message");
            queue.pop_front();
        }
        queue.push_back(ListenerMessage {
            topic,
            message: message.to_string(),
        });
    }
}

struct Mailbox {
    listener: Arc<MailboxListener>,
    topics: HashSet<DhTopic>,
}

pub struct MailboxRegistry {
    capacity: usize,
    max_mailboxes: usize,
    mailboxes: Mutex<HashMap<String, Mailbox>>,
}

impl Default for MailboxRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl MailboxRegistry {
    pub fn new(capacity: usize) -> Self {
        Self::with_limit(capacity, MAX_MAILBOXES)
    }

    pub fn with_limit(capacity: usize, max_mailboxes: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            max_mailboxes: max_mailboxes.max(1),
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Take every buffered message of a mailbox
    pub fn drain(&self, listener_id: &str) -> Result<Vec<ListenerMessage>> {
        self.mailboxes()
            .get(listener_id)
            .map(|m| m.listener.drain())
            .ok_or_else(|| no_mailbox(listener_id))
    }

    pub fn len(&self) -> usize {
        self.mailboxes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes().is_empty()
    }

    fn mailboxes(&self) -> MutexGuard<'_, HashMap<String, Mailbox>> {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ListenerResolver for MailboxRegistry {
    fn acquire(&self, listener_id: &str, topic: DhTopic) -> Result<Arc<dyn PublisherListener>> {
        if listener_id.trim().is_empty() {
            return Err(AppError::Validation("listener id is empty".into()));
        }
        let mut mailboxes = self.mailboxes();
        if !mailboxes.contains_key(listener_id) && mailboxes.len() >= self.max_mailboxes {
            return Err(AppError::InvalidState(format!(
                "mailbox limit of {} reached",
                self.max_mailboxes
            )));
        }
        let mailbox = mailboxes
            .entry(listener_id.to_string())
            .or_insert_with(|| Mailbox {
                listener: Arc::new(MailboxListener {
                    id: listener_id.to_string(),
                    capacity: self.capacity,
                    queue: Mutex::new(VecDeque::new()),
                }),
                topics: HashSet::new(),
            });
        mailbox.topics.insert(topic);
        Ok(mailbox.listener.clone())
    }

    fn lookup(&self, listener_id: &str) -> Result<Arc<dyn PublisherListener>> {
        self.mailboxes()
            .get(listener_id)
            .map(|m| m.listener.clone() as Arc<dyn PublisherListener>)
            .ok_or_else(|| no_mailbox(listener_id))
    }

    fn release(&self, listener_id: &str, topic: DhTopic) {
        let mut mailboxes = self.mailboxes();
        let Some(mailbox) = mailboxes.get_mut(listener_id) else {
            return;
        };
        mailbox.topics.remove(&topic);
        if mailbox.topics.is_empty() {
            mailboxes.remove(listener_id);
            debug!(listener = %listener_id, "Mailbox dropped");
        }
    }
}

fn no_mailbox(listener_id: &str) -> AppError {
    AppError::NotFound(format!("listener {} has no mailbox", listener_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_returns_same_mailbox() {
        let registry = MailboxRegistry::default();
        let a = registry.acquire("l1", DhTopic::LowLatency).unwrap();
        let b = registry.acquire("l1", DhTopic::PhoneCall).unwrap();
        a.on_message(DhTopic::LowLatency, "x");

        assert_eq!(b.listener_id(), "l1");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.drain("l1").unwrap().len(), 1);
        assert!(registry.drain("l1").unwrap().is_empty());
    }

    #[test]
    fn test_mailbox_is_bounded() {
        let registry = MailboxRegistry::new(2);
        let l = registry.acquire("l1", DhTopic::PhoneCall).unwrap();
        for m in ["a", "b", "c"] {
            l.on_message(DhTopic::PhoneCall, m);
        }
        let messages: Vec<String> = registry
            .drain("l1")
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn test_unknown_and_empty_ids() {
        let registry = MailboxRegistry::default();
        assert!(matches!(registry.drain("nobody"), Err(AppError::NotFound(_))));
        assert!(matches!(registry.lookup("nobody"), Err(AppError::NotFound(_))));
        assert!(registry.acquire("", DhTopic::LowLatency).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mailbox_dropped_with_last_topic() {
        let registry = MailboxRegistry::default();
        registry.acquire("l1", DhTopic::LowLatency).unwrap();
        registry.acquire("l1", DhTopic::PhoneCall).unwrap();

        registry.release("l1", DhTopic::LowLatency);
        assert!(registry.lookup("l1").is_ok());

        registry.release("l1", DhTopic::PhoneCall);
        assert!(registry.lookup("l1").is_err());
        assert!(registry.is_empty());

        // releasing what was never acquired is a no-op
        registry.release("l1", DhTopic::PhoneCall);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mailbox_limit() {
        let registry = MailboxRegistry::with_limit(4, 2);
        registry.acquire("l1", DhTopic::LowLatency).unwrap();
        registry.acquire("l2", DhTopic::LowLatency).unwrap();

        assert!(matches!(
            registry.acquire("l3", DhTopic::LowLatency),
            Err(AppError::InvalidState(_))
        ));
        // existing ids still register new topics
        registry.acquire("l1", DhTopic::PhoneCall).unwrap();

        registry.release("l2", DhTopic::LowLatency);
        registry.acquire("l3", DhTopic::LowLatency).unwrap();
        assert_eq!(registry.len(), 2);
    }
}
