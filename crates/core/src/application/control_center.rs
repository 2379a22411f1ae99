// Control center - AV transport engine bookkeeping
//
// Engines are created by `initialize` and addressed by id afterwards. The
// data plane itself lives elsewhere; this only tracks which engines exist,
// which peer each one talks to and which callback receives its events.
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{anonymize, AvTransEvent, TransRole};
use crate::error::{AppError, Result};

/// Snapshot of one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    pub engine_id: i32,
    pub role: TransRole,
    pub peer_dev_id: Option<String>,
    pub callback_id: Option<String>,
    pub last_event: Option<AvTransEvent>,
}

pub struct ControlCenter {
    engines: Mutex<HashMap<i32, EngineInfo>>,
    next_id: AtomicI32,
}

impl Default for ControlCenter {
    fn default() -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            next_id: AtomicI32::new(1),
        }
    }
}

impl ControlCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&self, role: TransRole) -> i32 {
        let engine_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.engines().insert(
            engine_id,
            EngineInfo {
                engine_id,
                role,
                peer_dev_id: None,
                callback_id: None,
                last_event: None,
            },
        );
        info!(engine_id, role = ?role, "AV engine initialized");
        engine_id
    }

    pub fn release(&self, engine_id: i32) -> Result<()> {
        self.engines()
            .remove(&engine_id)
            .map(|_| info!(engine_id, "AV engine released"))
            .ok_or_else(|| not_found(engine_id))
    }

    pub fn create_control_channel(&self, engine_id: i32, peer_dev_id: &str) -> Result<()> {
        if peer_dev_id.trim().is_empty() {
            return Err(AppError::Validation("peer device id is empty".into()));
        }
        self.with_engine(engine_id, |engine| {
            engine.peer_dev_id = Some(peer_dev_id.to_string());
        })?;
        info!(engine_id, peer = %anonymize(peer_dev_id), "Control channel created");
        Ok(())
    }

    pub fn register_callback(&self, engine_id: i32, callback_id: &str) -> Result<()> {
        if callback_id.trim().is_empty() {
            return Err(AppError::Validation("callback id is empty".into()));
        }
        self.with_engine(engine_id, |engine| {
            engine.callback_id = Some(callback_id.to_string());
        })?;
        debug!(engine_id, callback = %callback_id, "Control center callback registered");
        Ok(())
    }

    /// Record an event delivered to an engine
    pub fn notify(&self, engine_id: i32, event: &AvTransEvent) -> Result<()> {
        self.with_engine(engine_id, |engine| {
            engine.last_event = Some(event.clone());
        })?;
        debug!(engine_id, event_type = ?event.event_type, "Engine notified");
        Ok(())
    }

    /// `NotFound` unless the engine is live
    pub fn ensure_engine(&self, engine_id: i32) -> Result<()> {
        self.with_engine(engine_id, |_| {})
    }

    pub fn engine(&self, engine_id: i32) -> Option<EngineInfo> {
        self.engines().get(&engine_id).cloned()
    }

    pub fn engine_count(&self) -> usize {
        self.engines().len()
    }

    fn with_engine(&self, engine_id: i32, f: impl FnOnce(&mut EngineInfo)) -> Result<()> {
        let mut engines = self.engines();
        let engine = engines.get_mut(&engine_id).ok_or_else(|| not_found(engine_id))?;
        f(engine);
        Ok(())
    }

    fn engines(&self) -> MutexGuard<'_, HashMap<i32, EngineInfo>> {
        self.engines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(engine_id: i32) -> AppError {
    AppError::NotFound(format!("AV engine {} does not exist", engine_id))
}
