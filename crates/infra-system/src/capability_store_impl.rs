// In-memory capability store
// Populated from device-online events; nothing survives a restart, which
// matches the lifetime of the network sessions it describes.
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use dhfwk_core::domain::{anonymize, Capability, DhType};
use dhfwk_core::port::CapabilityStore;

/// Keyed by (device_id, dh_id) so a device's entries are contiguous and
/// already ordered by dh_id
#[derive(Default)]
pub struct MemoryCapabilityStore {
    entries: RwLock<BTreeMap<(String, String), DhType>>,
}

impl MemoryCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CapabilityStore for MemoryCapabilityStore {
    fn dh_type(&self, device_id: &str, dh_id: &str) -> Option<DhType> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(device_id.to_string(), dh_id.to_string()))
            .copied()
    }

    fn capabilities(&self, device_id: &str) -> Vec<Capability> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((device, _), _)| device == device_id)
            .map(|((device, dh_id), dh_type)| Capability::new(device.clone(), dh_id.clone(), *dh_type))
            .collect()
    }

    fn insert(&self, capability: Capability) {
        debug!(
            device = %anonymize(&capability.device_id),
            dh_id = %capability.dh_id,
            dh_type = %capability.dh_type,
            "Capability stored"
        );
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((capability.device_id, capability.dh_id), capability.dh_type);
    }

    fn remove_device(&self, device_id: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(device, _), _| device != device_id);
        before - entries.len()
    }
}
