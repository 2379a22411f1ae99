// Capability Store Port
// Hardware-type registry populated when a device joins; ComponentManager
// resolves the type of a (device, dh_id) pair through it.

use crate::domain::{Capability, DhType};

pub trait CapabilityStore: Send + Sync {
    /// Hardware type of one advertised capability
    fn dh_type(&self, device_id: &str, dh_id: &str) -> Option<DhType>;

    /// All capabilities advertised by a device, ordered by dh_id
    fn capabilities(&self, device_id: &str) -> Vec<Capability>;

    /// Add or replace a capability
    fn insert(&self, capability: Capability);

    /// Forget every capability of a device, returning how many were dropped
    fn remove_device(&self, device_id: &str) -> usize;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Vec-backed store for unit tests
    #[derive(Default)]
    pub struct MockCapabilityStore {
        entries: Mutex<Vec<Capability>>,
    }

    impl MockCapabilityStore {
        pub fn with(entries: Vec<Capability>) -> Self {
            Self {
                entries: Mutex::new(entries),
            }
        }
    }

    impl CapabilityStore for MockCapabilityStore {
        fn dh_type(&self, device_id: &str, dh_id: &str) -> Option<DhType> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.device_id == device_id && c.dh_id == dh_id)
                .map(|c| c.dh_type)
        }

        fn capabilities(&self, device_id: &str) -> Vec<Capability> {
            let mut caps: Vec<Capability> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.device_id == device_id)
                .cloned()
                .collect();
            caps.sort_by(|a, b| a.dh_id.cmp(&b.dh_id));
            caps
        }

        fn insert(&self, capability: Capability) {
            let mut entries = self.entries.lock().unwrap();
            entries.retain(|c| !(c.device_id == capability.device_id && c.dh_id == capability.dh_id));
            entries.push(capability);
        }

        fn remove_device(&self, device_id: &str) -> usize {
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|c| c.device_id != device_id);
            before - entries.len()
        }
    }
}
