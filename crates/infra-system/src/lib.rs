// DHFWK Infrastructure - System Adapters
// Implements: HardwareHandler (subprocess), CapabilityStore (in-memory)

pub mod capability_store_impl;
pub mod subprocess_handler;

pub use capability_store_impl::MemoryCapabilityStore;
pub use subprocess_handler::{SubprocessHandler, SubprocessHandlerConfig};
