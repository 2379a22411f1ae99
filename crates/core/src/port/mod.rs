// Port Layer - Interfaces for external dependencies

pub mod capability_store;
pub mod distributed_hardware;
pub mod hardware_handler;
pub mod id_provider; // For deterministic testing
pub mod time_provider;

// Re-exports
pub use capability_store::CapabilityStore;
pub use distributed_hardware::{DistributedHardware, PublisherListener};
pub use hardware_handler::{HandlerError, HardwareHandler};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
