// Domain Layer - Tasks, hardware units and wire-level enumerations

pub mod error;
pub mod hardware;
pub mod message;
pub mod task;

// Re-exports
pub use error::DomainError;
pub use hardware::{anonymize, Capability, DhType, HardwareUnit};
pub use message::{AvTransEvent, AvTransEventType, DhTopic, LocalSysSpec, TransRole};
pub use task::{Task, TaskDump, TaskId, TaskOutcome, TaskState, TaskStep, TaskType};
