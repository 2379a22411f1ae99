// Application Layer - Task lifecycle, registries and the service facade

pub mod component_manager;
pub mod control_center;
pub mod executor;
pub mod publisher;
pub mod retry;
pub mod service;
pub mod task;
pub mod task_board;

// Re-exports
pub use component_manager::{ComponentError, ComponentManager, ComponentManagerBuilder};
pub use control_center::{ControlCenter, EngineInfo};
pub use executor::{ExecutorConfig, TaskContext, TaskExecutor, TaskHandle};
pub use publisher::Publisher;
pub use retry::{RetryDecision, RetryPolicy};
pub use service::{DistributedHardwareService, SysSpecTable};
pub use task::TaskFactory;
pub use task_board::TaskBoard;
