// Hardware Handler Port
// One implementation per hardware type; the driver-specific logic lives behind it.

use crate::domain::HardwareUnit;
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a handler. The code is passed through untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler failed ({code}): {message}")]
pub struct HandlerError {
    pub code: i32,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Enable/disable capability for one hardware type
///
/// Implementations may block on driver I/O or on a session layer; they are
/// only ever called from task-execution contexts.
#[async_trait]
pub trait HardwareHandler: Send + Sync {
    /// Bring the hardware unit up on this device
    async fn enable(&self, unit: &HardwareUnit) -> Result<(), HandlerError>;

    /// Tear the hardware unit down
    async fn disable(&self, unit: &HardwareUnit) -> Result<(), HandlerError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock handler behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with code
        Fail(i32),
        /// Fail with code for the first N calls, then succeed
        FailTimes(usize, i32),
        /// Sleep, then succeed
        Delay(Duration),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock Hardware Handler for testing
    #[derive(Clone)]
    pub struct MockHardwareHandler {
        behavior: Arc<Mutex<MockBehavior>>,
        enable_calls: Arc<AtomicUsize>,
        disable_calls: Arc<AtomicUsize>,
    }

    impl MockHardwareHandler {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                enable_calls: Arc::new(AtomicUsize::new(0)),
                disable_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(code: i32) -> Self {
            Self::new(MockBehavior::Fail(code))
        }

        pub fn enable_calls(&self) -> usize {
            self.enable_calls.load(Ordering::SeqCst)
        }

        pub fn disable_calls(&self) -> usize {
            self.disable_calls.load(Ordering::SeqCst)
        }

        async fn respond(&self, calls: usize) -> Result<(), HandlerError> {
            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(code) => Err(HandlerError::new(code, "mock failure")),
                MockBehavior::FailTimes(n, code) => {
                    if calls <= n {
                        Err(HandlerError::new(code, format!("mock failure #{}", calls)))
                    } else {
                        Ok(())
                    }
                }
                MockBehavior::Delay(d) => {
                    tokio::time::sleep(d).await;
                    Ok(())
                }
                MockBehavior::Panic(msg) => panic!("{}", msg),
            }
        }
    }

    #[async_trait]
    impl HardwareHandler for MockHardwareHandler {
        async fn enable(&self, _unit: &HardwareUnit) -> Result<(), HandlerError> {
            let calls = self.enable_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.respond(calls).await
        }

        async fn disable(&self, _unit: &HardwareUnit) -> Result<(), HandlerError> {
            let calls = self.disable_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.respond(calls).await
        }
    }
}
