//! ComponentManager - per-hardware-type enable/disable bindings
//!
//! Handlers are registered once through [`ComponentManagerBuilder`] while
//! the service starts; the resulting map is never mutated again, so lookups
//! take no lock. The manager does not deduplicate concurrent calls for the
//! same unit: that is the job of whoever submits tasks.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::domain::{anonymize, DhType, HardwareUnit};
use crate::error::{code, AppError, Result};
use crate::port::{CapabilityStore, HandlerError, HardwareHandler};

/// Result of a failed enable/disable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// No handler registered for the unit's hardware type
    #[error("hardware type {0} is not supported")]
    NotSupported(DhType),

    /// The unit's hardware type could not be resolved
    #[error("no capability {dh_id} known for device {device}")]
    CapabilityNotFound { device: String, dh_id: String },

    /// The handler ran and reported a failure
    #[error("{dh_type} handler: {source}")]
    Handler {
        dh_type: DhType,
        #[source]
        source: HandlerError,
    },
}

impl ComponentError {
    /// Status code; handler codes pass through as-is
    pub fn code(&self) -> i32 {
        match self {
            ComponentError::NotSupported(_) => code::NOT_SUPPORTED,
            ComponentError::CapabilityNotFound { .. } => code::NOT_FOUND,
            ComponentError::Handler { source, .. } => source.code,
        }
    }

    /// Only handler-internal failures are candidates for retry
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, ComponentError::Handler { .. })
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Enable,
    Disable,
}

pub struct ComponentManager {
    handlers: HashMap<DhType, Arc<dyn HardwareHandler>>,
    capabilities: Arc<dyn CapabilityStore>,
}

impl ComponentManager {
    pub fn builder(capabilities: Arc<dyn CapabilityStore>) -> ComponentManagerBuilder {
        ComponentManagerBuilder {
            handlers: HashMap::new(),
            capabilities,
        }
    }

    pub fn is_registered(&self, dh_type: DhType) -> bool {
        self.handlers.contains_key(&dh_type)
    }

    pub fn registered_types(&self) -> Vec<DhType> {
        let mut types: Vec<DhType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    /// Enable one hardware unit through its type's handler
    pub async fn enable(&self, unit: &HardwareUnit) -> std::result::Result<(), ComponentError> {
        self.invoke(Operation::Enable, unit).await
    }

    /// Disable one hardware unit through its type's handler
    pub async fn disable(&self, unit: &HardwareUnit) -> std::result::Result<(), ComponentError> {
        self.invoke(Operation::Disable, unit).await
    }

    async fn invoke(
        &self,
        op: Operation,
        unit: &HardwareUnit,
    ) -> std::result::Result<(), ComponentError> {
        let dh_type = self
            .capabilities
            .dh_type(&unit.device_id, &unit.dh_id)
            .ok_or_else(|| {
                warn!(
                    device = %anonymize(&unit.device_id),
                    dh_id = %unit.dh_id,
                    "Capability not found"
                );
                ComponentError::CapabilityNotFound {
                    device: anonymize(&unit.device_id),
                    dh_id: unit.dh_id.clone(),
                }
            })?;

        let handler = self.handlers.get(&dh_type).ok_or_else(|| {
            warn!(dh_type = %dh_type, "No handler registered for hardware type");
            ComponentError::NotSupported(dh_type)
        })?;

        let result = match op {
            Operation::Enable => {
                let span = info_span!("component_enable", dh_type = %dh_type, dh_id = %unit.dh_id);
                handler.enable(unit).instrument(span).await
            }
            Operation::Disable => {
                let span = info_span!("component_disable", dh_type = %dh_type, dh_id = %unit.dh_id);
                handler.disable(unit).instrument(span).await
            }
        };

        result.map_err(|source| {
            info!(
                dh_type = %dh_type,
                device = %anonymize(&unit.device_id),
                dh_id = %unit.dh_id,
                code = source.code,
                "{:?} failed in handler", op
            );
            ComponentError::Handler { dh_type, source }
        })
    }
}

/// Startup-time registration of handlers
pub struct ComponentManagerBuilder {
    handlers: HashMap<DhType, Arc<dyn HardwareHandler>>,
    capabilities: Arc<dyn CapabilityStore>,
}

impl ComponentManagerBuilder {
    /// Bind a handler to a hardware type. Each type may be bound once.
    pub fn register(mut self, dh_type: DhType, handler: Arc<dyn HardwareHandler>) -> Result<Self> {
        if self.handlers.contains_key(&dh_type) {
            return Err(AppError::Conflict(format!(
                "handler for {} already registered",
                dh_type
            )));
        }
        info!(dh_type = %dh_type, "Hardware handler registered");
        self.handlers.insert(dh_type, handler);
        Ok(self)
    }

    pub fn build(self) -> ComponentManager {
        ComponentManager {
            handlers: self.handlers,
            capabilities: self.capabilities,
        }
    }
}
