//! RPC Method Handlers
//!
//! Implements the logic behind each JSON-RPC method. Every method returns
//! once its task is submitted; clients poll `dhfwk.tasks.v1` for progress.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use tracing::info;

use dhfwk_core::application::DistributedHardwareService;
use dhfwk_core::domain::{DhType, HardwareUnit};
use dhfwk_core::error::AppError;

use crate::error::to_rpc_error;
use crate::listener::MailboxRegistry;
use crate::stub::DistributedHardwareStub;
use crate::types::{
    DeviceParams, DrainParams, DrainResponse, EnabledResponse, OnlineParams, RemoteRequestParams,
    Reply, TaskSubmitted, TasksResponse, UnitParams,
};

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<DistributedHardwareService>,
    stub: DistributedHardwareStub,
    mailboxes: Arc<MailboxRegistry>,
}

impl RpcHandler {
    pub fn new(service: Arc<DistributedHardwareService>, mailboxes: Arc<MailboxRegistry>) -> Self {
        let stub = DistributedHardwareStub::new(service.clone(), mailboxes.clone());
        Self {
            service,
            stub,
            mailboxes,
        }
    }

    /// dhfwk.remote_request.v1
    pub async fn remote_request(&self, params: RemoteRequestParams) -> Result<Reply, ErrorObjectOwned> {
        Ok(self.stub.on_remote_request(params.code, &params.data))
    }

    /// dhfwk.enable.v1
    pub async fn enable(&self, params: UnitParams) -> Result<TaskSubmitted, ErrorObjectOwned> {
        let handle = self
            .service
            .enable_hardware(HardwareUnit::from(params))
            .map_err(to_rpc_error)?;
        Ok(TaskSubmitted {
            task_id: handle.id().clone(),
        })
    }

    /// dhfwk.disable.v1
    pub async fn disable(&self, params: UnitParams) -> Result<TaskSubmitted, ErrorObjectOwned> {
        let handle = self
            .service
            .disable_hardware(HardwareUnit::from(params))
            .map_err(to_rpc_error)?;
        Ok(TaskSubmitted {
            task_id: handle.id().clone(),
        })
    }

    /// dhfwk.online.v1
    pub async fn online(&self, params: OnlineParams) -> Result<TaskSubmitted, ErrorObjectOwned> {
        let capabilities = params
            .capabilities
            .into_iter()
            .map(|c| {
                c.dh_type
                    .parse::<DhType>()
                    .map(|t| (c.dh_id, t))
                    .map_err(|e| to_rpc_error(AppError::from(e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = capabilities.len(), "Device online requested over RPC");
        let handle = self
            .service
            .device_online(&params.network_id, &params.device_id, capabilities)
            .map_err(to_rpc_error)?;
        Ok(TaskSubmitted {
            task_id: handle.id().clone(),
        })
    }

    /// dhfwk.offline.v1
    pub async fn offline(&self, params: DeviceParams) -> Result<TaskSubmitted, ErrorObjectOwned> {
        let handle = self
            .service
            .device_offline(&params.network_id, &params.device_id)
            .map_err(to_rpc_error)?;
        Ok(TaskSubmitted {
            task_id: handle.id().clone(),
        })
    }

    /// dhfwk.tasks.v1
    pub async fn tasks(&self) -> Result<TasksResponse, ErrorObjectOwned> {
        Ok(TasksResponse {
            tasks: self.service.task_dump(),
        })
    }

    /// dhfwk.enabled.v1
    pub async fn enabled(&self) -> Result<EnabledResponse, ErrorObjectOwned> {
        Ok(EnabledResponse {
            units: self.service.enabled_units(),
        })
    }

    /// dhfwk.listener.drain.v1
    pub async fn drain(&self, params: DrainParams) -> Result<DrainResponse, ErrorObjectOwned> {
        let messages = self
            .mailboxes
            .drain(&params.listener_id)
            .map_err(to_rpc_error)?;
        Ok(DrainResponse {
            listener_id: params.listener_id,
            messages,
        })
    }
}
