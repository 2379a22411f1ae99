//! JSON-RPC Server
//!
//! Serves the dispatch stub and the local policy triggers over TCP bound to
//! localhost.

use crate::handler::RpcHandler;
use crate::listener::MailboxRegistry;
use crate::types::{DeviceParams, DrainParams, OnlineParams, RemoteRequestParams, UnitParams};
use dhfwk_core::application::DistributedHardwareService;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9531;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        service: Arc<DistributedHardwareService>,
        mailboxes: Arc<MailboxRegistry>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service, mailboxes)),
        }
    }

    /// Start the JSON-RPC server, returning its handle and the bound address
    /// (useful when port 0 was requested)
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.remote_request.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RemoteRequestParams = params.parse()?;
                    handler.remote_request(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.enable.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: UnitParams = params.parse()?;
                    handler.enable(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.disable.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: UnitParams = params.parse()?;
                    handler.disable(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.online.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: OnlineParams = params.parse()?;
                    handler.online(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.offline.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DeviceParams = params.parse()?;
                    handler.offline(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.tasks.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.tasks().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.enabled.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.enabled().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("dhfwk.listener.drain.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DrainParams = params.parse()?;
                    handler.drain(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((handle, local_addr))
    }
}
