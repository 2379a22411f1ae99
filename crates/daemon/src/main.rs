//! Distributed hardware framework daemon
//!
//! Composition root: loads configuration, wires the hardware handlers into
//! the component manager, starts the task executor and the JSON-RPC server,
//! and drains in-flight tasks on Ctrl+C.

mod config;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use dhfwk_api_rpc::{MailboxRegistry, RpcServer, RpcServerConfig};
use dhfwk_core::application::{
    ComponentManager, DistributedHardwareService, ExecutorConfig, RetryPolicy, SysSpecTable,
    TaskBoard, TaskContext, TaskExecutor, TaskFactory,
};
use dhfwk_core::domain::{DhType, LocalSysSpec};
use dhfwk_core::port::id_provider::UuidProvider;
use dhfwk_core::port::time_provider::SystemTimeProvider;
use dhfwk_core::port::{CapabilityStore, TimeProvider};
use dhfwk_infra_system::{MemoryCapabilityStore, SubprocessHandler};

use crate::config::{DaemonConfig, LogConfig, LogFormat, SysSpecSection};
use crate::telemetry::BoxedLayer;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "dhfwk.log";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration first: it decides how we log
    let config = config::load()?;

    // 2. Logging (+ optional OTLP export)
    let telemetry_layer = telemetry::layer(&config.telemetry)?;
    let _log_guard = init_logging(&config.log, telemetry_layer)?;

    info!("DHFWK daemon v{} starting...", VERSION);

    // 3. DI wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let capabilities: Arc<dyn CapabilityStore> = Arc::new(MemoryCapabilityStore::new());
    let manager = Arc::new(build_component_manager(&config, capabilities.clone())?);
    info!(types = ?manager.registered_types(), "Hardware handlers registered");

    let retry = RetryPolicy::new(
        config.retry.max_attempts,
        config.retry.base_delay_ms,
        config.retry.backoff_factor,
        config.retry.retryable_codes.clone(),
    );

    let ctx = TaskContext {
        manager,
        board: Arc::new(TaskBoard::new()),
        capabilities,
        factory: Arc::new(TaskFactory::new(Arc::new(UuidProvider), time_provider.clone())),
        retry,
        time: time_provider,
    };
    let executor = TaskExecutor::new(
        ctx,
        ExecutorConfig {
            max_concurrent_tasks: config.executor.max_concurrent_tasks,
            dedupe_in_flight: config.executor.dedupe_in_flight,
        },
    );

    let service = Arc::new(DistributedHardwareService::new(
        executor.clone(),
        sys_spec_table(&config.sys_spec),
    ));
    let mailboxes = Arc::new(MailboxRegistry::default());

    // 4. JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: config.rpc.host.clone(),
        port: config.rpc.port,
    };
    let (rpc_handle, addr) = RpcServer::new(rpc_config, service, mailboxes)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Draining in-flight tasks...");

    // 6. Graceful shutdown: stop accepting, drain, then close the RPC port
    executor.shutdown();
    let drain_timeout = Duration::from_millis(config.executor.shutdown_timeout_ms);
    if let Err(e) = executor.drain(drain_timeout).await {
        warn!(error = %e, remaining = executor.board().len(), "Drain timed out");
    }

    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    telemetry::shutdown();

    info!("Shutdown complete.");
    Ok(())
}

fn init_logging(log: &LogConfig, telemetry_layer: Option<BoxedLayer>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.filter))
        .with_context(|| format!("Invalid log filter: {}", log.filter))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.extend(telemetry_layer);

    match log.format {
        // Production: JSON structured logging
        LogFormat::Json => layers.push(fmt::layer().json().boxed()),
        // Development: pretty formatting with colors
        LogFormat::Pretty => layers.push(fmt::layer().pretty().boxed()),
    }

    let mut guard = None;
    if let Some(dir) = &log.directory {
        let dir = shellexpand::tilde(dir).into_owned();
        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn build_component_manager(
    config: &DaemonConfig,
    capabilities: Arc<dyn CapabilityStore>,
) -> Result<ComponentManager> {
    // Sorted so registration order (and its log output) is stable
    let mut names: Vec<&String> = config.handlers.keys().collect();
    names.sort();

    let mut builder = ComponentManager::builder(capabilities);
    for name in names {
        let dh_type: DhType = name
            .parse()
            .with_context(|| format!("Unknown hardware type in [handlers.{}]", name))?;
        let handler = SubprocessHandler::new(dh_type, config.handlers[name].clone())
            .with_context(|| format!("Invalid handler for {}", name))?;
        builder = builder.register(dh_type, Arc::new(handler))?;
    }

    if config.handlers.is_empty() {
        warn!("No hardware handlers configured; every enable will fail as not supported");
    }
    Ok(builder.build())
}

fn sys_spec_table(section: &SysSpecSection) -> SysSpecTable {
    let overrides = [
        (LocalSysSpec::HistreamerAudioEncoder, &section.audio_encoders),
        (LocalSysSpec::HistreamerAudioDecoder, &section.audio_decoders),
        (LocalSysSpec::HistreamerVideoEncoder, &section.video_encoders),
        (LocalSysSpec::HistreamerVideoDecoder, &section.video_decoders),
    ];

    overrides
        .into_iter()
        .fold(SysSpecTable::default(), |table, (spec, codecs)| match codecs {
            Some(codecs) => table.with(spec, codecs.clone()),
            None => table,
        })
}
