//! Hardware lifecycle integration tests
//!
//! Real subprocess handlers behind the component manager, driven through
//! the service's local triggers: online, enable, disable, offline.
#![cfg(unix)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dhfwk_core::application::{
    ComponentManager, DistributedHardwareService, ExecutorConfig, RetryPolicy, SysSpecTable,
    TaskBoard, TaskContext, TaskExecutor, TaskFactory,
};
use dhfwk_core::domain::{Capability, DhTopic, DhType, HardwareUnit, TaskState};
use dhfwk_core::port::id_provider::UuidProvider;
use dhfwk_core::port::time_provider::SystemTimeProvider;
use dhfwk_core::port::{CapabilityStore, DistributedHardware, PublisherListener, TimeProvider};
use dhfwk_infra_system::{MemoryCapabilityStore, SubprocessHandler, SubprocessHandlerConfig};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

fn sh(script: String) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script]
}

fn handler(enable: Vec<String>, disable: Vec<String>) -> SubprocessHandlerConfig {
    SubprocessHandlerConfig {
        enable,
        disable,
        timeout_ms: 5_000,
        grace_ms: 500,
        env_allowlist: vec!["PATH".to_string()],
    }
}

/// Camera handler appends `<op> <dh_id>` to `journal`; audio always fails with 3
fn build_service(journal: &PathBuf, retry: RetryPolicy) -> DistributedHardwareService {
    let journal = journal.display().to_string();
    let camera = handler(
        sh(format!("echo enable {{dh_id}} >> {}", journal)),
        sh(format!("echo disable {{dh_id}} >> {}", journal)),
    );
    let audio = handler(sh("exit 3".to_string()), sh("exit 0".to_string()));

    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let capabilities: Arc<dyn CapabilityStore> = Arc::new(MemoryCapabilityStore::new());
    let manager = ComponentManager::builder(capabilities.clone())
        .register(
            DhType::Camera,
            Arc::new(SubprocessHandler::new(DhType::Camera, camera).unwrap()),
        )
        .unwrap()
        .register(
            DhType::Audio,
            Arc::new(SubprocessHandler::new(DhType::Audio, audio).unwrap()),
        )
        .unwrap()
        .build();

    let ctx = TaskContext {
        manager: Arc::new(manager),
        board: Arc::new(TaskBoard::new()),
        capabilities,
        factory: Arc::new(TaskFactory::new(Arc::new(UuidProvider), time.clone())),
        retry,
        time,
    };
    let executor = TaskExecutor::new(ctx, ExecutorConfig::default());
    DistributedHardwareService::new(executor, SysSpecTable::default())
}

fn journal_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("dhfwk-it-{}-{}.log", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

fn read_journal(path: &PathBuf) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

struct Collector {
    messages: Mutex<Vec<String>>,
}

impl PublisherListener for Collector {
    fn listener_id(&self) -> &str {
        "collector"
    }

    fn on_message(&self, _topic: DhTopic, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[tokio::test]
async fn test_online_then_offline_round_trip() {
    let journal = journal_path("round-trip");
    let service = build_service(&journal, RetryPolicy::default());
    let board = service.executor().board().clone();

    let collector = Arc::new(Collector {
        messages: Mutex::new(Vec::new()),
    });
    service
        .register_publisher_listener(DhTopic::DevOffline, collector.clone())
        .unwrap();

    // Online: cam0/cam1 enable through the script, mic0 fails with 3
    let online = service
        .device_online(
            "net-1",
            "dev-1",
            vec![
                ("cam0".to_string(), DhType::Camera),
                ("cam1".to_string(), DhType::Camera),
                ("mic0".to_string(), DhType::Audio),
            ],
        )
        .unwrap();
    assert_eq!(online.wait().await, TaskState::Success);
    board.wait_for_all_tasks_finish(SETTLE_TIMEOUT).await.unwrap();

    let mut enabled: Vec<String> = service.enabled_units().into_iter().map(|u| u.dh_id).collect();
    enabled.sort();
    assert_eq!(enabled, vec!["cam0", "cam1"]);

    let mut lines = read_journal(&journal);
    lines.sort();
    assert_eq!(lines, vec!["enable cam0", "enable cam1"]);

    // Offline: disables what was enabled, forgets the device, tells listeners
    let offline = service.device_offline("net-1", "dev-1").unwrap();
    assert_eq!(offline.wait().await, TaskState::Success);

    assert!(service.enabled_units().is_empty());
    assert!(service
        .executor()
        .capabilities()
        .dh_type("dev-1", "cam0")
        .is_none());
    assert!(board.is_empty());

    let disables = read_journal(&journal)
        .into_iter()
        .filter(|l| l.starts_with("disable"))
        .count();
    assert_eq!(disables, 2);

    let messages = collector.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("dev-1"));

    let _ = std::fs::remove_file(&journal);
}

#[tokio::test]
async fn test_handler_exit_code_becomes_task_outcome() {
    let journal = journal_path("exit-code");
    let service = build_service(&journal, RetryPolicy::default());
    service
        .device_online("net-1", "dev-2", vec![("mic0".to_string(), DhType::Audio)])
        .unwrap()
        .wait()
        .await;
    service
        .executor()
        .board()
        .wait_for_all_tasks_finish(SETTLE_TIMEOUT)
        .await
        .unwrap();

    let handle = service
        .enable_hardware(HardwareUnit::new("net-1", "dev-2", "mic0"))
        .unwrap();
    let task = handle.task().clone();

    assert_eq!(handle.wait().await, TaskState::Fail);
    let outcome = task.outcome().unwrap();
    assert_eq!(outcome.code, 3);
    assert!(service.enabled_units().is_empty());
}

#[tokio::test]
async fn test_retryable_failure_is_retried_until_exhausted() {
    let journal = journal_path("retry");
    // 3 attempts, tiny delay, exit code 3 is retryable
    let service = build_service(&journal, RetryPolicy::new(3, 10, 1.0, vec![3]));
    service
        .executor()
        .capabilities()
        .insert(Capability::new("dev-3", "mic0", DhType::Audio));

    let handle = service
        .enable_hardware(HardwareUnit::new("net-1", "dev-3", "mic0"))
        .unwrap();
    let task = handle.task().clone();

    assert_eq!(handle.wait().await, TaskState::Fail);
    assert_eq!(task.outcome().unwrap().code, 3);
}

#[tokio::test]
async fn test_enable_unknown_hardware_fails_not_found() {
    let journal = journal_path("unknown");
    let service = build_service(&journal, RetryPolicy::default());

    let handle = service
        .enable_hardware(HardwareUnit::new("net-1", "dev-9", "cam0"))
        .unwrap();
    let task = handle.task().clone();

    assert_eq!(handle.wait().await, TaskState::Fail);
    assert_eq!(
        task.outcome().unwrap().code,
        dhfwk_core::error::code::NOT_FOUND
    );
    assert!(read_journal(&journal).is_empty());
}
