//! Remote dispatch integration tests
//!
//! Raw request codes through the stub into the real service, with mailbox
//! listeners standing in for remote peers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dhfwk_api_rpc::{DistributedHardwareStub, MailboxRegistry};
use dhfwk_core::application::{
    ComponentManager, DistributedHardwareService, ExecutorConfig, RetryPolicy, SysSpecTable,
    TaskBoard, TaskContext, TaskExecutor, TaskFactory,
};
use dhfwk_core::domain::{Capability, DhTopic, DhType, HardwareUnit};
use dhfwk_core::error::code;
use dhfwk_core::port::hardware_handler::mocks::MockHardwareHandler;
use dhfwk_core::port::id_provider::UuidProvider;
use dhfwk_core::port::time_provider::SystemTimeProvider;
use dhfwk_core::port::{CapabilityStore, TimeProvider};
use dhfwk_infra_system::MemoryCapabilityStore;

struct Harness {
    service: Arc<DistributedHardwareService>,
    mailboxes: Arc<MailboxRegistry>,
    stub: DistributedHardwareStub,
}

fn harness() -> Harness {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let capabilities: Arc<dyn CapabilityStore> = Arc::new(MemoryCapabilityStore::new());
    capabilities.insert(Capability::new("dev-1", "cam0", DhType::Camera));

    let manager = ComponentManager::builder(capabilities.clone())
        .register(DhType::Camera, Arc::new(MockHardwareHandler::new_success()))
        .unwrap()
        .build();
    let ctx = TaskContext {
        manager: Arc::new(manager),
        board: Arc::new(TaskBoard::new()),
        capabilities,
        factory: Arc::new(TaskFactory::new(Arc::new(UuidProvider), time.clone())),
        retry: RetryPolicy::default(),
        time,
    };
    let executor = TaskExecutor::new(ctx, ExecutorConfig::default());

    let service = Arc::new(DistributedHardwareService::new(
        executor,
        SysSpecTable::default(),
    ));
    let mailboxes = Arc::new(MailboxRegistry::default());
    let stub = DistributedHardwareStub::new(service.clone(), mailboxes.clone());
    Harness {
        service,
        mailboxes,
        stub,
    }
}

#[tokio::test]
async fn test_listener_receives_published_message() {
    let h = harness();

    let reply = h
        .stub
        .on_remote_request(48001, &json!({ "topic": 5, "listener_id": "peer-a" }));
    assert!(reply.is_ok());

    let reply = h
        .stub
        .on_remote_request(48003, &json!({ "topic": 5, "message": "latency low" }));
    assert!(reply.is_ok());

    let messages = h.mailboxes.drain("peer-a").unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message, "latency low");

    // Unregistering the only topic drops the mailbox; nobody receives
    let reply = h
        .stub
        .on_remote_request(48002, &json!({ "topic": 5, "listener_id": "peer-a" }));
    assert!(reply.is_ok());
    h.stub
        .on_remote_request(48003, &json!({ "topic": 5, "message": "again" }));
    assert!(h.mailboxes.drain("peer-a").is_err());
    assert_eq!(h.service.publisher().listener_count(DhTopic::LowLatency), 0);

    // A second unregister finds nothing
    let reply = h
        .stub
        .on_remote_request(48002, &json!({ "topic": 5, "listener_id": "peer-a" }));
    assert_eq!(reply.status, code::NOT_FOUND);
    assert!(h.mailboxes.is_empty());
}

#[tokio::test]
async fn test_engine_lifecycle_and_hardware_event() {
    let h = harness();

    let reply = h.stub.on_remote_request(48004, &json!({ "role": 0 }));
    let engine_id = reply.payload.unwrap()["engine_id"].as_i64().unwrap();

    let reply = h.stub.on_remote_request(
        48006,
        &json!({ "engine_id": engine_id, "peer_dev_id": "peer-dev" }),
    );
    assert!(reply.is_ok());

    let reply = h.stub.on_remote_request(
        48008,
        &json!({ "engine_id": engine_id, "callback_id": "cb-1" }),
    );
    assert!(reply.is_ok());

    // Peer asks us to enable cam0
    let unit = HardwareUnit::new("net-1", "dev-1", "cam0");
    let reply = h.stub.on_remote_request(
        48007,
        &json!({
            "engine_id": engine_id,
            "event": {
                "event_type": 16,
                "content": serde_json::to_string(&unit).unwrap(),
                "peer_dev_id": "peer-dev"
            }
        }),
    );
    assert!(reply.is_ok());
    assert!(reply.payload.unwrap()["task_id"].is_string());

    h.service
        .executor()
        .board()
        .wait_for_all_tasks_finish(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(h.service.enabled_units(), vec![unit]);

    let info = h.service.engine(engine_id as i32).unwrap();
    assert_eq!(info.peer_dev_id.as_deref(), Some("peer-dev"));

    let reply = h.stub.on_remote_request(48005, &json!({ "engine_id": engine_id }));
    assert!(reply.is_ok());
    let reply = h.stub.on_remote_request(48005, &json!({ "engine_id": engine_id }));
    assert_eq!(reply.status, code::NOT_FOUND);
}

#[tokio::test]
async fn test_query_local_sys_spec() {
    let h = harness();

    let reply = h.stub.on_remote_request(48009, &json!({ "spec": 4 }));
    let spec = reply.payload.unwrap()["spec"].as_str().unwrap().to_string();
    assert!(spec.contains("video/avc"));

    let reply = h.stub.on_remote_request(48009, &json!({ "spec": 0 }));
    assert_eq!(reply.status, code::INVALID_ARGUMENT);
}

#[tokio::test]
async fn test_rejections_leave_no_trace() {
    let h = harness();

    let reply = h.stub.on_remote_request(48010, &json!({}));
    assert_eq!(reply.status, code::UNSUPPORTED_OPERATION);

    let reply = h
        .stub
        .on_remote_request(48001, &json!({ "topic": 9, "listener_id": "peer-b" }));
    assert_eq!(reply.status, code::INVALID_ARGUMENT);
    // Rejected before a mailbox was created
    assert!(h.mailboxes.drain("peer-b").is_err());

    let reply = h
        .stub
        .on_remote_request(48007, &json!({ "engine_id": 99, "event": { "event_type": 3, "content": "" } }));
    assert_eq!(reply.status, code::NOT_FOUND);
    assert!(h.service.task_dump().is_empty());
}
