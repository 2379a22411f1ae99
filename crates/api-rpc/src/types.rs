//! RPC Request/Response Types
//!
//! Two families live here: the remote-request wire format handled by the
//! dispatch stub (request codes, raw argument payloads, the decoded
//! [`Request`] and the [`Reply`]), and the parameters/results of the
//! daemon's JSON-RPC methods.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dhfwk_core::domain::{
    AvTransEvent, AvTransEventType, DhTopic, HardwareUnit, LocalSysSpec, TaskDump, TaskId,
    TransRole,
};
use dhfwk_core::error::{code, AppError, Result};

// ============================================================================
// Remote request wire format
// ============================================================================

/// Request codes accepted by the dispatch stub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCode {
    RegisterPublisherListener,
    UnregisterPublisherListener,
    PublishMessage,
    Initialize,
    Release,
    CreateControlChannel,
    Notify,
    RegisterControlCenterCallback,
    QueryLocalSysSpec,
}

impl RequestCode {
    pub const ALL: [RequestCode; 9] = [
        RequestCode::RegisterPublisherListener,
        RequestCode::UnregisterPublisherListener,
        RequestCode::PublishMessage,
        RequestCode::Initialize,
        RequestCode::Release,
        RequestCode::CreateControlChannel,
        RequestCode::Notify,
        RequestCode::RegisterControlCenterCallback,
        RequestCode::QueryLocalSysSpec,
    ];

    pub fn as_u32(&self) -> u32 {
        match self {
            RequestCode::RegisterPublisherListener => 48001,
            RequestCode::UnregisterPublisherListener => 48002,
            RequestCode::PublishMessage => 48003,
            RequestCode::Initialize => 48004,
            RequestCode::Release => 48005,
            RequestCode::CreateControlChannel => 48006,
            RequestCode::Notify => 48007,
            RequestCode::RegisterControlCenterCallback => 48008,
            RequestCode::QueryLocalSysSpec => 48009,
        }
    }

    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_u32() == raw)
    }
}

#[derive(Debug, Deserialize)]
struct ListenerArgs {
    topic: u32,
    listener_id: String,
}

#[derive(Debug, Deserialize)]
struct PublishArgs {
    topic: u32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct QuerySpecArgs {
    spec: u32,
}

#[derive(Debug, Deserialize)]
struct InitializeArgs {
    role: u32,
}

#[derive(Debug, Deserialize)]
struct EngineArgs {
    engine_id: i32,
}

#[derive(Debug, Deserialize)]
struct ControlChannelArgs {
    engine_id: i32,
    peer_dev_id: String,
}

#[derive(Debug, Deserialize)]
struct EventArgs {
    event_type: u32,
    #[serde(default)]
    content: String,
    #[serde(default)]
    peer_dev_id: String,
}

#[derive(Debug, Deserialize)]
struct NotifyArgs {
    engine_id: i32,
    event: EventArgs,
}

#[derive(Debug, Deserialize)]
struct CallbackArgs {
    engine_id: i32,
    callback_id: String,
}

/// A remote request decoded and validated at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    RegisterPublisherListener { topic: DhTopic, listener_id: String },
    UnregisterPublisherListener { topic: DhTopic, listener_id: String },
    PublishMessage { topic: DhTopic, message: String },
    QueryLocalSysSpec { spec: LocalSysSpec },
    Initialize { role: TransRole },
    Release { engine_id: i32 },
    CreateControlChannel { engine_id: i32, peer_dev_id: String },
    Notify { engine_id: i32, event: AvTransEvent },
    RegisterControlCenterCallback { engine_id: i32, callback_id: String },
}

impl Request {
    /// Deserialize the payload for `code` and check every enum-typed field.
    pub fn decode(code: RequestCode, data: &Value) -> Result<Self> {
        let request = match code {
            RequestCode::RegisterPublisherListener => {
                let args: ListenerArgs = parse(data)?;
                Request::RegisterPublisherListener {
                    topic: topic(args.topic)?,
                    listener_id: args.listener_id,
                }
            }
            RequestCode::UnregisterPublisherListener => {
                let args: ListenerArgs = parse(data)?;
                Request::UnregisterPublisherListener {
                    topic: topic(args.topic)?,
                    listener_id: args.listener_id,
                }
            }
            RequestCode::PublishMessage => {
                let args: PublishArgs = parse(data)?;
                Request::PublishMessage {
                    topic: topic(args.topic)?,
                    message: args.message,
                }
            }
            RequestCode::QueryLocalSysSpec => {
                let args: QuerySpecArgs = parse(data)?;
                if !LocalSysSpec::is_valid(args.spec) {
                    return Err(AppError::Validation(format!("invalid local spec {}", args.spec)));
                }
                Request::QueryLocalSysSpec {
                    spec: LocalSysSpec::try_from(args.spec)?,
                }
            }
            RequestCode::Initialize => {
                let args: InitializeArgs = parse(data)?;
                Request::Initialize {
                    role: TransRole::try_from(args.role)?,
                }
            }
            RequestCode::Release => {
                let args: EngineArgs = parse(data)?;
                Request::Release {
                    engine_id: args.engine_id,
                }
            }
            RequestCode::CreateControlChannel => {
                let args: ControlChannelArgs = parse(data)?;
                Request::CreateControlChannel {
                    engine_id: args.engine_id,
                    peer_dev_id: args.peer_dev_id,
                }
            }
            RequestCode::Notify => {
                let args: NotifyArgs = parse(data)?;
                Request::Notify {
                    engine_id: args.engine_id,
                    event: AvTransEvent {
                        event_type: AvTransEventType::try_from(args.event.event_type)?,
                        content: args.event.content,
                        peer_dev_id: args.event.peer_dev_id,
                    },
                }
            }
            RequestCode::RegisterControlCenterCallback => {
                let args: CallbackArgs = parse(data)?;
                Request::RegisterControlCenterCallback {
                    engine_id: args.engine_id,
                    callback_id: args.callback_id,
                }
            }
        };
        Ok(request)
    }
}

fn parse<T: DeserializeOwned>(data: &Value) -> Result<T> {
    T::deserialize(data).map_err(|e| AppError::Validation(format!("malformed payload: {}", e)))
}

fn topic(raw: u32) -> Result<DhTopic> {
    if !DhTopic::is_valid(raw) {
        return Err(AppError::Validation(format!("invalid topic {}", raw)));
    }
    Ok(DhTopic::try_from(raw)?)
}

/// Status plus optional result payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Reply {
    pub fn ok(payload: Option<Value>) -> Self {
        Self {
            status: code::SUCCESS,
            payload,
        }
    }

    pub fn status(status: i32) -> Self {
        Self {
            status,
            payload: None,
        }
    }

    pub fn error(err: &AppError) -> Self {
        Self {
            status: err.code(),
            payload: Some(serde_json::json!({ "error": err.to_string() })),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == code::SUCCESS
    }
}

// ============================================================================
// JSON-RPC methods
// ============================================================================

/// dhfwk.remote_request.v1 - Raw remote request through the stub
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteRequestParams {
    pub code: u32,
    #[serde(default)]
    pub data: Value,
}

/// dhfwk.enable.v1 / dhfwk.disable.v1
#[derive(Debug, Serialize, Deserialize)]
pub struct UnitParams {
    pub network_id: String,
    pub device_id: String,
    pub dh_id: String,
}

impl From<UnitParams> for HardwareUnit {
    fn from(p: UnitParams) -> Self {
        HardwareUnit::new(p.network_id, p.device_id, p.dh_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CapabilityParam {
    pub dh_id: String,
    /// Hardware type name, e.g. "CAMERA"
    pub dh_type: String,
}

/// dhfwk.online.v1
#[derive(Debug, Serialize, Deserialize)]
pub struct OnlineParams {
    pub network_id: String,
    pub device_id: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityParam>,
}

/// dhfwk.offline.v1
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceParams {
    pub network_id: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmitted {
    pub task_id: TaskId,
}

/// dhfwk.tasks.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksResponse {
    pub tasks: Vec<TaskDump>,
}

/// dhfwk.enabled.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnabledResponse {
    pub units: Vec<HardwareUnit>,
}

/// dhfwk.listener.drain.v1
#[derive(Debug, Serialize, Deserialize)]
pub struct DrainParams {
    pub listener_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerMessage {
    pub topic: DhTopic,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainResponse {
    pub listener_id: String,
    pub messages: Vec<ListenerMessage>,
}
