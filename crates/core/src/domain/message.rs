// Wire-level enumerations carried by remote requests
//
// Every enum here is closed: a raw value outside the recognized set is
// rejected by `TryFrom<u32>` and never reaches a service operation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::{DomainError, Result};

/// Topic of a published status/event message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DhTopic {
    StartDscreen,
    SinkProjectWindowInfo,
    StopDscreen,
    DevOffline,
    LowLatency,
    InitDhmsReady,
    PhoneCall,
    Isomerism,
}

impl DhTopic {
    /// Exclusive bounds of the recognized range
    pub const MIN: u32 = 0;
    pub const MAX: u32 = 9;

    pub fn as_u32(&self) -> u32 {
        match self {
            DhTopic::StartDscreen => 1,
            DhTopic::SinkProjectWindowInfo => 2,
            DhTopic::StopDscreen => 3,
            DhTopic::DevOffline => 4,
            DhTopic::LowLatency => 5,
            DhTopic::InitDhmsReady => 6,
            DhTopic::PhoneCall => 7,
            DhTopic::Isomerism => 8,
        }
    }

    pub fn is_valid(raw: u32) -> bool {
        raw > Self::MIN && raw < Self::MAX
    }
}

impl TryFrom<u32> for DhTopic {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(DhTopic::StartDscreen),
            2 => Ok(DhTopic::SinkProjectWindowInfo),
            3 => Ok(DhTopic::StopDscreen),
            4 => Ok(DhTopic::DevOffline),
            5 => Ok(DhTopic::LowLatency),
            6 => Ok(DhTopic::InitDhmsReady),
            7 => Ok(DhTopic::PhoneCall),
            8 => Ok(DhTopic::Isomerism),
            _ => Err(DomainError::InvalidValue {
                kind: "topic",
                value,
            }),
        }
    }
}

impl fmt::Display for DhTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Local system specification a remote peer may query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalSysSpec {
    HistreamerAudioEncoder,
    HistreamerAudioDecoder,
    HistreamerVideoEncoder,
    HistreamerVideoDecoder,
}

impl LocalSysSpec {
    pub const MIN: u32 = 0;
    pub const MAX: u32 = 5;

    pub fn as_u32(&self) -> u32 {
        match self {
            LocalSysSpec::HistreamerAudioEncoder => 1,
            LocalSysSpec::HistreamerAudioDecoder => 2,
            LocalSysSpec::HistreamerVideoEncoder => 3,
            LocalSysSpec::HistreamerVideoDecoder => 4,
        }
    }

    pub fn is_valid(raw: u32) -> bool {
        raw > Self::MIN && raw < Self::MAX
    }
}

impl TryFrom<u32> for LocalSysSpec {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(LocalSysSpec::HistreamerAudioEncoder),
            2 => Ok(LocalSysSpec::HistreamerAudioDecoder),
            3 => Ok(LocalSysSpec::HistreamerVideoEncoder),
            4 => Ok(LocalSysSpec::HistreamerVideoDecoder),
            _ => Err(DomainError::InvalidValue {
                kind: "local spec",
                value,
            }),
        }
    }
}

impl fmt::Display for LocalSysSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Role of an AV transport engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransRole {
    AvSender,
    AvReceiver,
}

impl TryFrom<u32> for TransRole {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(TransRole::AvSender),
            1 => Ok(TransRole::AvReceiver),
            _ => Err(DomainError::InvalidValue {
                kind: "trans role",
                value,
            }),
        }
    }
}

/// Event kinds forwarded through `Notify`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvTransEventType {
    ChannelOpened,
    ChannelOpenFail,
    ChannelClosed,
    StartSuccess,
    StartFail,
    StopSuccess,
    StopFail,
    EngineError,
    RemoteError,
    /// Peer asks this device to enable one of its hardware units
    HardwareEnable,
    /// Peer asks this device to disable one of its hardware units
    HardwareDisable,
}

impl TryFrom<u32> for AvTransEventType {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(AvTransEventType::ChannelOpened),
            1 => Ok(AvTransEventType::ChannelOpenFail),
            2 => Ok(AvTransEventType::ChannelClosed),
            3 => Ok(AvTransEventType::StartSuccess),
            4 => Ok(AvTransEventType::StartFail),
            5 => Ok(AvTransEventType::StopSuccess),
            6 => Ok(AvTransEventType::StopFail),
            7 => Ok(AvTransEventType::EngineError),
            8 => Ok(AvTransEventType::RemoteError),
            16 => Ok(AvTransEventType::HardwareEnable),
            17 => Ok(AvTransEventType::HardwareDisable),
            _ => Err(DomainError::InvalidValue {
                kind: "event type",
                value,
            }),
        }
    }
}

/// Event delivered to an AV engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvTransEvent {
    pub event_type: AvTransEventType,
    pub content: String,
    pub peer_dev_id: String,
}
