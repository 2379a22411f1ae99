// Hardware Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};

/// Ids up to this length keep one plaintext char on each side when anonymized
const SHORT_ID_LENGTH: usize = 20;
const SHORT_PLAINTEXT_LENGTH: usize = 1;
const LONG_PLAINTEXT_LENGTH: usize = 4;
const MIN_ID_LENGTH: usize = 3;

/// Hardware type. Wire values are single-bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DhType {
    Camera,
    Audio,
    Screen,
    Gps,
    Input,
    Hfp,
    A2d,
    VirmodemAudio,
    Modem,
}

impl DhType {
    pub const ALL: [DhType; 9] = [
        DhType::Camera,
        DhType::Audio,
        DhType::Screen,
        DhType::Gps,
        DhType::Input,
        DhType::Hfp,
        DhType::A2d,
        DhType::VirmodemAudio,
        DhType::Modem,
    ];

    pub fn as_u32(&self) -> u32 {
        match self {
            DhType::Camera => 0x01,
            DhType::Audio => 0x02,
            DhType::Screen => 0x04,
            DhType::Gps => 0x08,
            DhType::Input => 0x10,
            DhType::Hfp => 0x20,
            DhType::A2d => 0x40,
            DhType::VirmodemAudio => 0x80,
            DhType::Modem => 0x100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DhType::Camera => "CAMERA",
            DhType::Audio => "AUDIO",
            DhType::Screen => "SCREEN",
            DhType::Gps => "GPS",
            DhType::Input => "INPUT",
            DhType::Hfp => "HFP",
            DhType::A2d => "A2D",
            DhType::VirmodemAudio => "VIRMODEM_AUDIO",
            DhType::Modem => "MODEM",
        }
    }
}

impl TryFrom<u32> for DhType {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self> {
        DhType::ALL
            .into_iter()
            .find(|t| t.as_u32() == value)
            .ok_or(DomainError::InvalidValue {
                kind: "hardware type",
                value,
            })
    }
}

impl FromStr for DhType {
    type Err = DomainError;

    /// Accepts the upper-case wire name in any case ("camera", "VIRMODEM_AUDIO")
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        DhType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| DomainError::UnknownHardwareType(s.to_string()))
    }
}

impl fmt::Display for DhType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressing triple: one piece of hardware on one device in one network session.
///
/// Device-level operations (online/offline) leave `dh_id` empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareUnit {
    pub network_id: String,
    pub device_id: String,
    pub dh_id: String,
}

impl HardwareUnit {
    pub fn new(
        network_id: impl Into<String>,
        device_id: impl Into<String>,
        dh_id: impl Into<String>,
    ) -> Self {
        Self {
            network_id: network_id.into(),
            device_id: device_id.into(),
            dh_id: dh_id.into(),
        }
    }

    /// Unit addressing a whole device rather than one hardware instance
    pub fn device(network_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self::new(network_id, device_id, String::new())
    }

    pub fn is_device_level(&self) -> bool {
        self.dh_id.is_empty()
    }

    /// Reject empty network/device ids, and an empty hardware id unless the
    /// caller asked for a device-level unit.
    pub fn validate(&self, device_level: bool) -> Result<()> {
        if self.network_id.trim().is_empty() {
            return Err(DomainError::ValidationError("network_id is empty".into()));
        }
        if self.device_id.trim().is_empty() {
            return Err(DomainError::ValidationError("device_id is empty".into()));
        }
        if !device_level && self.dh_id.trim().is_empty() {
            return Err(DomainError::ValidationError("dh_id is empty".into()));
        }
        Ok(())
    }

    /// Key used by the enabled-unit ledger
    pub fn ledger_key(&self) -> String {
        format!("{}#{}", self.device_id, self.dh_id)
    }
}

impl fmt::Display for HardwareUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            anonymize(&self.network_id),
            anonymize(&self.device_id),
            self.dh_id
        )
    }
}

/// One hardware capability advertised by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub device_id: String,
    pub dh_id: String,
    pub dh_type: DhType,
}

impl Capability {
    pub fn new(device_id: impl Into<String>, dh_id: impl Into<String>, dh_type: DhType) -> Self {
        Self {
            device_id: device_id.into(),
            dh_id: dh_id.into(),
            dh_type,
        }
    }
}

/// Mask the middle of an identifier before it reaches a log line
pub fn anonymize(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < MIN_ID_LENGTH {
        return "******".to_string();
    }
    let keep = if chars.len() <= SHORT_ID_LENGTH {
        SHORT_PLAINTEXT_LENGTH
    } else {
        LONG_PLAINTEXT_LENGTH
    };
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{}******{}", head, tail)
}
