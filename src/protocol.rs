//! Wire protocol: command frames, the closed command enumeration, reply
//! encoding and the response codes.
//!
//! Every message is a single JSON object terminated by CR+LF. Inbound
//! commands carry `command`, optional `parameters` and an optional
//! `commandId` which is synthesized locally when absent. Replies echo the
//! commandId and carry either `response` + `timeout` or, for status
//! requests, `response` + the subsystem payload keyed by its short name.

use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use static_assertions::const_assert;
use thiserror::Error;

use crate::config::ConfigSetting;
use crate::subsystems::{LlcError, LlcName, OnOff};

/// Maximum accepted command line length [bytes].
pub const MAX_COMMAND_SIZE: usize = 1024;
/// Maximum reply length [bytes]; status payloads with per-motor arrays are
/// the largest messages.
pub const MAX_REPLY_SIZE: usize = 8192;

const_assert!(MAX_REPLY_SIZE >= 4 * MAX_COMMAND_SIZE);

pub type ReplyBuffer = ArrayString<MAX_REPLY_SIZE>;

/// Estimated completion time [s] reported for commands that are queued by
/// the power management scheduler rather than executed immediately.
pub const LONG_DURATION: f64 = 20.0;

/// Response codes carried in the `response` field of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok,
    UnsupportedCommand,
    IncorrectParameters,
    IncorrectSource,
    IncorrectState,
    Configuring,
}

impl ResponseCode {
    pub fn as_i64(&self) -> i64 {
        match self {
            ResponseCode::Ok => 0,
            ResponseCode::UnsupportedCommand => 2,
            ResponseCode::IncorrectParameters => 3,
            ResponseCode::IncorrectSource => 4,
            ResponseCode::IncorrectState => 5,
            ResponseCode::Configuring => 6,
        }
    }
}

impl From<&LlcError> for ResponseCode {
    fn from(error: &LlcError) -> Self {
        match error {
            LlcError::InvalidState { .. } | LlcError::DrivesInError => {
                ResponseCode::IncorrectState
            }
            LlcError::Configuring => ResponseCode::Configuring,
            LlcError::PositionOutOfRange { .. } | LlcError::InvalidParameter { .. } => {
                ResponseCode::IncorrectParameters
            }
        }
    }
}

/// Connection-level protocol failures. These never corrupt subsystem state;
/// the offending line is discarded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message exceeds buffer size")]
    MessageTooLarge,
    #[error("reply serialization failed")]
    SerializationError,
}

/// Validation failures for a syntactically well-formed frame.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("unsupported command {name}")]
    UnsupportedCommand { name: String },
    #[error("incorrect parameters: {reason}")]
    IncorrectParameters { reason: String },
}

impl From<&DecodeError> for ResponseCode {
    fn from(error: &DecodeError) -> Self {
        match error {
            DecodeError::UnsupportedCommand { .. } => ResponseCode::UnsupportedCommand,
            DecodeError::IncorrectParameters { .. } => ResponseCode::IncorrectParameters,
        }
    }
}

/// A raw inbound frame before command validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandFrame {
    pub command: String,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(rename = "commandId", default)]
    pub command_id: Option<u64>,
}

/// Parse one line into a raw frame.
pub fn parse_frame(line: &str) -> Result<CommandFrame, ProtocolError> {
    if line.len() > MAX_COMMAND_SIZE {
        return Err(ProtocolError::MessageTooLarge);
    }
    Ok(serde_json::from_str(line)?)
}

/// Best-effort recovery of the commandId from a line that failed to parse,
/// so the error reply can still be correlated.
pub fn recover_command_id(line: &str) -> Option<u64> {
    let start = line.find("\"commandId\"")? + "\"commandId\"".len();
    let rest = line[start..].trim_start().strip_prefix(':')?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Operating regime selecting the command priority table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerManagementMode {
    Operations,
    Maintenance,
    Emergency,
    NoPowerManagement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveAzParams {
    pub azimuth: f64,
    #[serde(rename = "azRate")]
    pub az_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlAzParams {
    #[serde(rename = "azRate")]
    pub az_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveElParams {
    pub elevation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlElParams {
    #[serde(rename = "elRate")]
    pub el_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetDrivesParams {
    pub reset: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetLouversParams {
    pub position: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetTemperatureParams {
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnOffParams {
    pub action: OnOff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigParams {
    pub system: LlcName,
    pub settings: Vec<ConfigSetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPowerManagementModeParams {
    pub mode: PowerManagementMode,
}

/// Closed enumeration of command kinds; the name table below is the single
/// source of truth for the wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    MoveAz,
    CrawlAz,
    StopAz,
    Park,
    SetZeroAz,
    ResetDrivesAz,
    GoStationaryAz,
    SetNormalAz,
    SetDegradedAz,
    ExitFaultAz,
    Inflate,
    MoveEl,
    CrawlEl,
    StopEl,
    GoStationaryEl,
    SetNormalEl,
    SetDegradedEl,
    ExitFaultEl,
    OpenShutter,
    CloseShutter,
    StopShutter,
    Home,
    ResetDrivesShutter,
    GoStationaryShutter,
    SetNormalShutter,
    SetDegradedShutter,
    ExitFaultShutter,
    SetLouvers,
    CloseLouvers,
    StopLouvers,
    GoStationaryLouvers,
    SetNormalLouvers,
    SetDegradedLouvers,
    ExitFaultLouvers,
    SetTemperature,
    Fans,
    SetNormalThermal,
    SetDegradedThermal,
    ExitFaultThermal,
    SetNormalMonitoring,
    SetDegradedMonitoring,
    ExitFaultMonitoring,
    Restore,
    Config,
    SetPowerManagementMode,
    StatusAmcs,
    StatusApscs,
    StatusCbcs,
    StatusLcs,
    StatusLwscs,
    StatusMoncs,
    StatusThcs,
}

const COMMAND_NAMES: &[(&str, CommandKind)] = &[
    ("moveAz", CommandKind::MoveAz),
    ("crawlAz", CommandKind::CrawlAz),
    ("stopAz", CommandKind::StopAz),
    ("park", CommandKind::Park),
    ("setZeroAz", CommandKind::SetZeroAz),
    ("resetDrivesAz", CommandKind::ResetDrivesAz),
    ("goStationaryAz", CommandKind::GoStationaryAz),
    ("setNormalAz", CommandKind::SetNormalAz),
    ("setDegradedAz", CommandKind::SetDegradedAz),
    ("exitFaultAz", CommandKind::ExitFaultAz),
    ("inflate", CommandKind::Inflate),
    ("moveEl", CommandKind::MoveEl),
    ("crawlEl", CommandKind::CrawlEl),
    ("stopEl", CommandKind::StopEl),
    ("goStationaryEl", CommandKind::GoStationaryEl),
    ("setNormalEl", CommandKind::SetNormalEl),
    ("setDegradedEl", CommandKind::SetDegradedEl),
    ("exitFaultEl", CommandKind::ExitFaultEl),
    ("openShutter", CommandKind::OpenShutter),
    ("closeShutter", CommandKind::CloseShutter),
    ("stopShutter", CommandKind::StopShutter),
    ("home", CommandKind::Home),
    ("resetDrivesShutter", CommandKind::ResetDrivesShutter),
    ("goStationaryShutter", CommandKind::GoStationaryShutter),
    ("setNormalShutter", CommandKind::SetNormalShutter),
    ("setDegradedShutter", CommandKind::SetDegradedShutter),
    ("exitFaultShutter", CommandKind::ExitFaultShutter),
    ("setLouvers", CommandKind::SetLouvers),
    ("closeLouvers", CommandKind::CloseLouvers),
    ("stopLouvers", CommandKind::StopLouvers),
    ("goStationaryLouvers", CommandKind::GoStationaryLouvers),
    ("setNormalLouvers", CommandKind::SetNormalLouvers),
    ("setDegradedLouvers", CommandKind::SetDegradedLouvers),
    ("exitFaultLouvers", CommandKind::ExitFaultLouvers),
    ("setTemperature", CommandKind::SetTemperature),
    ("fans", CommandKind::Fans),
    ("setNormalThermal", CommandKind::SetNormalThermal),
    ("setDegradedThermal", CommandKind::SetDegradedThermal),
    ("exitFaultThermal", CommandKind::ExitFaultThermal),
    ("setNormalMonitoring", CommandKind::SetNormalMonitoring),
    ("setDegradedMonitoring", CommandKind::SetDegradedMonitoring),
    ("exitFaultMonitoring", CommandKind::ExitFaultMonitoring),
    ("restore", CommandKind::Restore),
    ("config", CommandKind::Config),
    ("setPowerManagementMode", CommandKind::SetPowerManagementMode),
    ("statusAMCS", CommandKind::StatusAmcs),
    ("statusApSCS", CommandKind::StatusApscs),
    ("statusCBCS", CommandKind::StatusCbcs),
    ("statusLCS", CommandKind::StatusLcs),
    ("statusLWSCS", CommandKind::StatusLwscs),
    ("statusMonCS", CommandKind::StatusMoncs),
    ("statusThCS", CommandKind::StatusThcs),
];

impl CommandKind {
    pub fn from_name(name: &str) -> Option<Self> {
        COMMAND_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(&self) -> &'static str {
        COMMAND_NAMES
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// The subsystem a status command addresses, if it is one.
    pub fn status_llc(&self) -> Option<LlcName> {
        match self {
            CommandKind::StatusAmcs => Some(LlcName::Amcs),
            CommandKind::StatusApscs => Some(LlcName::Apscs),
            CommandKind::StatusCbcs => Some(LlcName::Cbcs),
            CommandKind::StatusLcs => Some(LlcName::Lcs),
            CommandKind::StatusLwscs => Some(LlcName::Lwscs),
            CommandKind::StatusMoncs => Some(LlcName::Moncs),
            CommandKind::StatusThcs => Some(LlcName::Thcs),
            _ => None,
        }
    }

    pub fn is_status(&self) -> bool {
        self.status_llc().is_some()
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated command with its typed parameters.
#[derive(Debug, Clone)]
pub enum Command {
    MoveAz(MoveAzParams),
    CrawlAz(CrawlAzParams),
    StopAz,
    Park,
    SetZeroAz,
    ResetDrivesAz(ResetDrivesParams),
    GoStationaryAz,
    SetNormalAz,
    SetDegradedAz,
    ExitFaultAz,
    Inflate(OnOffParams),
    MoveEl(MoveElParams),
    CrawlEl(CrawlElParams),
    StopEl,
    GoStationaryEl,
    SetNormalEl,
    SetDegradedEl,
    ExitFaultEl,
    OpenShutter,
    CloseShutter,
    StopShutter,
    Home,
    ResetDrivesShutter(ResetDrivesParams),
    GoStationaryShutter,
    SetNormalShutter,
    SetDegradedShutter,
    ExitFaultShutter,
    SetLouvers(SetLouversParams),
    CloseLouvers,
    StopLouvers,
    GoStationaryLouvers,
    SetNormalLouvers,
    SetDegradedLouvers,
    ExitFaultLouvers,
    SetTemperature(SetTemperatureParams),
    Fans(OnOffParams),
    SetNormalThermal,
    SetDegradedThermal,
    ExitFaultThermal,
    SetNormalMonitoring,
    SetDegradedMonitoring,
    ExitFaultMonitoring,
    Restore,
    Config(ConfigParams),
    SetPowerManagementMode(SetPowerManagementModeParams),
    StatusAmcs,
    StatusApscs,
    StatusCbcs,
    StatusLcs,
    StatusLwscs,
    StatusMoncs,
    StatusThcs,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::MoveAz(_) => CommandKind::MoveAz,
            Command::CrawlAz(_) => CommandKind::CrawlAz,
            Command::StopAz => CommandKind::StopAz,
            Command::Park => CommandKind::Park,
            Command::SetZeroAz => CommandKind::SetZeroAz,
            Command::ResetDrivesAz(_) => CommandKind::ResetDrivesAz,
            Command::GoStationaryAz => CommandKind::GoStationaryAz,
            Command::SetNormalAz => CommandKind::SetNormalAz,
            Command::SetDegradedAz => CommandKind::SetDegradedAz,
            Command::ExitFaultAz => CommandKind::ExitFaultAz,
            Command::Inflate(_) => CommandKind::Inflate,
            Command::MoveEl(_) => CommandKind::MoveEl,
            Command::CrawlEl(_) => CommandKind::CrawlEl,
            Command::StopEl => CommandKind::StopEl,
            Command::GoStationaryEl => CommandKind::GoStationaryEl,
            Command::SetNormalEl => CommandKind::SetNormalEl,
            Command::SetDegradedEl => CommandKind::SetDegradedEl,
            Command::ExitFaultEl => CommandKind::ExitFaultEl,
            Command::OpenShutter => CommandKind::OpenShutter,
            Command::CloseShutter => CommandKind::CloseShutter,
            Command::StopShutter => CommandKind::StopShutter,
            Command::Home => CommandKind::Home,
            Command::ResetDrivesShutter(_) => CommandKind::ResetDrivesShutter,
            Command::GoStationaryShutter => CommandKind::GoStationaryShutter,
            Command::SetNormalShutter => CommandKind::SetNormalShutter,
            Command::SetDegradedShutter => CommandKind::SetDegradedShutter,
            Command::ExitFaultShutter => CommandKind::ExitFaultShutter,
            Command::SetLouvers(_) => CommandKind::SetLouvers,
            Command::CloseLouvers => CommandKind::CloseLouvers,
            Command::StopLouvers => CommandKind::StopLouvers,
            Command::GoStationaryLouvers => CommandKind::GoStationaryLouvers,
            Command::SetNormalLouvers => CommandKind::SetNormalLouvers,
            Command::SetDegradedLouvers => CommandKind::SetDegradedLouvers,
            Command::ExitFaultLouvers => CommandKind::ExitFaultLouvers,
            Command::SetTemperature(_) => CommandKind::SetTemperature,
            Command::Fans(_) => CommandKind::Fans,
            Command::SetNormalThermal => CommandKind::SetNormalThermal,
            Command::SetDegradedThermal => CommandKind::SetDegradedThermal,
            Command::ExitFaultThermal => CommandKind::ExitFaultThermal,
            Command::SetNormalMonitoring => CommandKind::SetNormalMonitoring,
            Command::SetDegradedMonitoring => CommandKind::SetDegradedMonitoring,
            Command::ExitFaultMonitoring => CommandKind::ExitFaultMonitoring,
            Command::Restore => CommandKind::Restore,
            Command::Config(_) => CommandKind::Config,
            Command::SetPowerManagementMode(_) => CommandKind::SetPowerManagementMode,
            Command::StatusAmcs => CommandKind::StatusAmcs,
            Command::StatusApscs => CommandKind::StatusApscs,
            Command::StatusCbcs => CommandKind::StatusCbcs,
            Command::StatusLcs => CommandKind::StatusLcs,
            Command::StatusLwscs => CommandKind::StatusLwscs,
            Command::StatusMoncs => CommandKind::StatusMoncs,
            Command::StatusThcs => CommandKind::StatusThcs,
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::IncorrectParameters {
        reason: e.to_string(),
    })
}

fn ensure_no_params(value: &Value) -> Result<(), DecodeError> {
    match value {
        Value::Object(map) if map.is_empty() => Ok(()),
        Value::Null => Ok(()),
        _ => Err(DecodeError::IncorrectParameters {
            reason: "command takes no parameters".to_string(),
        }),
    }
}

/// Validate a raw frame into a typed command.
pub fn decode_command(frame: &CommandFrame) -> Result<Command, DecodeError> {
    let kind =
        CommandKind::from_name(&frame.command).ok_or_else(|| DecodeError::UnsupportedCommand {
            name: frame.command.clone(),
        })?;
    let params = frame.parameters.clone().unwrap_or(json!({}));
    let command = match kind {
        CommandKind::MoveAz => Command::MoveAz(parse_params(params)?),
        CommandKind::CrawlAz => Command::CrawlAz(parse_params(params)?),
        CommandKind::ResetDrivesAz => Command::ResetDrivesAz(parse_params(params)?),
        CommandKind::Inflate => Command::Inflate(parse_params(params)?),
        CommandKind::MoveEl => Command::MoveEl(parse_params(params)?),
        CommandKind::CrawlEl => Command::CrawlEl(parse_params(params)?),
        CommandKind::ResetDrivesShutter => Command::ResetDrivesShutter(parse_params(params)?),
        CommandKind::SetLouvers => Command::SetLouvers(parse_params(params)?),
        CommandKind::SetTemperature => Command::SetTemperature(parse_params(params)?),
        CommandKind::Fans => Command::Fans(parse_params(params)?),
        CommandKind::Config => Command::Config(parse_params(params)?),
        CommandKind::SetPowerManagementMode => {
            Command::SetPowerManagementMode(parse_params(params)?)
        }
        zero_arg => {
            ensure_no_params(&params)?;
            match zero_arg {
                CommandKind::StopAz => Command::StopAz,
                CommandKind::Park => Command::Park,
                CommandKind::SetZeroAz => Command::SetZeroAz,
                CommandKind::GoStationaryAz => Command::GoStationaryAz,
                CommandKind::SetNormalAz => Command::SetNormalAz,
                CommandKind::SetDegradedAz => Command::SetDegradedAz,
                CommandKind::ExitFaultAz => Command::ExitFaultAz,
                CommandKind::StopEl => Command::StopEl,
                CommandKind::GoStationaryEl => Command::GoStationaryEl,
                CommandKind::SetNormalEl => Command::SetNormalEl,
                CommandKind::SetDegradedEl => Command::SetDegradedEl,
                CommandKind::ExitFaultEl => Command::ExitFaultEl,
                CommandKind::OpenShutter => Command::OpenShutter,
                CommandKind::CloseShutter => Command::CloseShutter,
                CommandKind::StopShutter => Command::StopShutter,
                CommandKind::Home => Command::Home,
                CommandKind::GoStationaryShutter => Command::GoStationaryShutter,
                CommandKind::SetNormalShutter => Command::SetNormalShutter,
                CommandKind::SetDegradedShutter => Command::SetDegradedShutter,
                CommandKind::ExitFaultShutter => Command::ExitFaultShutter,
                CommandKind::CloseLouvers => Command::CloseLouvers,
                CommandKind::StopLouvers => Command::StopLouvers,
                CommandKind::GoStationaryLouvers => Command::GoStationaryLouvers,
                CommandKind::SetNormalLouvers => Command::SetNormalLouvers,
                CommandKind::SetDegradedLouvers => Command::SetDegradedLouvers,
                CommandKind::ExitFaultLouvers => Command::ExitFaultLouvers,
                CommandKind::SetNormalThermal => Command::SetNormalThermal,
                CommandKind::SetDegradedThermal => Command::SetDegradedThermal,
                CommandKind::ExitFaultThermal => Command::ExitFaultThermal,
                CommandKind::SetNormalMonitoring => Command::SetNormalMonitoring,
                CommandKind::SetDegradedMonitoring => Command::SetDegradedMonitoring,
                CommandKind::ExitFaultMonitoring => Command::ExitFaultMonitoring,
                CommandKind::Restore => Command::Restore,
                CommandKind::StatusAmcs => Command::StatusAmcs,
                CommandKind::StatusApscs => Command::StatusApscs,
                CommandKind::StatusCbcs => Command::StatusCbcs,
                CommandKind::StatusLcs => Command::StatusLcs,
                CommandKind::StatusLwscs => Command::StatusLwscs,
                CommandKind::StatusMoncs => Command::StatusMoncs,
                CommandKind::StatusThcs => Command::StatusThcs,
                _ => unreachable!("parameterized kinds are handled above"),
            }
        }
    };
    Ok(command)
}

/// An outbound reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Command accepted; async completion expected within `timeout` seconds.
    Ack { command_id: u64, timeout: f64 },
    /// Command rejected.
    Error {
        command_id: u64,
        code: ResponseCode,
    },
    /// Status reply; carries the subsystem payload and no timeout field.
    Status {
        command_id: u64,
        llc: LlcName,
        payload: Value,
    },
}

impl Reply {
    pub fn to_json(&self) -> Value {
        match self {
            Reply::Ack {
                command_id,
                timeout,
            } => json!({
                "commandId": command_id,
                "response": ResponseCode::Ok.as_i64(),
                "timeout": timeout,
            }),
            Reply::Error { command_id, code } => json!({
                "commandId": command_id,
                "response": code.as_i64(),
                "timeout": -1.0,
            }),
            Reply::Status {
                command_id,
                llc,
                payload,
            } => {
                let mut map = serde_json::Map::new();
                map.insert("commandId".to_string(), json!(command_id));
                map.insert("response".to_string(), json!(ResponseCode::Ok.as_i64()));
                map.insert(llc.as_str().to_string(), payload.clone());
                Value::Object(map)
            }
        }
    }
}

/// Per-connection protocol bookkeeping: commandId synthesis and the
/// preallocated reply buffer.
#[derive(Debug)]
pub struct ProtocolHandler {
    synthesized_counter: u64,
    reply_buffer: ReplyBuffer,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            synthesized_counter: 0,
            reply_buffer: ArrayString::new(),
        }
    }

    /// The commandId for a frame: the client-assigned one, or a locally
    /// synthesized one for legacy clients that do not send it.
    pub fn assign_command_id(&mut self, frame_id: Option<u64>) -> u64 {
        match frame_id {
            Some(id) => id,
            None => {
                self.synthesized_counter = self.synthesized_counter.wrapping_add(1);
                self.synthesized_counter
            }
        }
    }

    /// Encode a reply as one CR+LF-terminated line.
    pub fn encode_reply(&mut self, reply: &Reply) -> Result<&str, ProtocolError> {
        self.reply_buffer.clear();
        let json =
            serde_json::to_string(&reply.to_json()).map_err(|_| ProtocolError::SerializationError)?;
        if json.len() + 2 > MAX_REPLY_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.reply_buffer.push_str(&json);
        self.reply_buffer.push_str("\r\n");
        Ok(&self.reply_buffer)
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}
