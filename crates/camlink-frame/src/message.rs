use crate::error::DecodeError;
use crate::packet::LogicalMessage;
use crate::tlv::{parse_params, TlvParam};

/// Asynchronous setting-value push.
pub const SETTING_VALUE_PUSH: u8 = 0x92;
/// Asynchronous status-value push.
pub const STATUS_VALUE_PUSH: u8 = 0x93;
/// Synchronous get-setting-values response.
pub const GET_SETTING_VALUES: u8 = 0x12;
/// Synchronous get-status-values response.
pub const GET_STATUS_VALUES: u8 = 0x13;
/// Register-for-setting-updates response (carries current values).
pub const REGISTER_SETTING_UPDATES: u8 = 0x52;
/// Register-for-status-updates response (carries current values).
pub const REGISTER_STATUS_UPDATES: u8 = 0x53;
/// Unregister-from-setting-updates response.
pub const UNREGISTER_SETTING_UPDATES: u8 = 0x72;
/// Unregister-from-status-updates response.
pub const UNREGISTER_STATUS_UPDATES: u8 = 0x73;

/// What a complete message is, as told by its identifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Synchronous reply to a plain command.
    QueryResponse,
    /// Unsolicited setting-value change notification.
    SettingPush,
    /// Unsolicited status-value change notification.
    StatusPush,
    /// Synchronous reply carrying setting values.
    SettingResponse,
    /// Synchronous reply carrying status values.
    StatusResponse,
}

impl MessageKind {
    /// Classify a message by its leading identifier byte.
    pub fn classify(identifier: u8) -> Self {
        match identifier {
            SETTING_VALUE_PUSH => MessageKind::SettingPush,
            STATUS_VALUE_PUSH => MessageKind::StatusPush,
            GET_SETTING_VALUES | REGISTER_SETTING_UPDATES | UNREGISTER_SETTING_UPDATES => {
                MessageKind::SettingResponse
            }
            GET_STATUS_VALUES | REGISTER_STATUS_UPDATES | UNREGISTER_STATUS_UPDATES => {
                MessageKind::StatusResponse
            }
            _ => MessageKind::QueryResponse,
        }
    }

    /// Whether this kind is an asynchronous push (vs a correlated response).
    pub fn is_push(self) -> bool {
        matches!(self, MessageKind::SettingPush | MessageKind::StatusPush)
    }
}

/// Structural parse of a complete message: kind, identifier, status code,
/// and raw TLV parameters. No registry involvement yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub kind: MessageKind,
    pub identifier: u8,
    pub status: u8,
    pub params: Vec<TlvParam>,
}

impl RawMessage {
    /// Parse a logical message body: `[identifier, status, TLV...]`.
    pub fn parse(message: &LogicalMessage) -> Result<Self, DecodeError> {
        let body = &message.body;
        let Some(&identifier) = body.first() else {
            return Err(DecodeError::EmptyMessage);
        };

        let status = body.get(1).copied().unwrap_or(0);
        let params = if body.len() > 2 {
            parse_params(&body.slice(2..))?
        } else {
            Vec::new()
        };

        Ok(Self {
            kind: MessageKind::classify(identifier),
            identifier,
            status,
            params,
        })
    }
}
