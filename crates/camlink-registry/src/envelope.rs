use camlink_frame::MessageKind;

use crate::value::Value;

/// A fully decoded message: kind, identifier, status code, and typed values
/// in TLV encounter order.
///
/// Both channels produce this shape — wireless messages via the registry,
/// HTTP replies via normalization — so upstream code is transport-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEnvelope {
    pub kind: MessageKind,
    pub identifier: u8,
    pub status: u8,
    pub values: Vec<(u8, Value)>,
}

impl ParsedEnvelope {
    /// Whether the camera reported success for this message.
    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// First value recorded for `param_id`, if any.
    pub fn value_of(&self, param_id: u8) -> Option<&Value> {
        self.values
            .iter()
            .find(|(id, _)| *id == param_id)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> ParsedEnvelope {
        ParsedEnvelope {
            kind: MessageKind::StatusResponse,
            identifier: 0x13,
            status: 0,
            values: vec![
                (0x0A, Value::Bool(false)),
                (0x08, Value::Uint(2)),
                (0x0A, Value::Bool(true)),
            ],
        }
    }

    #[test]
    fn success_tracks_status_code() {
        assert!(envelope().is_success());
        let failed = ParsedEnvelope {
            status: 2,
            ..envelope()
        };
        assert!(!failed.is_success());
    }

    #[test]
    fn value_of_returns_first_occurrence() {
        assert_eq!(envelope().value_of(0x0A), Some(&Value::Bool(false)));
        assert_eq!(envelope().value_of(0x08), Some(&Value::Uint(2)));
        assert_eq!(envelope().value_of(0x55), None);
    }
}
