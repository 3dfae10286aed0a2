//! HTTP reply normalization.
//!
//! The HTTP channel speaks request/response natively; its replies are folded
//! into the same [`ParsedEnvelope`] shape the wireless channel produces so
//! upstream code never branches on transport.

use camlink_frame::MessageKind;
use camlink_registry::{ParsedEnvelope, Value};
use camlink_transport::{HttpBody, HttpReply, TransportError};

/// Parameter slot the (single) HTTP body value is recorded under.
pub const HTTP_BODY_PARAM: u8 = 0;

/// Normalize an HTTP reply into an envelope for `identifier`.
///
/// A 2xx reply becomes a successful `QueryResponse` whose body (if any) is
/// the envelope's single value; any other status is a transport error.
pub(crate) fn normalize_reply(
    identifier: u8,
    reply: HttpReply,
) -> Result<ParsedEnvelope, TransportError> {
    if !reply.is_ok() {
        return Err(TransportError::Http {
            status: reply.status,
        });
    }

    let values = match reply.body {
        HttpBody::Json(json) => vec![(HTTP_BODY_PARAM, Value::Json(json))],
        HttpBody::Binary(bytes) => vec![(HTTP_BODY_PARAM, Value::Bytes(bytes))],
        HttpBody::Empty => Vec::new(),
    };

    Ok(ParsedEnvelope {
        kind: MessageKind::QueryResponse,
        identifier,
        status: 0,
        values,
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn json_body_becomes_single_json_value() {
        let reply = HttpReply {
            status: 200,
            body: HttpBody::Json(serde_json::json!({"model": "X-100"})),
        };
        let envelope = normalize_reply(0x3C, reply).unwrap();

        assert_eq!(envelope.kind, MessageKind::QueryResponse);
        assert_eq!(envelope.identifier, 0x3C);
        assert!(envelope.is_success());
        assert_eq!(
            envelope.value_of(HTTP_BODY_PARAM),
            Some(&Value::Json(serde_json::json!({"model": "X-100"})))
        );
    }

    #[test]
    fn binary_body_becomes_bytes_value() {
        let reply = HttpReply {
            status: 204,
            body: HttpBody::Binary(Bytes::from_static(&[0xDE, 0xAD])),
        };
        let envelope = normalize_reply(0x01, reply).unwrap();
        assert_eq!(
            envelope.value_of(HTTP_BODY_PARAM),
            Some(&Value::Bytes(Bytes::from_static(&[0xDE, 0xAD])))
        );
    }

    #[test]
    fn empty_body_yields_no_values() {
        let reply = HttpReply {
            status: 200,
            body: HttpBody::Empty,
        };
        let envelope = normalize_reply(0x01, reply).unwrap();
        assert!(envelope.values.is_empty());
    }

    #[test]
    fn error_status_is_a_transport_error() {
        let reply = HttpReply {
            status: 403,
            body: HttpBody::Empty,
        };
        let err = normalize_reply(0x01, reply).unwrap_err();
        assert!(matches!(err, TransportError::Http { status: 403 }));
    }
}
