use bytes::Bytes;

use crate::error::DecodeError;

/// One TLV-encoded parameter: `(param_id: 1 byte, length: 1 byte, value)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvParam {
    pub id: u8,
    pub value: Bytes,
}

/// Parse the TLV parameter sequence filling `body`.
///
/// Encounter order is preserved. Parsing stops exactly at the body end; a
/// parameter declaring more bytes than remain is a structural error.
pub fn parse_params(body: &Bytes) -> Result<Vec<TlvParam>, DecodeError> {
    let mut params = Vec::new();
    let mut offset = 0usize;

    while offset < body.len() {
        let id = body[offset];
        let remaining = body.len() - offset - 1;
        if remaining == 0 {
            return Err(DecodeError::TruncatedParameter {
                param_id: id,
                declared: 0,
                remaining: 0,
            });
        }

        let declared = body[offset + 1] as usize;
        let remaining = remaining - 1;
        if declared > remaining {
            return Err(DecodeError::TruncatedParameter {
                param_id: id,
                declared,
                remaining,
            });
        }

        let start = offset + 2;
        params.push(TlvParam {
            id,
            value: body.slice(start..start + declared),
        });
        offset = start + declared;
    }

    Ok(params)
}
