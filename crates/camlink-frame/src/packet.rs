use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::FramingError;

/// Continuation flag: the fragment extends the message in progress.
pub const CONTINUATION_FLAG: u8 = 0x80;

/// Bits 6-5 of a start header select the length encoding.
const HEADER_KIND_MASK: u8 = 0x60;
const HEADER_GENERAL: u8 = 0x00;
const HEADER_EXT13: u8 = 0x20;
const HEADER_EXT16: u8 = 0x40;

/// Low bits of the general/extended-13 start byte.
const GENERAL_LEN_MASK: u8 = 0x1F;

/// Largest body length encodable in a 1-byte general header.
pub const MAX_GENERAL_LEN: usize = GENERAL_LEN_MASK as usize;

/// Largest body length encodable in the extended-13 header.
pub const MAX_EXT13_LEN: usize = 0x1FFF;

/// Largest body length encodable at all (extended-16 header).
pub const MAX_MESSAGE_LEN: usize = 0xFFFF;

/// Default fragment size for MTU-limited wireless links.
pub const DEFAULT_MTU: usize = 20;

/// A complete, length-validated protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalMessage {
    /// Body bytes, exactly as declared by the (consumed) header.
    pub body: Bytes,
}

struct PendingMessage {
    declared: usize,
    buf: BytesMut,
}

/// Accumulates transport fragments into complete logical messages.
///
/// One reassembler per channel; at most one message is pending at a time.
/// A start fragment while a message is pending discards the stale buffer
/// (logged, not fatal) and begins the new message.
#[derive(Default)]
pub struct Reassembler {
    pending: Option<PendingMessage>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Consume one fragment; returns a complete message once fully assembled.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Option<LogicalMessage>, FramingError> {
        let Some(&first) = fragment.first() else {
            return Ok(None);
        };

        if first & CONTINUATION_FLAG != 0 {
            return self.feed_continuation(&fragment[1..]);
        }

        if let Some(stale) = self.pending.take() {
            warn!(
                declared = stale.declared,
                accumulated = stale.buf.len(),
                "dropping incomplete message: new header while reassembling"
            );
        }

        let (declared, header_len) = decode_header(fragment)?;
        let body = &fragment[header_len..];
        self.accumulate(declared, BytesMut::with_capacity(declared), body)
    }

    /// Discard any in-progress message (used when the link resets).
    pub fn reset(&mut self) {
        self.pending = None;
    }

    fn feed_continuation(
        &mut self,
        body: &[u8],
    ) -> Result<Option<LogicalMessage>, FramingError> {
        let Some(pending) = self.pending.take() else {
            return Err(FramingError::UnexpectedContinuation);
        };
        self.accumulate(pending.declared, pending.buf, body)
    }

    fn accumulate(
        &mut self,
        declared: usize,
        mut buf: BytesMut,
        body: &[u8],
    ) -> Result<Option<LogicalMessage>, FramingError> {
        buf.extend_from_slice(body);
        if buf.len() > declared {
            return Err(FramingError::Overflow {
                declared,
                accumulated: buf.len(),
            });
        }
        if buf.len() == declared {
            return Ok(Some(LogicalMessage { body: buf.freeze() }));
        }
        self.pending = Some(PendingMessage { declared, buf });
        Ok(None)
    }
}

/// Decode a start-fragment header.
///
/// Returns the declared body length and the header size in bytes.
fn decode_header(fragment: &[u8]) -> Result<(usize, usize), FramingError> {
    let first = fragment[0];
    match first & HEADER_KIND_MASK {
        HEADER_GENERAL => Ok(((first & GENERAL_LEN_MASK) as usize, 1)),
        HEADER_EXT13 => {
            let &ext = fragment.get(1).ok_or(FramingError::TruncatedHeader)?;
            let declared = (((first & GENERAL_LEN_MASK) as usize) << 8) | ext as usize;
            Ok((declared, 2))
        }
        HEADER_EXT16 => {
            if fragment.len() < 3 {
                return Err(FramingError::TruncatedHeader);
            }
            let declared = ((fragment[1] as usize) << 8) | fragment[2] as usize;
            Ok((declared, 3))
        }
        _ => Err(FramingError::ReservedHeader),
    }
}

fn encode_header(len: usize, dst: &mut BytesMut) -> Result<(), FramingError> {
    if len <= MAX_GENERAL_LEN {
        dst.put_u8(len as u8);
    } else if len <= MAX_EXT13_LEN {
        dst.put_u8(HEADER_EXT13 | (len >> 8) as u8);
        dst.put_u8((len & 0xFF) as u8);
    } else if len <= MAX_MESSAGE_LEN {
        dst.put_u8(HEADER_EXT16);
        dst.put_u8((len >> 8) as u8);
        dst.put_u8((len & 0xFF) as u8);
    } else {
        return Err(FramingError::PayloadTooLarge {
            size: len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(())
}

/// Split an outgoing message body into MTU-sized fragments.
///
/// The first fragment carries the length header; each following fragment
/// starts with the continuation byte.
pub fn fragment_message(body: &[u8], mtu: usize) -> Result<Vec<Bytes>, FramingError> {
    debug_assert!(mtu >= 4, "mtu too small to carry any header and data");

    let mut header = BytesMut::with_capacity(3);
    encode_header(body.len(), &mut header)?;

    let mut fragments = Vec::new();
    let first_data = body.len().min(mtu - header.len());
    header.extend_from_slice(&body[..first_data]);
    fragments.push(header.freeze());

    let mut offset = first_data;
    while offset < body.len() {
        let take = (body.len() - offset).min(mtu - 1);
        let mut fragment = BytesMut::with_capacity(take + 1);
        fragment.put_u8(CONTINUATION_FLAG);
        fragment.extend_from_slice(&body[offset..offset + take]);
        fragments.push(fragment.freeze());
        offset += take;
    }

    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_fragment_message() {
        let mut reassembler = Reassembler::new();
        let message = reassembler
            .feed(&[0x05, 0x93, 0x00, 0x0A, 0x01, 0x00])
            .unwrap()
            .unwrap();
        assert_eq!(message.body.as_ref(), &[0x93, 0x00, 0x0A, 0x01, 0x00]);
    }

    #[test]
    fn empty_fragment_is_ignored() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler.feed(&[]).unwrap().is_none());
    }

    #[test]
    fn zero_length_message() {
        let mut reassembler = Reassembler::new();
        let message = reassembler.feed(&[0x00]).unwrap().unwrap();
        assert!(message.body.is_empty());
    }

    #[test]
    fn multi_fragment_body_concatenates_in_arrival_order() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler.feed(&[0x06, 0x13, 0x00]).unwrap().is_none());
        assert!(reassembler
            .feed(&[CONTINUATION_FLAG, 0x0A, 0x01])
            .unwrap()
            .is_none());
        let message = reassembler
            .feed(&[CONTINUATION_FLAG, 0x00, 0x01])
            .unwrap()
            .unwrap();
        assert_eq!(message.body.as_ref(), &[0x13, 0x00, 0x0A, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn ext13_header_roundtrip() {
        let body = vec![0xCD; 300];
        let fragments = fragment_message(&body, DEFAULT_MTU).unwrap();
        assert_eq!(fragments[0][0], HEADER_EXT13 | 0x01);
        assert_eq!(fragments[0][1], 0x2C);

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for fragment in &fragments {
            result = reassembler.feed(fragment).unwrap();
        }
        assert_eq!(result.unwrap().body.as_ref(), body.as_slice());
    }

    #[test]
    fn ext16_header_roundtrip() {
        let body = vec![0xEE; 9000];
        let fragments = fragment_message(&body, 182).unwrap();
        assert_eq!(fragments[0][0], HEADER_EXT16);
        assert_eq!(fragments[0][1], 0x23);
        assert_eq!(fragments[0][2], 0x28);

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for fragment in &fragments {
            result = reassembler.feed(fragment).unwrap();
        }
        assert_eq!(result.unwrap().body.as_ref(), body.as_slice());
    }

    #[test]
    fn continuation_without_pending_is_an_error() {
        let mut reassembler = Reassembler::new();
        let err = reassembler.feed(&[CONTINUATION_FLAG, 0x01]).unwrap_err();
        assert!(matches!(err, FramingError::UnexpectedContinuation));
    }

    #[test]
    fn overflow_is_an_error() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler.feed(&[0x02, 0xAA]).unwrap().is_none());
        let err = reassembler
            .feed(&[CONTINUATION_FLAG, 0xBB, 0xCC])
            .unwrap_err();
        assert!(matches!(
            err,
            FramingError::Overflow {
                declared: 2,
                accumulated: 3
            }
        ));
    }

    #[test]
    fn oversized_single_fragment_is_an_error() {
        let mut reassembler = Reassembler::new();
        let err = reassembler.feed(&[0x01, 0xAA, 0xBB]).unwrap_err();
        assert!(matches!(err, FramingError::Overflow { .. }));
    }

    #[test]
    fn new_header_discards_stale_message() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler.feed(&[0x04, 0x01, 0x02]).unwrap().is_none());

        // Fresh start: the half-built message above is dropped, not merged.
        let message = reassembler.feed(&[0x02, 0xAA, 0xBB]).unwrap().unwrap();
        assert_eq!(message.body.as_ref(), &[0xAA, 0xBB]);

        // The old message is really gone: its continuation now errors.
        let err = reassembler.feed(&[CONTINUATION_FLAG, 0x03]).unwrap_err();
        assert!(matches!(err, FramingError::UnexpectedContinuation));
    }

    #[test]
    fn reserved_header_rejected() {
        let mut reassembler = Reassembler::new();
        let err = reassembler.feed(&[0x60, 0x00]).unwrap_err();
        assert!(matches!(err, FramingError::ReservedHeader));
    }

    #[test]
    fn truncated_extended_headers_rejected() {
        let mut reassembler = Reassembler::new();
        assert!(matches!(
            reassembler.feed(&[HEADER_EXT13]).unwrap_err(),
            FramingError::TruncatedHeader
        ));
        assert!(matches!(
            reassembler.feed(&[HEADER_EXT16, 0x01]).unwrap_err(),
            FramingError::TruncatedHeader
        ));
    }

    #[test]
    fn reset_discards_pending() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler.feed(&[0x04, 0x01]).unwrap().is_none());
        reassembler.reset();
        let err = reassembler.feed(&[CONTINUATION_FLAG, 0x02]).unwrap_err();
        assert!(matches!(err, FramingError::UnexpectedContinuation));
    }

    #[test]
    fn fragments_respect_mtu() {
        let body = vec![0x11; 100];
        let fragments = fragment_message(&body, DEFAULT_MTU).unwrap();
        assert!(fragments.iter().all(|f| f.len() <= DEFAULT_MTU));
        assert!(fragments[1..]
            .iter()
            .all(|f| f[0] == CONTINUATION_FLAG));

        let carried: usize = fragments[0].len() - 2
            + fragments[1..].iter().map(|f| f.len() - 1).sum::<usize>();
        assert_eq!(carried, body.len());
    }

    #[test]
    fn oversized_outgoing_body_rejected() {
        let body = vec![0x00; MAX_MESSAGE_LEN + 1];
        assert!(matches!(
            fragment_message(&body, DEFAULT_MTU),
            Err(FramingError::PayloadTooLarge { .. })
        ));
    }
}
