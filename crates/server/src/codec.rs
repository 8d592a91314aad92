//! Wire framing and request/response codec
//!
//! Ingress: a stream of frames, each a 32-bit little-endian length `L`
//! (`1 <= L <= max_message_len`) followed by `L` payload bytes. A length
//! outside range is a [`FrameError::BadMessageLength`]; the decoder resets
//! and the caller surfaces a 400 response.
//!
//! Egress: a 32-bit big-endian status code, a 32-byte NUL-padded ASCII
//! status text, then an operation-specific payload.
//!
//! The request payload is opaque to the framing layer; [`decode_request`]
//! interprets it for the dispatcher. Responses carry a one-byte result tag
//! ahead of the operation data so book-level rejections ride inside a 200.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use common::{OrderId, OrderType, Price, Quantity, Side};
use orderbook::{AddResult, LevelView, ModifyRequest};
use thiserror::Error;

/// Bytes in the frame length prefix
pub const LEN_PREFIX_LEN: usize = 4;

/// Bytes in the response status text field
pub const STATUS_TEXT_LEN: usize = 32;

/// Response status codes defined by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCode {
    /// Request processed (book-level rejections ride in the payload tag)
    Success = 200,
    /// Frame length prefix outside the accepted range
    BadMessageLength = 400,
    /// Undecodable request or unexpected I/O failure
    SystemError = 500,
}

impl StatusCode {
    /// Canonical status text, NUL-padded into the response header
    pub fn text(&self) -> &'static str {
        match self {
            StatusCode::Success => "Success",
            StatusCode::BadMessageLength => "BadMessageLength",
            StatusCode::SystemError => "SystemError",
        }
    }
}

/// Framing-level errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Length prefix outside `[1, max]`
    #[error("bad message length {len}, accepted range is [1, {max}]")]
    BadMessageLength { len: usize, max: usize },
}

/// Incremental frame decoder for one connection.
///
/// Feed bytes into a `BytesMut` and call [`FrameDecoder::decode`] until it
/// returns `Ok(None)`. A bad length clears the buffer (parser reset) before
/// the error is returned, so the connection can keep going.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_message_len: usize,
}

impl FrameDecoder {
    pub fn new(max_message_len: usize) -> Self {
        Self { max_message_len }
    }

    /// Extract the next complete frame, if one is buffered
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if buf.len() < LEN_PREFIX_LEN {
            return Ok(None);
        }

        let len = u32::from_le_bytes(buf[..LEN_PREFIX_LEN].try_into().expect("prefix length"))
            as usize;
        if len == 0 || len > self.max_message_len {
            buf.clear();
            return Err(FrameError::BadMessageLength {
                len,
                max: self.max_message_len,
            });
        }

        if buf.len() < LEN_PREFIX_LEN + len {
            return Ok(None);
        }

        buf.advance(LEN_PREFIX_LEN);
        Ok(Some(buf.split_to(len).freeze()))
    }
}

/// Prefix a request payload with its length, producing one wire frame
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(LEN_PREFIX_LEN + payload.len());
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(payload);
    frame.freeze()
}

// Request opcodes
const OP_ADD: u8 = 1;
const OP_CANCEL: u8 = 2;
const OP_MODIFY: u8 = 3;
const OP_BEST: u8 = 4;
const OP_DEPTH: u8 = 5;

// Presence bits for modify requests
const MODIFY_PRICE: u8 = 1;
const MODIFY_QUANTITY: u8 = 1 << 1;
const MODIFY_TYPE: u8 = 1 << 2;
const MODIFY_SIDE: u8 = 1 << 3;

/// Result tags carried as the first payload byte of every 200 response
pub mod result_tag {
    /// Operation succeeded
    pub const OK: u8 = 0;
    /// Order id not resting on the book
    pub const UNKNOWN_ORDER: u8 = 1;
    /// Quantity was zero
    pub const INVALID_QUANTITY: u8 = 2;
    /// Order failed its admission pre-check; no id was allocated
    pub const NOT_ADMITTED: u8 = 3;
}

/// A decoded client request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// Submit a new order
    Add {
        side: Side,
        order_type: OrderType,
        price: Price,
        quantity: Quantity,
    },
    /// Cancel a resting order
    Cancel { order_id: OrderId },
    /// Replace a resting order
    Modify {
        order_id: OrderId,
        changes: ModifyRequest,
    },
    /// Best price on one side
    Best { side: Side },
    /// Full depth of one side
    Depth { side: Side },
}

/// Request decode errors; all of them close the connection with a 500
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty request payload")]
    Empty,

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("unknown side {0}")]
    UnknownSide(u8),

    #[error("unknown order type {0}")]
    UnknownOrderType(u8),

    #[error("request truncated")]
    Truncated,

    #[error("{0} trailing bytes after request")]
    TrailingBytes(usize),
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn i32_le(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(
            self.take(4)?.try_into().expect("4 bytes"),
        ))
    }

    fn u32_le(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(
            self.take(4)?.try_into().expect("4 bytes"),
        ))
    }

    fn u64_le(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(
            self.take(8)?.try_into().expect("8 bytes"),
        ))
    }

    fn finish(self) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.buf.len()))
        }
    }
}

fn side_from_byte(byte: u8) -> Result<Side, CodecError> {
    match byte {
        0 => Ok(Side::Buy),
        1 => Ok(Side::Sell),
        other => Err(CodecError::UnknownSide(other)),
    }
}

fn side_to_byte(side: Side) -> u8 {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

fn order_type_from_byte(byte: u8) -> Result<OrderType, CodecError> {
    match byte {
        0 => Ok(OrderType::Market),
        1 => Ok(OrderType::GoodTillCancel),
        2 => Ok(OrderType::GoodTillEod),
        3 => Ok(OrderType::FillOrKill),
        4 => Ok(OrderType::FillAndKill),
        other => Err(CodecError::UnknownOrderType(other)),
    }
}

fn order_type_to_byte(order_type: OrderType) -> u8 {
    match order_type {
        OrderType::Market => 0,
        OrderType::GoodTillCancel => 1,
        OrderType::GoodTillEod => 2,
        OrderType::FillOrKill => 3,
        OrderType::FillAndKill => 4,
    }
}

/// Decode one request payload (the bytes inside a frame)
pub fn decode_request(payload: &[u8]) -> Result<Request, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut reader = Reader::new(payload);
    let opcode = reader.u8()?;

    let request = match opcode {
        OP_ADD => {
            let side = side_from_byte(reader.u8()?)?;
            let order_type = order_type_from_byte(reader.u8()?)?;
            let price = reader.i32_le()?;
            let quantity = reader.u32_le()?;
            Request::Add {
                side,
                order_type,
                price,
                quantity,
            }
        }
        OP_CANCEL => Request::Cancel {
            order_id: reader.u64_le()?,
        },
        OP_MODIFY => {
            let order_id = reader.u64_le()?;
            let present = reader.u8()?;
            let mut changes = ModifyRequest::default();
            if present & MODIFY_PRICE != 0 {
                changes.price = Some(reader.i32_le()?);
            }
            if present & MODIFY_QUANTITY != 0 {
                changes.quantity = Some(reader.u32_le()?);
            }
            if present & MODIFY_TYPE != 0 {
                changes.order_type = Some(order_type_from_byte(reader.u8()?)?);
            }
            if present & MODIFY_SIDE != 0 {
                changes.side = Some(side_from_byte(reader.u8()?)?);
            }
            Request::Modify { order_id, changes }
        }
        OP_BEST => Request::Best {
            side: side_from_byte(reader.u8()?)?,
        },
        OP_DEPTH => Request::Depth {
            side: side_from_byte(reader.u8()?)?,
        },
        other => return Err(CodecError::UnknownOpcode(other)),
    };

    reader.finish()?;
    Ok(request)
}

/// Encode a request payload (the bytes inside a frame)
pub fn encode_request(request: &Request) -> Bytes {
    let mut buf = BytesMut::new();
    match *request {
        Request::Add {
            side,
            order_type,
            price,
            quantity,
        } => {
            buf.put_u8(OP_ADD);
            buf.put_u8(side_to_byte(side));
            buf.put_u8(order_type_to_byte(order_type));
            buf.put_i32_le(price);
            buf.put_u32_le(quantity);
        }
        Request::Cancel { order_id } => {
            buf.put_u8(OP_CANCEL);
            buf.put_u64_le(order_id);
        }
        Request::Modify { order_id, changes } => {
            buf.put_u8(OP_MODIFY);
            buf.put_u64_le(order_id);
            let mut present = 0;
            if changes.price.is_some() {
                present |= MODIFY_PRICE;
            }
            if changes.quantity.is_some() {
                present |= MODIFY_QUANTITY;
            }
            if changes.order_type.is_some() {
                present |= MODIFY_TYPE;
            }
            if changes.side.is_some() {
                present |= MODIFY_SIDE;
            }
            buf.put_u8(present);
            if let Some(price) = changes.price {
                buf.put_i32_le(price);
            }
            if let Some(quantity) = changes.quantity {
                buf.put_u32_le(quantity);
            }
            if let Some(order_type) = changes.order_type {
                buf.put_u8(order_type_to_byte(order_type));
            }
            if let Some(side) = changes.side {
                buf.put_u8(side_to_byte(side));
            }
        }
        Request::Best { side } => {
            buf.put_u8(OP_BEST);
            buf.put_u8(side_to_byte(side));
        }
        Request::Depth { side } => {
            buf.put_u8(OP_DEPTH);
            buf.put_u8(side_to_byte(side));
        }
    }
    buf.freeze()
}

/// Encode a full response: status header plus payload
pub fn encode_response(status: StatusCode, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + STATUS_TEXT_LEN + payload.len());
    buf.put_u32(status as u32);

    let text = status.text().as_bytes();
    debug_assert!(text.len() <= STATUS_TEXT_LEN);
    buf.put_slice(text);
    buf.put_bytes(0, STATUS_TEXT_LEN - text.len());

    buf.put_slice(payload);
    buf.freeze()
}

/// Payload for add/modify responses: the result tag, the assigned id (or
/// the not-admitted tag and nothing else), and the executed trades
pub fn encode_add_payload(result: &AddResult) -> Bytes {
    let mut buf = BytesMut::new();
    let Some(order_id) = result.order_id else {
        buf.put_u8(result_tag::NOT_ADMITTED);
        return buf.freeze();
    };

    buf.put_u8(result_tag::OK);
    buf.put_u64_le(order_id);
    buf.put_u32_le(result.trades.len() as u32);
    for trade in &result.trades {
        buf.put_u64_le(trade.maker_order_id);
        buf.put_u64_le(trade.taker_order_id);
        buf.put_u32_le(trade.quantity);
        buf.put_i32_le(trade.price);
    }
    buf.freeze()
}

/// Payload carrying only a result tag (cancel acks, book-level rejections)
pub fn encode_tag_payload(tag: u8) -> Bytes {
    Bytes::copy_from_slice(&[tag])
}

/// Payload for best-price responses
pub fn encode_best_payload(price: Option<Price>) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(result_tag::OK);
    match price {
        Some(price) => {
            buf.put_u8(1);
            buf.put_i32_le(price);
        }
        None => buf.put_u8(0),
    }
    buf.freeze()
}

/// Payload for depth responses
pub fn encode_depth_payload(levels: &[LevelView]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(result_tag::OK);
    buf.put_u32_le(levels.len() as u32);
    for level in levels {
        buf.put_i32_le(level.price);
        buf.put_u64_le(level.volume);
        buf.put_u32_le(level.order_count);
    }
    buf.freeze()
}

/// A parsed response, the client-side mirror of [`encode_response`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Numeric status code
    pub code: u32,
    /// Status text with the NUL padding stripped
    pub text: String,
    /// Operation-specific payload
    pub payload: Bytes,
}

/// Split one response off the front of a client's receive buffer.
///
/// Returns `None` until the header is complete. The payload is everything
/// the caller says belongs to this response, so `payload_len` must come from
/// the operation the client issued.
pub fn decode_response(buf: &mut BytesMut, payload_len: usize) -> Option<Response> {
    let header_len = 4 + STATUS_TEXT_LEN;
    if buf.len() < header_len + payload_len {
        return None;
    }

    let code = u32::from_be_bytes(buf[..4].try_into().expect("4 bytes"));
    let text = buf[4..header_len]
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    buf.advance(header_len);
    let payload = buf.split_to(payload_len).freeze();

    Some(Response {
        code,
        text,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> FrameDecoder {
        FrameDecoder::new(4096)
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let decoder = decoder();
        let mut buf = BytesMut::new();

        // Partial prefix
        buf.put_slice(&[3, 0]);
        assert_eq!(decoder.decode(&mut buf), Ok(None));

        // Complete prefix, partial payload
        buf.put_slice(&[0, 0, b'a']);
        assert_eq!(decoder.decode(&mut buf), Ok(None));

        // Payload completes
        buf.put_slice(b"bc");
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"abc");
        assert_eq!(decoder.decode(&mut buf), Ok(None));
    }

    #[test]
    fn test_decode_two_frames_from_one_read() {
        let decoder = decoder();
        let mut buf = BytesMut::new();
        buf.put_slice(&encode_frame(b"one"));
        buf.put_slice(&encode_frame(b"two"));

        assert_eq!(&decoder.decode(&mut buf).unwrap().unwrap()[..], b"one");
        assert_eq!(&decoder.decode(&mut buf).unwrap().unwrap()[..], b"two");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_zero_length_rejected_and_parser_reset() {
        let decoder = decoder();
        let mut buf = BytesMut::new();
        buf.put_u32_le(0);
        buf.put_slice(b"junk");

        assert_eq!(
            decoder.decode(&mut buf),
            Err(FrameError::BadMessageLength { len: 0, max: 4096 })
        );
        assert!(buf.is_empty(), "parser reset clears the buffer");
    }

    #[test]
    fn test_oversize_length_rejected() {
        let decoder = decoder();
        let mut buf = BytesMut::new();
        buf.put_u32_le(4097);

        assert_eq!(
            decoder.decode(&mut buf),
            Err(FrameError::BadMessageLength {
                len: 4097,
                max: 4096
            })
        );
    }

    #[test]
    fn test_max_length_frame_accepted() {
        let decoder = decoder();
        let payload = vec![7u8; 4096];
        let mut buf = BytesMut::from(&encode_frame(&payload)[..]);

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.len(), 4096);
    }

    #[test]
    fn test_request_round_trips() {
        let requests = [
            Request::Add {
                side: Side::Buy,
                order_type: OrderType::GoodTillCancel,
                price: -5,
                quantity: 42,
            },
            Request::Cancel { order_id: 7 },
            Request::Modify {
                order_id: 9,
                changes: ModifyRequest {
                    price: Some(250),
                    quantity: None,
                    order_type: Some(OrderType::FillOrKill),
                    side: None,
                },
            },
            Request::Best { side: Side::Sell },
            Request::Depth { side: Side::Buy },
        ];

        for request in requests {
            let encoded = encode_request(&request);
            assert_eq!(decode_request(&encoded), Ok(request));
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_request(&[]), Err(CodecError::Empty));
        assert_eq!(decode_request(&[99]), Err(CodecError::UnknownOpcode(99)));
        assert_eq!(
            decode_request(&[OP_ADD, 7]),
            Err(CodecError::UnknownSide(7))
        );
        assert_eq!(
            decode_request(&[OP_CANCEL, 1, 2]),
            Err(CodecError::Truncated)
        );

        let mut with_junk = encode_request(&Request::Best { side: Side::Buy }).to_vec();
        with_junk.push(0xFF);
        assert_eq!(
            decode_request(&with_junk),
            Err(CodecError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_response_header_layout() {
        let response = encode_response(StatusCode::Success, b"xy");

        assert_eq!(&response[..4], &200u32.to_be_bytes());
        assert_eq!(&response[4..11], b"Success");
        assert!(response[11..36].iter().all(|&b| b == 0), "NUL padding");
        assert_eq!(&response[36..], b"xy");
    }

    #[test]
    fn test_response_round_trips() {
        let mut buf = BytesMut::from(&encode_response(StatusCode::BadMessageLength, &[])[..]);
        let response = decode_response(&mut buf, 0).unwrap();

        assert_eq!(response.code, 400);
        assert_eq!(response.text, "BadMessageLength");
        assert!(response.payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_add_payload_layout() {
        use orderbook::Trade;

        let result = AddResult::executed(3, vec![Trade::new(1, 3, 5, 100)]);
        let payload = encode_add_payload(&result);

        assert_eq!(payload[0], result_tag::OK);
        assert_eq!(&payload[1..9], &3u64.to_le_bytes());
        assert_eq!(&payload[9..13], &1u32.to_le_bytes());
        assert_eq!(&payload[13..21], &1u64.to_le_bytes());
        assert_eq!(&payload[21..29], &3u64.to_le_bytes());
        assert_eq!(&payload[29..33], &5u32.to_le_bytes());
        assert_eq!(&payload[33..37], &100i32.to_le_bytes());

        let rejected = encode_add_payload(&AddResult::rejected());
        assert_eq!(&rejected[..], &[result_tag::NOT_ADMITTED]);
    }

    #[test]
    fn test_depth_payload_layout() {
        let levels = [LevelView {
            price: 101,
            volume: 9,
            order_count: 2,
        }];
        let payload = encode_depth_payload(&levels);

        assert_eq!(payload[0], result_tag::OK);
        assert_eq!(&payload[1..5], &1u32.to_le_bytes());
        assert_eq!(&payload[5..9], &101i32.to_le_bytes());
        assert_eq!(&payload[9..17], &9u64.to_le_bytes());
        assert_eq!(&payload[17..21], &2u32.to_le_bytes());
    }
}
