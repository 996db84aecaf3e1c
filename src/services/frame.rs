use bytes::Buf;
use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use serde_json::Value;

use crate::consts::MAX_FRAME_SIZE;
use crate::error::BeamError;
use crate::error::ErrorKind;
use crate::error::Result;

// Payload discriminators.
const TAG_REQUEST: u8 = 0;
const TAG_RESPONSE: u8 = 1;
const TAG_MESSAGE: u8 = 2;
const TAG_PING: u8 = 3;
const TAG_PONG: u8 = 4;

// Response result flags.
const FLAG_OK: u8 = 0;
const FLAG_ERR: u8 = 1;

// -----------------------------------------------------------------------------
// Frame
// -----------------------------------------------------------------------------

/// A single protocol payload.
///
/// On the wire every frame is a 4-byte big-endian length followed by a
/// 1-byte discriminator, the slot and correlation ids, and a
/// self-describing JSON body.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Frame {
  Request {
    service: u32,
    correlation: u32,
    body: Value,
  },
  Response {
    correlation: u32,
    result: Result<Value>,
  },
  Message {
    message: u32,
    body: Value,
  },
  Ping,
  Pong,
}

impl Frame {
  /// Encodes this frame, including the length prefix.
  pub(crate) fn encode(&self) -> Result<Bytes> {
    let mut payload: BytesMut = BytesMut::new();

    match self {
      Self::Request {
        service,
        correlation,
        body,
      } => {
        payload.put_u8(TAG_REQUEST);
        payload.put_u32(*service);
        payload.put_u32(*correlation);
        put_body(&mut payload, body)?;
      }
      Self::Response {
        correlation,
        result,
      } => {
        payload.put_u8(TAG_RESPONSE);
        payload.put_u32(*correlation);

        match result {
          Ok(body) => {
            payload.put_u8(FLAG_OK);
            put_body(&mut payload, body)?;
          }
          Err(error) => {
            payload.put_u8(FLAG_ERR);
            payload.put_u8(error.kind().tag());
            payload.put_slice(error.message().as_bytes());
          }
        }
      }
      Self::Message { message, body } => {
        payload.put_u8(TAG_MESSAGE);
        payload.put_u32(*message);
        put_body(&mut payload, body)?;
      }
      Self::Ping => payload.put_u8(TAG_PING),
      Self::Pong => payload.put_u8(TAG_PONG),
    }

    if payload.len() > MAX_FRAME_SIZE {
      return Err(BeamError::serialization("frame exceeds maximum size"));
    }

    let mut frame: BytesMut = BytesMut::with_capacity(4 + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.extend_from_slice(&payload);

    Ok(frame.freeze())
  }

  fn decode(mut payload: Bytes) -> Result<Self> {
    if payload.is_empty() {
      return Err(BeamError::serialization("empty frame"));
    }

    match payload.get_u8() {
      TAG_REQUEST => {
        if payload.remaining() < 8 {
          return Err(BeamError::serialization("truncated request frame"));
        }

        let service: u32 = payload.get_u32();
        let correlation: u32 = payload.get_u32();

        Ok(Self::Request {
          service,
          correlation,
          body: get_body(payload)?,
        })
      }
      TAG_RESPONSE => {
        if payload.remaining() < 5 {
          return Err(BeamError::serialization("truncated response frame"));
        }

        let correlation: u32 = payload.get_u32();

        let result: Result<Value> = match payload.get_u8() {
          FLAG_OK => Ok(get_body(payload)?),
          FLAG_ERR => {
            if payload.is_empty() {
              return Err(BeamError::serialization("truncated error response"));
            }

            let kind: ErrorKind = ErrorKind::from_tag(payload.get_u8())
              .ok_or_else(|| BeamError::serialization("unknown error kind"))?;

            let message: String = String::from_utf8(payload.to_vec())
              .map_err(|error| BeamError::serialization(error))?;

            Err(BeamError::new(kind, message))
          }
          flag => {
            return Err(BeamError::serialization(format!("unknown result flag: {flag}")));
          }
        };

        Ok(Self::Response {
          correlation,
          result,
        })
      }
      TAG_MESSAGE => {
        if payload.remaining() < 4 {
          return Err(BeamError::serialization("truncated message frame"));
        }

        let message: u32 = payload.get_u32();

        Ok(Self::Message {
          message,
          body: get_body(payload)?,
        })
      }
      TAG_PING => Ok(Self::Ping),
      TAG_PONG => Ok(Self::Pong),
      tag => Err(BeamError::serialization(format!("unknown frame tag: {tag}"))),
    }
  }
}

fn put_body(payload: &mut BytesMut, body: &Value) -> Result<()> {
  let encoded: Vec<u8> = serde_json::to_vec(body).map_err(|error| {
    BeamError::serialization(error)
  })?;

  payload.put_slice(&encoded);
  Ok(())
}

fn get_body(payload: Bytes) -> Result<Value> {
  serde_json::from_slice(&payload).map_err(|error| BeamError::serialization(error))
}

// -----------------------------------------------------------------------------
// Frame Decoder
// -----------------------------------------------------------------------------

/// Incremental decoder reassembling frames from arbitrary read chunks.
#[derive(Debug, Default)]
pub(crate) struct FrameDecoder {
  buffer: BytesMut,
}

impl FrameDecoder {
  pub(crate) fn new() -> Self {
    Self {
      buffer: BytesMut::new(),
    }
  }

  /// Appends raw channel data.
  pub(crate) fn extend(&mut self, data: &[u8]) {
    self.buffer.extend_from_slice(data);
  }

  /// Extracts the next complete frame, if one is buffered.
  pub(crate) fn next(&mut self) -> Result<Option<Frame>> {
    if self.buffer.len() < 4 {
      return Ok(None);
    }

    let length: usize = u32::from_be_bytes([
      self.buffer[0],
      self.buffer[1],
      self.buffer[2],
      self.buffer[3],
    ]) as usize;

    if length > MAX_FRAME_SIZE {
      return Err(BeamError::serialization("frame exceeds maximum size"));
    }

    if self.buffer.len() < 4 + length {
      return Ok(None);
    }

    self.buffer.advance(4);
    let payload: Bytes = self.buffer.split_to(length).freeze();

    Frame::decode(payload).map(Some)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
