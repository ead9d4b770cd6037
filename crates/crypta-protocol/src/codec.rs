use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Message, MAX_MESSAGE_SIZE};

/// JSON codec for protocol messages.
///
/// The transport already frames and encrypts payloads, so a message is a
/// single JSON document with no further framing.
pub struct MessageCodec;

impl MessageCodec {
    pub fn encode(msg: &Message) -> ProtocolResult<Vec<u8>> {
        let payload =
            serde_json::to_vec(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(payload)
    }

    pub fn decode(data: &[u8]) -> ProtocolResult<Message> {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: data.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        serde_json::from_slice(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}
