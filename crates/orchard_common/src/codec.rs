//! Framing helpers for the wire protocol.
//!
//! Every frame is an 8-byte little-endian length prefix followed by a
//! bincode-encoded [`WirePacket`]. Both the provider loops and test clients
//! share these helpers so the framing lives in exactly one place.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::WirePacket;
use crate::error::NetworkError;

/// Number of bytes in the length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 8;

/// Encode a message into a bincode payload.
pub fn encode_payload<T: Serialize>(message: &T) -> Result<Vec<u8>, NetworkError> {
    bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|_| NetworkError::Serialization)
}

/// Decode a bincode payload into a message.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, NetworkError> {
    bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map(|(message, _)| message)
        .map_err(|_| NetworkError::Serialization)
}

/// Encode a packet into a length-prefixed frame ready for the wire.
pub fn encode_frame(packet: &WirePacket) -> Result<Vec<u8>, NetworkError> {
    let encoded = encode_payload(packet)?;

    let len = encoded.len() as u64;
    let mut buffer = Vec::with_capacity(LENGTH_PREFIX_BYTES + encoded.len());
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(&encoded);

    Ok(buffer)
}

/// Decode a complete length-prefixed frame back into a packet.
pub fn decode_frame(frame: &[u8]) -> Result<WirePacket, NetworkError> {
    if frame.len() < LENGTH_PREFIX_BYTES {
        return Err(NetworkError::Serialization);
    }

    let length_bytes: [u8; LENGTH_PREFIX_BYTES] = frame[..LENGTH_PREFIX_BYTES]
        .try_into()
        .map_err(|_| NetworkError::Serialization)?;
    let length = u64::from_le_bytes(length_bytes) as usize;

    if frame.len() < LENGTH_PREFIX_BYTES + length {
        return Err(NetworkError::Serialization);
    }

    decode_payload(&frame[LENGTH_PREFIX_BYTES..LENGTH_PREFIX_BYTES + length])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let packet = WirePacket {
            channel: "TestMessage".to_string(),
            channel_hash: 0x1234567890abcdef,
            payload: vec![1, 2, 3, 4, 5],
        };

        let frame = encode_frame(&packet).unwrap();
        assert!(frame.len() > LENGTH_PREFIX_BYTES);

        let length_bytes: [u8; 8] = frame[..8].try_into().unwrap();
        let length = u64::from_le_bytes(length_bytes);
        assert_eq!(length as usize, frame.len() - LENGTH_PREFIX_BYTES);

        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.channel, packet.channel);
        assert_eq!(decoded.channel_hash, packet.channel_hash);
        assert_eq!(decoded.payload, packet.payload);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let packet = WirePacket {
            channel: "TestMessage".to_string(),
            channel_hash: 1,
            payload: vec![9; 32],
        };

        let frame = encode_frame(&packet).unwrap();
        assert!(decode_frame(&frame[..frame.len() - 1]).is_err());
        assert!(decode_frame(&frame[..4]).is_err());
    }
}
