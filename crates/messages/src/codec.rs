//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [version: u8][payload: bincode-encoded Message]
//! ```
//!
//! - Version is currently `1`
//! - Payload is the bincode encoding of [`Message`]
//!
//! The JSON codec carries the same [`Message`] through `serde_json` for
//! transports and tooling that want a self-describing encoding. Both codecs
//! round-trip losslessly and re-encode byte-identically.

use thiserror::Error;

use crate::Message;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("Message too short")]
    MessageTooShort,

    #[error("Binary decode error: {0}")]
    BinaryDecode(String),

    #[error("Binary encode error: {0}")]
    BinaryEncode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message to the binary wire format.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let payload =
        bincode::serialize(message).map_err(|e| CodecError::BinaryEncode(e.to_string()))?;
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(WIRE_VERSION);
    bytes.extend(payload);
    Ok(bytes)
}

/// Decode a message from the binary wire format.
pub fn decode(data: &[u8]) -> Result<Message, CodecError> {
    let Some((&version, payload)) = data.split_first() else {
        return Err(CodecError::MessageTooShort);
    };
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }
    bincode::deserialize(payload).map_err(|e| CodecError::BinaryDecode(e.to_string()))
}

/// Encode a message as JSON.
pub fn encode_json(message: &Message) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message from JSON.
pub fn decode_json(json: &str) -> Result<Message, CodecError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Payload;
    use riptide_types::{
        Block, Hash, Height, KeyPair, PreCommit, PreVote, Round, Shard, SignedBlock,
        SignedPreCommit, SignedPreVote,
    };

    fn message(payload: Payload) -> Message {
        Message {
            shard: Shard([3u8; 32]),
            payload,
        }
    }

    fn propose_message() -> Message {
        let keypair = KeyPair::generate();
        let block =
            SignedBlock::sign(Block::new(Height(1), Hash::ZERO, 42, vec![9, 9]), &keypair)
                .unwrap();
        message(Payload::Propose(block))
    }

    fn prevote_message() -> Message {
        let keypair = KeyPair::generate();
        let vote = SignedPreVote::sign(
            PreVote {
                block: None,
                height: Height(2),
                round: Round(1),
            },
            &keypair,
        )
        .unwrap();
        message(Payload::PreVote(vote))
    }

    fn precommit_message() -> Message {
        let keypair = KeyPair::generate();
        let precommit = SignedPreCommit::sign(
            PreCommit {
                polka: riptide_types::Polka {
                    block: None,
                    height: Height(2),
                    round: Round(1),
                    signatures: vec![],
                },
            },
            &keypair,
        )
        .unwrap();
        message(Payload::PreCommit(precommit))
    }

    #[test]
    fn test_binary_round_trip_all_payloads() {
        for original in [propose_message(), prevote_message(), precommit_message()] {
            let bytes = encode(&original).unwrap();
            assert_eq!(bytes[0], WIRE_VERSION);
            let decoded = decode(&bytes).unwrap();
            assert_eq!(decoded, original);
            // Re-encoding is byte-identical.
            assert_eq!(encode(&decoded).unwrap(), bytes);
        }
    }

    #[test]
    fn test_json_round_trip_all_payloads() {
        for original in [propose_message(), prevote_message(), precommit_message()] {
            let json = encode_json(&original).unwrap();
            let decoded = decode_json(&json).unwrap();
            assert_eq!(decoded, original);
            assert_eq!(encode_json(&decoded).unwrap(), json);
        }
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = encode(&prevote_message()).unwrap();
        bytes[0] = 99;
        assert!(matches!(decode(&bytes), Err(CodecError::UnknownVersion(99))));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(decode(&[]), Err(CodecError::MessageTooShort)));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = encode(&propose_message()).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            decode(truncated),
            Err(CodecError::BinaryDecode(_))
        ));
    }
}
