//! Wire round-trip property tests.
//!
//! Codec round-tripping is a structural property: it must hold for any
//! well-formed message, not just honestly signed ones, so signatures and
//! hashes here are arbitrary bytes.

use proptest::prelude::*;
use riptide_messages::{codec, Message, Payload};
use riptide_types::{
    Block, Hash, Height, Polka, PreCommit, PreVote, Round, Shard, Signatory, Signature,
    SignedBlock, SignedPreCommit, SignedPreVote,
};

fn hash() -> impl Strategy<Value = Hash> {
    any::<[u8; 32]>().prop_map(Hash)
}

fn shard() -> impl Strategy<Value = Shard> {
    any::<[u8; 32]>().prop_map(Shard)
}

fn signatory() -> impl Strategy<Value = Signatory> {
    any::<[u8; 32]>().prop_map(Signatory)
}

fn signature() -> impl Strategy<Value = Signature> {
    (any::<[u8; 32]>(), any::<[u8; 32]>(), any::<u8>()).prop_map(|(a, b, v)| {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&a);
        bytes[32..64].copy_from_slice(&b);
        bytes[64] = v;
        Signature(bytes)
    })
}

fn signed_block() -> impl Strategy<Value = SignedBlock> {
    (
        any::<u64>(),
        hash(),
        any::<u64>(),
        proptest::collection::vec(any::<u8>(), 0..64),
        signatory(),
        signature(),
    )
        .prop_map(|(height, parent, timestamp, payload, signatory, sig)| SignedBlock {
            block: Block::new(Height(height), parent, timestamp, payload),
            signatory,
            signature: sig,
        })
}

fn signed_prevote() -> impl Strategy<Value = SignedPreVote> {
    (
        proptest::option::of(signed_block()),
        any::<u64>(),
        any::<u64>(),
        signatory(),
        signature(),
    )
        .prop_map(|(block, height, round, signatory, sig)| SignedPreVote {
            vote: PreVote {
                block,
                height: Height(height),
                round: Round(round),
            },
            signatory,
            signature: sig,
        })
}

fn signed_precommit() -> impl Strategy<Value = SignedPreCommit> {
    (
        proptest::option::of(signed_block()),
        any::<u64>(),
        any::<u64>(),
        proptest::collection::vec(signed_prevote(), 0..4),
        signatory(),
        signature(),
    )
        .prop_map(
            |(block, height, round, signatures, signatory, sig)| SignedPreCommit {
                precommit: PreCommit {
                    polka: Polka {
                        block,
                        height: Height(height),
                        round: Round(round),
                        signatures,
                    },
                },
                signatory,
                signature: sig,
            },
        )
}

fn payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        signed_block().prop_map(Payload::Propose),
        signed_prevote().prop_map(Payload::PreVote),
        signed_precommit().prop_map(Payload::PreCommit),
    ]
}

fn message() -> impl Strategy<Value = Message> {
    (shard(), payload()).prop_map(|(shard, payload)| Message { shard, payload })
}

proptest! {
    /// P4, binary: decode(encode(m)) == m and re-encoding is byte-identical.
    #[test]
    fn binary_round_trip(m in message()) {
        let bytes = codec::encode(&m).unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        prop_assert_eq!(&decoded, &m);
        prop_assert_eq!(codec::encode(&decoded).unwrap(), bytes);
    }

    /// P4, JSON: decode(encode(m)) == m and re-encoding is byte-identical.
    #[test]
    fn json_round_trip(m in message()) {
        let json = codec::encode_json(&m).unwrap();
        let decoded = codec::decode_json(&json).unwrap();
        prop_assert_eq!(&decoded, &m);
        prop_assert_eq!(codec::encode_json(&decoded).unwrap(), json);
    }
}
