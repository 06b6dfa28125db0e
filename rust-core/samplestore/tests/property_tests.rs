// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for value and key encoding

use proptest::prelude::*;
use samplestore::keys::{KeyGenerator, Namespace, SampleKey};
use samplestore::{
    decode_probabilities_value, decode_throughput_value, encode_probabilities_value,
    encode_throughput_value, ProbabilitiesAndQPS, ServiceOperationProbabilities, Throughput,
};

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,12}"
}

fn arb_throughput() -> impl Strategy<Value = Throughput> {
    (
        arb_name(),
        arb_name(),
        any::<u64>(),
        prop::collection::btree_set("0\\.[0-9]{1,4}", 0..4),
    )
        .prop_map(|(service, operation, count, probabilities)| {
            Throughput::new(service, operation)
                .with_count(count)
                .with_probabilities(probabilities)
        })
}

fn arb_service_map(values: impl Strategy<Value = f64> + Clone) -> impl Strategy<Value = ServiceOperationProbabilities> {
    prop::collection::btree_map(
        arb_name(),
        prop::collection::btree_map(arb_name(), values, 0..4),
        0..4,
    )
}

fn arb_snapshot() -> impl Strategy<Value = ProbabilitiesAndQPS> {
    (
        arb_name(),
        arb_service_map(0.0f64..=1.0),
        arb_service_map(0.0f64..1.0e6),
    )
        .prop_map(|(hostname, probabilities, qps)| ProbabilitiesAndQPS::new(hostname, probabilities, qps))
}

proptest! {
    #[test]
    fn test_throughput_round_trip(batch in prop::collection::vec(arb_throughput(), 1..8)) {
        let bytes = encode_throughput_value(&batch).unwrap();
        prop_assert_eq!(decode_throughput_value(&bytes).unwrap(), batch);
    }

    #[test]
    fn test_snapshot_round_trip(snapshot in arb_snapshot()) {
        let bytes = encode_probabilities_value(&snapshot).unwrap();
        prop_assert_eq!(decode_probabilities_value(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_dropping_leading_bytes_is_always_an_error(
        batch in prop::collection::vec(arb_throughput(), 1..4),
        snapshot in arb_snapshot(),
        drop in 1usize..64,
    ) {
        let throughput = encode_throughput_value(&batch).unwrap();
        let cut = drop.min(throughput.len());
        prop_assert!(decode_throughput_value(&throughput[cut..]).is_err());

        let probabilities = encode_probabilities_value(&snapshot).unwrap();
        let cut = drop.min(probabilities.len());
        prop_assert!(decode_probabilities_value(&probabilities[cut..]).is_err());
    }

    #[test]
    fn test_key_order_matches_timestamp_order(
        a in any::<i64>(),
        b in any::<i64>(),
        writer_a in any::<u32>(),
        writer_b in any::<u32>(),
    ) {
        let key_a = SampleKey { namespace: Namespace::Throughput, timestamp_nanos: a, writer_id: writer_a, sequence: 0 };
        let key_b = SampleKey { namespace: Namespace::Throughput, timestamp_nanos: b, writer_id: writer_b, sequence: 0 };
        if a < b {
            prop_assert!(key_a.encode() < key_b.encode());
        }
        prop_assert_eq!(key_a.encode().cmp(&key_b.encode()), key_a.cmp(&key_b));
        prop_assert_eq!(SampleKey::decode(&key_a.encode()).unwrap(), key_a);
    }

    #[test]
    fn test_generated_keys_never_decrease(offsets in prop::collection::vec(-1_000_000i64..1_000_000, 1..32)) {
        let generator = KeyGenerator::with_writer_id(9);
        let base = chrono::Utc::now();
        let mut previous: Option<Vec<u8>> = None;
        for offset in offsets {
            let key = generator
                .next_key(Namespace::Probabilities, base + chrono::Duration::nanoseconds(offset))
                .encode();
            if let Some(previous) = &previous {
                prop_assert!(previous < &key);
            }
            previous = Some(key);
        }
    }
}
