// SPDX-License-Identifier: PMPL-1.0-or-later
#![no_main]

use libfuzzer_sys::fuzz_target;
use samplestore::keys::SampleKey;
use samplestore::{decode_probabilities_value, decode_throughput_value, encode_probabilities_value, encode_throughput_value};

fuzz_target!(|data: &[u8]| {
    // Decoders must never panic; anything they accept must re-encode to a
    // value that decodes to the same record.
    if let Ok(batch) = decode_throughput_value(data) {
        let again = encode_throughput_value(&batch).expect("decoded batch re-encodes");
        assert_eq!(decode_throughput_value(&again).ok(), Some(batch));
    }

    if let Ok(snapshot) = decode_probabilities_value(data) {
        let again = encode_probabilities_value(&snapshot).expect("decoded snapshot re-encodes");
        assert_eq!(decode_probabilities_value(&again).ok(), Some(snapshot));
    }

    if let Ok(key) = SampleKey::decode(data) {
        assert_eq!(key.encode(), data);
    }
});
