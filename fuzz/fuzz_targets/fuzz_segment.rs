//! Fuzz target for segment reading and index classification.
//!
//! Tests handling of malformed segment files including:
//! - Magic byte and byte order detection
//! - Packet record headers (caplen, origlen, timestamps)
//! - Random access by offset

#![no_main]

use libfuzzer_sys::fuzz_target;
use pcapql::index::{classify, index_segment};
use pcapql_core::protocol::classification_registry;
use pcapql_core::SegmentFile;

fuzz_target!(|data: &[u8]| {
    let Ok(segment) = SegmentFile::from_bytes(data.to_vec()) else {
        return;
    };
    let registry = classification_registry();

    let _ = index_segment(&registry, &segment, 0);

    for packet in segment.packets().flatten() {
        let record = classify(&registry, segment.link_type(), &packet);
        let _ = segment.packet_at(record.byte_offset);
    }
});
