//! Fuzz target for the protocol parsing chain.
//!
//! Every frame of every segment goes through here. Tests:
//! - Protocol detection via can_parse() priority
//! - Header bounds checking in each parser
//! - Field lookup and export on the decoded packet

#![no_main]

use libfuzzer_sys::fuzz_target;
use pcapql_core::protocol::{FrameMeta, FRAME_FIELDS};
use pcapql_core::{default_registry, parse_packet, DecodedPacket, PacketView};

fuzz_target!(|data: &[u8]| {
    let registry = default_registry();

    // Ethernet link type (linktype 1)
    let _ = parse_packet(&registry, 1, data);

    let packet = DecodedPacket::from_frame(&registry, 1, data, FrameMeta::default());
    for field in FRAME_FIELDS {
        let _ = packet.get_field(&format!("frame.{field}"));
    }
    let _ = packet.get_byte_field("payload", 0, 4);
    let _ = packet.export();
});
