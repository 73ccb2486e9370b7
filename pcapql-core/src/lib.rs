//! # pcapql-core
//!
//! Capture segment reading and layered protocol decoding for pcapql.
//!
//! This crate knows nothing about the query language. It provides:
//!
//! - **Segment reading**: memory-mapped capture segments with sequential
//!   iteration (byte offset of every packet header) and random access by offset
//! - **Protocol decoding**: a small registry of layered parsers (Ethernet,
//!   802.1Q, ARP, IPv4, IPv6, ICMP, TCP, UDP, DNS) producing a
//!   [`DecodedPacket`](protocol::DecodedPacket)
//! - **Port classification**: the well-known-port table that tags application
//!   protocols
//! - **Address formatting**: IPv4/MAC rendering helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pcapql_core::pcap::SegmentStore;
//! use pcapql_core::protocol::{default_registry, DecodedPacket, PacketView};
//!
//! let registry = default_registry();
//! let store = SegmentStore::new("/var/lib/pcapql/segments");
//! let segment = store.open(7).unwrap();
//!
//! for packet in segment.packets() {
//!     let packet = packet.unwrap();
//!     let decoded = DecodedPacket::decode(&registry, segment.link_type(), &packet, 7);
//!     if decoded.has_layer("dns") {
//!         println!("{:?}", decoded.get_field("dns.qname"));
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                        pcapql-core                            |
//! +---------------------------------------------------------------+
//! |  pcap/      - SegmentFile, SegmentStore, SegmentPacket        |
//! |  protocol/  - Protocol trait, parsers, FieldValue, PacketView |
//! |  format/    - Address formatting utilities                    |
//! |  error/     - Error types                                     |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Crate Features
//!
//! - `test-utils` - packet builders and a segment writer for tests

pub mod error;
pub mod format;
pub mod pcap;
pub mod protocol;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{Error, PcapError, ProtocolError, Result};
pub use pcap::{SegmentFile, SegmentPacket, SegmentStore};
pub use protocol::{
    default_registry, parse_packet, DecodedPacket, FieldValue, PacketView,
    ProtocolRegistry,
};
