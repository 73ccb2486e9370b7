//! Capture segment reading.
//!
//! A segment is a classic capture file named `<id>.pcap`. The main types are:
//! - [`SegmentFile`] - one memory-mapped segment
//! - [`SegmentPacket`] - a packet borrowed from a segment, with its byte offset
//! - [`SegmentStore`] - the directory holding all segments

mod segment;
mod store;

pub use segment::{
    ByteOrder, Packets, SegmentFile, SegmentPacket, GLOBAL_HEADER_LEN, LINKTYPE_ETHERNET,
    PACKET_HEADER_LEN,
};
pub use store::SegmentStore;
