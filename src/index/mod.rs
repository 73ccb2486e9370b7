//! Protocol bitmask indexes.
//!
//! Each segment gets one [`ProtocolIndexRecord`] per packet recording which
//! protocols it carries, its IPv4 addresses and ports. The search engine
//! scans these records to pick candidate packets before decoding anything.
//! The [`MasterIndexEntry`] catalog records the time range of each segment.

mod bitmask;
mod builder;
mod classify;
mod record;
mod store;

pub use bitmask::{ProtocolMask, PROTOCOL_BITS};
pub use builder::{index_segment, BuildReport, IndexBuilder, SegmentSummary};
pub use classify::classify;
pub use record::{MasterIndexEntry, ProtocolIndexRecord};
pub use store::IndexStore;
