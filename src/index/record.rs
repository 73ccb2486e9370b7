//! On-disk index rows.

/// One row of a segment index: where a packet is and what it contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolIndexRecord {
    /// Capture time, microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Offset of the packet header in the segment file.
    pub byte_offset: u64,
    pub bitmask: u64,
    /// IPv4 destination as an integer, 0 for non-IPv4 packets.
    pub ip_dst: u32,
    /// IPv4 source as an integer, 0 for non-IPv4 packets.
    pub ip_src: u32,
    /// Bytes of recognized headers (offset of the transport payload).
    pub header_len: u16,
    pub dest_port: u16,
    pub src_port: u16,
}

/// One row of the master index: the time range a segment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterIndexEntry {
    pub segment_id: u32,
    /// Earliest packet timestamp, microseconds.
    pub start_ts: u64,
    /// Latest packet timestamp, microseconds.
    pub end_ts: u64,
}

impl MasterIndexEntry {
    /// Time range of `records`, or `None` when there are none.
    pub fn from_records(segment_id: u32, records: &[ProtocolIndexRecord]) -> Option<Self> {
        let start_ts = records.iter().map(|r| r.timestamp).min()?;
        let end_ts = records.iter().map(|r| r.timestamp).max()?;
        Some(Self {
            segment_id,
            start_ts,
            end_ts,
        })
    }

    /// True if the segment's range meets `[start_us, end_us]`.
    pub fn overlaps(&self, start_us: u64, end_us: u64) -> bool {
        self.start_ts <= end_us && self.end_ts >= start_us
    }
}
