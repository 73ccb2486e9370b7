//! Memory-mapped capture segment.
//!
//! Layout: a 24-byte global header followed by repeated records of a 16-byte
//! packet header (seconds, sub-second fraction, captured length, original
//! length) and `captured length` bytes of link-layer data.
//!
//! Segments are written big-endian. A little-endian magic switches the byte
//! order for the whole file; a nanosecond magic scales the fraction down to
//! microseconds.

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::error::{Error, PcapError, Result};

/// Size of the file-level header.
pub const GLOBAL_HEADER_LEN: usize = 24;

/// Size of every per-packet header.
pub const PACKET_HEADER_LEN: usize = 16;

/// Link type for Ethernet.
pub const LINKTYPE_ETHERNET: u16 = 1;

/// Largest captured length accepted before the file is considered corrupt.
const MAX_SNAPLEN: usize = 262_144;

/// Byte order of the integer fields in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    #[inline]
    fn read_u32(self, bytes: &[u8]) -> u32 {
        let arr = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::Big => u32::from_be_bytes(arr),
            ByteOrder::Little => u32::from_le_bytes(arr),
        }
    }
}

/// Detect byte order and timestamp precision from the magic bytes.
///
/// Returns `(byte_order, nanosecond_precision)`.
fn detect_magic(magic: &[u8]) -> (ByteOrder, bool) {
    match magic {
        [0xa1, 0xb2, 0xc3, 0xd4] => (ByteOrder::Big, false),
        [0xa1, 0xb2, 0x3c, 0x4d] => (ByteOrder::Big, true),
        [0xd4, 0xc3, 0xb2, 0xa1] => (ByteOrder::Little, false),
        [0x4d, 0x3c, 0xb2, 0xa1] => (ByteOrder::Little, true),
        other => {
            debug!(magic = ?other, "Unrecognized segment magic, assuming big-endian");
            (ByteOrder::Big, false)
        }
    }
}

/// Backing storage for a segment.
enum SegmentBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for SegmentBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            SegmentBytes::Mapped(m) => m,
            SegmentBytes::Owned(v) => v,
        }
    }
}

/// One packet borrowed from a segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentPacket<'a> {
    /// Byte offset of the packet header within the segment file.
    pub offset: u64,
    /// Seconds since the Unix epoch.
    pub ts_sec: u32,
    /// Microseconds within the second.
    pub ts_usec: u32,
    /// Captured length (bytes present in `data`).
    pub caplen: u32,
    /// Original length on the wire.
    pub origlen: u32,
    /// The raw 16-byte packet header.
    pub header: &'a [u8],
    /// Link-layer frame bytes.
    pub data: &'a [u8],
}

impl SegmentPacket<'_> {
    /// Capture timestamp in microseconds since the Unix epoch.
    pub fn timestamp_us(&self) -> u64 {
        self.ts_sec as u64 * 1_000_000 + self.ts_usec as u64
    }
}

/// A memory-mapped capture segment.
pub struct SegmentFile {
    path: PathBuf,
    bytes: SegmentBytes,
    byte_order: ByteOrder,
    nano_precision: bool,
    link_type: u16,
}

impl std::fmt::Debug for SegmentFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentFile")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("byte_order", &self.byte_order)
            .field("link_type", &self.link_type)
            .finish()
    }
}

impl SegmentFile {
    /// Open and memory-map a segment file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Error::Pcap(PcapError::FileNotFound {
                path: path.display().to_string(),
            }));
        }

        let file = File::open(&path).map_err(Error::Io)?;

        // Safety: segments are read-only while searches run; the index
        // builder is the only writer and never runs concurrently.
        let mmap = unsafe { Mmap::map(&file).map_err(Error::Io)? };

        Self::with_bytes(path, SegmentBytes::Mapped(mmap))
    }

    /// Build a segment from an in-memory buffer.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::with_bytes(PathBuf::from("<memory>"), SegmentBytes::Owned(data))
    }

    fn with_bytes(path: PathBuf, bytes: SegmentBytes) -> Result<Self> {
        if bytes.len() < GLOBAL_HEADER_LEN {
            return Err(Error::Pcap(PcapError::InvalidFormat {
                reason: format!(
                    "{}: {} bytes is too small for a segment header",
                    path.display(),
                    bytes.len()
                ),
            }));
        }

        let (byte_order, nano_precision) = detect_magic(&bytes[0..4]);
        let link_type = byte_order.read_u32(&bytes[20..24]) as u16;

        Ok(Self {
            path,
            bytes,
            byte_order,
            nano_precision,
            link_type,
        })
    }

    /// Path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Link type from the global header.
    pub fn link_type(&self) -> u16 {
        self.link_type
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Total size of the segment in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= GLOBAL_HEADER_LEN
    }

    /// Iterate over every packet in file order.
    pub fn packets(&self) -> Packets<'_> {
        Packets {
            segment: self,
            pos: GLOBAL_HEADER_LEN,
            done: false,
        }
    }

    /// Read the packet whose header starts at `offset`.
    ///
    /// Returns `None` if the offset does not address a complete packet.
    pub fn packet_at(&self, offset: u64) -> Option<SegmentPacket<'_>> {
        let offset = usize::try_from(offset).ok()?;
        if offset < GLOBAL_HEADER_LEN {
            return None;
        }
        self.read_packet(offset).ok()
    }

    /// Resolve a byte offset to its `(header, frame)` byte slices.
    pub fn resolve(&self, offset: u64) -> Option<(&[u8], &[u8])> {
        self.packet_at(offset).map(|p| (p.header, p.data))
    }

    fn read_packet(&self, pos: usize) -> Result<SegmentPacket<'_>> {
        let data: &[u8] = &self.bytes;
        let truncated = |expected: usize, from: usize| {
            Error::Pcap(PcapError::TruncatedPacket {
                offset: pos as u64,
                expected,
                actual: data.len().saturating_sub(from),
            })
        };

        let header_end = pos
            .checked_add(PACKET_HEADER_LEN)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| truncated(PACKET_HEADER_LEN, pos))?;

        let header = &data[pos..header_end];
        let order = self.byte_order;
        let ts_sec = order.read_u32(&header[0..4]);
        let ts_frac = order.read_u32(&header[4..8]);
        let caplen = order.read_u32(&header[8..12]);
        let origlen = order.read_u32(&header[12..16]);

        let captured = caplen as usize;
        if captured > MAX_SNAPLEN {
            return Err(Error::Pcap(PcapError::InvalidFormat {
                reason: format!("captured length {captured} at offset {pos} exceeds {MAX_SNAPLEN}"),
            }));
        }

        let frame_end = header_end
            .checked_add(captured)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| truncated(captured, header_end))?;

        let ts_usec = if self.nano_precision {
            ts_frac / 1000
        } else {
            ts_frac
        };

        Ok(SegmentPacket {
            offset: pos as u64,
            ts_sec,
            ts_usec,
            caplen,
            origlen,
            header,
            data: &data[header_end..frame_end],
        })
    }
}

/// Sequential packet iterator over a segment.
///
/// Yields an error once for a truncated or corrupt record, then stops.
pub struct Packets<'a> {
    segment: &'a SegmentFile,
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Packets<'a> {
    type Item = Result<SegmentPacket<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.segment.bytes.len() {
            return None;
        }

        match self.segment.read_packet(self.pos) {
            Ok(packet) => {
                self.pos += PACKET_HEADER_LEN + packet.data.len();
                Some(Ok(packet))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SegmentBuilder;

    fn three_packet_segment() -> Vec<u8> {
        SegmentBuilder::new()
            .packet(1_700_000_000, 1, vec![0xaa; 60])
            .packet(1_700_000_001, 2, vec![0xbb; 42])
            .packet(1_700_000_002, 3, vec![0xcc; 100])
            .build()
    }

    #[test]
    fn test_iterates_all_packets_with_offsets() {
        let segment = SegmentFile::from_bytes(three_packet_segment()).unwrap();
        assert_eq!(segment.byte_order(), ByteOrder::Big);
        assert_eq!(segment.link_type(), LINKTYPE_ETHERNET);

        let packets: Vec<_> = segment.packets().map(|p| p.unwrap()).collect();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].offset, 24);
        assert_eq!(packets[1].offset, 24 + 16 + 60);
        assert_eq!(packets[2].offset, 24 + 16 + 60 + 16 + 42);
        assert_eq!(packets[1].data, &[0xbb; 42][..]);
        assert_eq!(packets[2].timestamp_us(), 1_700_000_002_000_003);
    }

    #[test]
    fn test_packet_at_offset() {
        let segment = SegmentFile::from_bytes(three_packet_segment()).unwrap();

        let packet = segment.packet_at(100).unwrap();
        assert_eq!(packet.caplen, 42);
        assert_eq!(packet.ts_sec, 1_700_000_001);

        let (header, frame) = segment.resolve(24).unwrap();
        assert_eq!(header.len(), PACKET_HEADER_LEN);
        assert_eq!(frame.len(), 60);

        assert!(segment.packet_at(0).is_none());
        assert!(segment.packet_at(10_000).is_none());
        assert!(segment.packet_at(u64::MAX).is_none());
    }

    #[test]
    fn test_offset_past_end_of_shortened_segment() {
        let mut data = three_packet_segment();
        data.truncate(30);
        let segment = SegmentFile::from_bytes(data).unwrap();

        // Offsets recorded before the file was cut short
        assert!(segment.packet_at(24).is_none());
        assert!(segment.packet_at(100).is_none());
        assert!(segment.resolve(158).is_none());

        assert!(matches!(
            segment.read_packet(100),
            Err(Error::Pcap(PcapError::TruncatedPacket { expected: 16, actual: 0, .. }))
        ));
    }

    #[test]
    fn test_little_endian_segment() {
        let data = SegmentBuilder::new()
            .little_endian()
            .packet(1_600_000_000, 500, vec![1, 2, 3, 4])
            .build();
        let segment = SegmentFile::from_bytes(data).unwrap();
        assert_eq!(segment.byte_order(), ByteOrder::Little);

        let packet = segment.packets().next().unwrap().unwrap();
        assert_eq!(packet.ts_sec, 1_600_000_000);
        assert_eq!(packet.ts_usec, 500);
        assert_eq!(packet.data, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_packet_stops_iteration() {
        let mut data = three_packet_segment();
        data.truncate(data.len() - 10);
        let segment = SegmentFile::from_bytes(data).unwrap();

        let results: Vec<_> = segment.packets().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(Error::Pcap(PcapError::TruncatedPacket { expected: 100, actual: 90, .. }))
        ));
    }

    #[test]
    fn test_header_too_small() {
        let result = SegmentFile::from_bytes(vec![0xa1, 0xb2, 0xc3, 0xd4]);
        assert!(matches!(
            result,
            Err(Error::Pcap(PcapError::InvalidFormat { .. }))
        ));
    }

    #[test]
    fn test_empty_segment() {
        let segment = SegmentFile::from_bytes(SegmentBuilder::new().build()).unwrap();
        assert!(segment.is_empty());
        assert_eq!(segment.packets().count(), 0);
    }

    #[test]
    fn test_open_missing_file() {
        let err = SegmentFile::open("/nonexistent/segment/42.pcap").unwrap_err();
        assert!(matches!(err, Error::Pcap(PcapError::FileNotFound { .. })));
    }
}
