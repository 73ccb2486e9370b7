//! Batch index builder.
//!
//! Builds one SQLite index per segment in parallel, then writes the master
//! index from the segments that produced at least one record.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use pcapql_core::pcap::{SegmentFile, SegmentStore};
use pcapql_core::protocol::classification_registry;
use pcapql_core::ProtocolRegistry;

use super::classify::classify;
use super::record::{MasterIndexEntry, ProtocolIndexRecord};
use super::store::IndexStore;
use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Outcome of indexing one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub segment_id: u32,
    pub packets: usize,
    /// Time range, absent for an empty segment.
    pub range: Option<MasterIndexEntry>,
}

/// Outcome of a full build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Indexed segments, in segment order.
    pub built: Vec<SegmentSummary>,
    /// Segments that failed, with the reason. No index rows were written
    /// for them.
    pub failed: Vec<(u32, String)>,
}

impl BuildReport {
    pub fn total_packets(&self) -> usize {
        self.built.iter().map(|s| s.packets).sum()
    }
}

/// Builds segment indexes and the master index.
pub struct IndexBuilder {
    segments: SegmentStore,
    store: IndexStore,
    registry: ProtocolRegistry,
    pool: ThreadPool,
}

impl IndexBuilder {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("pcapql-index-{i}"))
            .build()?;

        Ok(Self {
            segments: SegmentStore::new(config.segments_dir()),
            store: IndexStore::new(config.index_dir()),
            registry: classification_registry(),
            pool,
        })
    }

    /// Index every segment in the segments directory and rewrite the
    /// master index.
    pub fn build_all(&self) -> Result<BuildReport> {
        std::fs::create_dir_all(self.store.dir())?;
        let ids = self.segments.list_segments()?;
        info!(segments = ids.len(), dir = %self.segments.dir().display(), "Building indexes");

        let results: Vec<(u32, Result<SegmentSummary>)> = self.pool.install(|| {
            ids.par_iter()
                .map(|&id| (id, self.build_segment(id)))
                .collect()
        });

        let mut report = BuildReport::default();
        for (id, result) in results {
            match result {
                Ok(summary) => report.built.push(summary),
                Err(e) => {
                    warn!(segment = id, error = %e, "Failed to index segment");
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        report.built.sort_by_key(|s| s.segment_id);

        let entries: Vec<MasterIndexEntry> = report.built.iter().filter_map(|s| s.range).collect();
        self.store.write_master(&entries)?;

        info!(
            built = report.built.len(),
            failed = report.failed.len(),
            packets = report.total_packets(),
            "Index build complete"
        );
        Ok(report)
    }

    /// Index one segment, replacing any previous index for it.
    pub fn build_segment(&self, segment_id: u32) -> Result<SegmentSummary> {
        let segment = self.segments.open(segment_id)?;
        let records = index_segment(&self.registry, &segment, segment_id)?;
        self.store.write_segment(segment_id, &records)?;

        debug!(segment = segment_id, packets = records.len(), "Indexed segment");
        Ok(SegmentSummary {
            segment_id,
            packets: records.len(),
            range: MasterIndexEntry::from_records(segment_id, &records),
        })
    }
}

/// Classify every packet of a segment. A read error anywhere fails the
/// whole segment so no partial index is written.
pub fn index_segment(
    registry: &ProtocolRegistry,
    segment: &SegmentFile,
    segment_id: u32,
) -> Result<Vec<ProtocolIndexRecord>> {
    let link_type = segment.link_type();
    segment
        .packets()
        .map(|packet| {
            packet
                .map(|p| classify(registry, link_type, &p))
                .map_err(|e| {
                    debug!(segment = segment_id, error = %e, "Segment read error");
                    Error::from(e)
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::bitmask::ProtocolMask;
    use crate::query::IpLiterals;
    use pcapql_core::testing::{build_dns_packet, build_tcp_packet, SegmentBuilder};
    use tempfile::TempDir;

    fn setup() -> (TempDir, EngineConfig) {
        let dir = TempDir::new().unwrap();
        let segments = dir.path().join("segments");
        let index = dir.path().join("index");
        std::fs::create_dir_all(&segments).unwrap();
        let config = EngineConfig::new(segments, index).with_workers(2);
        (dir, config)
    }

    fn scan_all(store: &IndexStore, segment_id: u32) -> Vec<ProtocolIndexRecord> {
        store
            .scan_segment(segment_id, ProtocolMask::EMPTY, &IpLiterals::default())
            .unwrap()
    }

    #[test]
    fn test_build_all_writes_indexes_and_master() {
        let (_dir, config) = setup();
        SegmentBuilder::new()
            .packet(100, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 5000, 443, b"x"))
            .packet(105, 0, build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 5001, "a.b"))
            .write_to(config.segments_dir().join("2.pcap"))
            .unwrap();
        SegmentBuilder::new()
            .packet(50, 500, build_tcp_packet([10, 0, 0, 3], [10, 0, 0, 4], 5000, 80, b""))
            .write_to(config.segments_dir().join("1.pcap"))
            .unwrap();
        // Empty segment: indexed, but left out of the master index
        SegmentBuilder::new()
            .write_to(config.segments_dir().join("3.pcap"))
            .unwrap();

        let builder = IndexBuilder::new(&config).unwrap();
        let report = builder.build_all().unwrap();
        assert!(report.failed.is_empty());
        assert_eq!(
            report.built.iter().map(|s| s.segment_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(report.total_packets(), 3);

        let store = IndexStore::new(config.index_dir());
        let master = store.read_master().unwrap();
        assert_eq!(master.len(), 2);
        assert_eq!(master[0].segment_id, 1);
        assert_eq!((master[0].start_ts, master[0].end_ts), (50_000_500, 50_000_500));
        assert_eq!((master[1].start_ts, master[1].end_ts), (100_000_000, 105_000_000));

        let records = scan_all(&store, 2);
        assert_eq!(records.len(), 2);
        assert!(ProtocolMask(records[0].bitmask).contains("HTTPS"));
        assert!(ProtocolMask(records[1].bitmask).contains("DNS"));
        assert!(scan_all(&store, 3).is_empty());
    }

    #[test]
    fn test_corrupt_segment_is_reported_not_fatal() {
        let (_dir, config) = setup();
        SegmentBuilder::new()
            .packet(1, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1, 2, b""))
            .write_to(config.segments_dir().join("1.pcap"))
            .unwrap();

        let mut truncated = SegmentBuilder::new()
            .packet(1, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1, 2, b"abcdef"))
            .build();
        truncated.truncate(truncated.len() - 3);
        std::fs::write(config.segments_dir().join("7.pcap"), truncated).unwrap();

        let report = IndexBuilder::new(&config).unwrap().build_all().unwrap();
        assert_eq!(report.built.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 7);

        let store = IndexStore::new(config.index_dir());
        assert!(!store.segment_path(7).exists());
        assert_eq!(store.read_master().unwrap().len(), 1);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let (_dir, config) = setup();
        SegmentBuilder::new()
            .packet(1, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1, 22, b""))
            .write_to(config.segments_dir().join("4.pcap"))
            .unwrap();

        let builder = IndexBuilder::new(&config).unwrap();
        builder.build_all().unwrap();
        builder.build_all().unwrap();

        let store = IndexStore::new(config.index_dir());
        assert_eq!(scan_all(&store, 4).len(), 1);
        assert_eq!(store.read_master().unwrap().len(), 1);
    }
}
