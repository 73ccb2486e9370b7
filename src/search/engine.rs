//! Query execution.
//!
//! A query runs in two phases on the engine's thread pool:
//!
//! 1. **Scan**: segment indexes are scanned in chunks of `workers`
//!    segments, keeping records that carry every referenced protocol and
//!    satisfy the IP literals.
//! 2. **Resolve**: surviving packet pointers, in (segment, offset) order,
//!    are decoded in batches and checked against the filter. Matches become
//!    flat rows or group-by inputs.
//!
//! Results are merged on the calling thread in pointer order, so output is
//! deterministic regardless of the worker count.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use pcapql_core::pcap::{SegmentFile, SegmentStore};
use pcapql_core::protocol::{default_registry, DecodedPacket, PacketView};
use pcapql_core::ProtocolRegistry;

use super::pointer::PacketPointer;
use super::result::{ColumnDescriptor, DisplayType, QueryResult};
use crate::aggregate::{Distinct, Grouper};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::index::{IndexStore, MasterIndexEntry, ProtocolMask};
use crate::query::{
    matches, parse_with, CompileContext, Node, Projection, SelectItem, SelectStatement, Value,
};

/// Columns produced by `select *`.
pub const WILDCARD_COLUMNS: &[&str] = &[
    "frame.ts",
    "frame.len",
    "eth.src",
    "eth.dst",
    "ip.src",
    "ip.dst",
    "ip.proto",
    "frame.protocols",
];

/// Pointers each worker decodes per batch.
const POINTERS_PER_WORKER: usize = 256;

/// Runs PQL queries against indexed segments.
pub struct QueryEngine {
    config: EngineConfig,
    index: IndexStore,
    segments: SegmentStore,
    registry: ProtocolRegistry,
    pool: ThreadPool,
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("pcapql-search-{i}"))
            .build()?;

        Ok(Self {
            index: IndexStore::new(config.index_dir()),
            segments: SegmentStore::new(config.segments_dir()),
            registry: default_registry(),
            config,
            pool,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse and run `query`.
    ///
    /// Only fatal problems (syntax errors, a missing master index, thread
    /// pool failures) return `Err`. Problems with individual segments are
    /// reported in [`QueryResult::errors`].
    pub fn run(&self, query: &str) -> Result<QueryResult> {
        self.run_at(query, Utc::now())
    }

    /// Like [`run`](Self::run), resolving `now()` and times of day against
    /// `now`.
    pub fn run_at(&self, query: &str, now: DateTime<Utc>) -> Result<QueryResult> {
        let mut context = CompileContext::new();
        let statement = parse_with(query, &mut context, now)?;
        self.execute(&statement, now.timestamp())
    }

    /// Run an already parsed statement. `now` is epoch seconds.
    pub fn execute(&self, statement: &SelectStatement, now: i64) -> Result<QueryResult> {
        let plan = Plan::new(statement);
        let required = ProtocolMask::from_names(&statement.protocols);

        let mut master = self.index.read_master()?;
        if self.config.prune_by_interval {
            if let Some((start, end)) = statement.interval {
                let before = master.len();
                master.retain(|e| e.overlaps(secs_to_us(start), secs_to_us(end)));
                debug!(before, after = master.len(), "Pruned segments by interval");
            }
        }
        debug!(required = %required, segments = master.len(), "Executing query");

        let workers = self.config.workers.max(1);
        let mut result = QueryResult::default();
        let mut sink = Sink::new(&plan, statement);

        'chunks: for chunk in master.chunks(workers) {
            if sink.full(&result) {
                break;
            }

            let (pointers, files) = self.scan_chunk(chunk, required, statement, &mut result);

            for batch in pointers.chunks(workers * POINTERS_PER_WORKER) {
                let outcomes: Vec<Vec<Outcome>> = self.pool.install(|| {
                    batch
                        .par_chunks(POINTERS_PER_WORKER)
                        .map(|slice| {
                            slice
                                .iter()
                                .map(|&pointer| self.resolve(&plan, &files, pointer, now))
                                .collect()
                        })
                        .collect()
                });

                for outcome in outcomes.into_iter().flatten() {
                    match outcome {
                        Outcome::Rejected => {}
                        Outcome::Unresolved(pointer) => {
                            warn!(%pointer, "Index points at no packet");
                            result.push_error(format!(
                                "segment {}: no packet at offset {}",
                                pointer.segment, pointer.offset
                            ));
                        }
                        Outcome::Matched(hit) => {
                            if sink.full(&result) {
                                break;
                            }
                            result.matched_count += 1;
                            result.observe_timestamp(hit.timestamp);
                            sink.push(hit);
                        }
                    }
                }

                if sink.full(&result) {
                    debug!(matched = result.matched_count, "TOP reached");
                    break 'chunks;
                }
            }
        }

        let rows = sink.finish();
        self.assemble(&plan, statement, rows, &mut result);

        info!(
            matched = result.matched_count,
            searched = result.searched_count,
            rows = result.rows.len(),
            "Query complete"
        );
        Ok(result)
    }

    /// Scan the indexes of one chunk of segments and open the segments with
    /// candidates. Returns the candidates in pointer order.
    fn scan_chunk(
        &self,
        chunk: &[MasterIndexEntry],
        required: ProtocolMask,
        statement: &SelectStatement,
        result: &mut QueryResult,
    ) -> (Vec<PacketPointer>, HashMap<u32, SegmentFile>) {
        let scans: Vec<_> = self.pool.install(|| {
            chunk
                .par_iter()
                .map(|entry| {
                    let id = entry.segment_id;
                    (id, self.index.scan_segment(id, required, &statement.ip_literals))
                })
                .collect()
        });

        let mut pointers = Vec::new();
        let mut files = HashMap::new();
        for (segment_id, scan) in scans {
            let records = match scan {
                Ok(records) => records,
                Err(e) => {
                    warn!(segment = segment_id, error = %e, "Index scan failed");
                    result.push_error(format!("segment {segment_id}: {e}"));
                    continue;
                }
            };
            if records.is_empty() {
                continue;
            }
            result.searched_count += records.len() as u64;

            match self.segments.open(segment_id) {
                Ok(file) => {
                    files.insert(segment_id, file);
                }
                Err(e) => {
                    warn!(segment = segment_id, error = %e, "Cannot open segment");
                    result.push_error(format!("segment {segment_id}: {e}"));
                    continue;
                }
            }
            pointers.extend(
                records
                    .iter()
                    .map(|r| PacketPointer::new(segment_id, r.byte_offset)),
            );
        }
        pointers.sort_unstable();
        debug!(candidates = pointers.len(), segments = files.len(), "Scanned chunk");
        (pointers, files)
    }

    fn resolve(
        &self,
        plan: &Plan<'_>,
        files: &HashMap<u32, SegmentFile>,
        pointer: PacketPointer,
        now: i64,
    ) -> Outcome {
        let Some((file, packet)) = files
            .get(&pointer.segment)
            .and_then(|file| file.packet_at(pointer.offset).map(|p| (file, p)))
        else {
            return Outcome::Unresolved(pointer);
        };
        let decoded = DecodedPacket::decode(&self.registry, file.link_type(), &packet, pointer.segment);

        if let Some(filter) = plan.filter {
            if !matches(filter, &decoded, now) {
                return Outcome::Rejected;
            }
        }

        Outcome::Matched(Hit {
            timestamp: packet.timestamp_us(),
            key: plan
                .group_by
                .iter()
                .map(|name| field_value(&decoded, name))
                .collect(),
            values: plan
                .inputs
                .iter()
                .map(|input| input.as_deref().map_or(Value::Null, |n| field_value(&decoded, n)))
                .collect(),
        })
    }

    /// Post-process rows and fill in the column descriptors: ORDER BY,
    /// DISTINCT, TOP, then LIMIT.
    fn assemble(
        &self,
        plan: &Plan<'_>,
        statement: &SelectStatement,
        mut rows: Vec<Vec<Value>>,
        result: &mut QueryResult,
    ) {
        if !plan.order_keys.is_empty() {
            rows.sort_by(|a, b| {
                plan.order_keys
                    .iter()
                    .map(|&k| a[k].total_cmp(&b[k]))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        for row in &mut rows {
            row.truncate(plan.items.len());
        }

        if statement.distinct && !plan.aggregate {
            let mut distinct = Distinct::new();
            rows = distinct.dedup(rows);
            result.fingerprints = distinct.into_fingerprints();
        }
        if let Some(top) = statement.top {
            rows.truncate(usize::try_from(top).unwrap_or(usize::MAX));
        }
        if let Some((offset, count)) = statement.limit {
            rows = rows
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(count).unwrap_or(usize::MAX))
                .collect();
        }

        result.columns = plan
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| ColumnDescriptor {
                name: item.name().to_string(),
                display_type: DisplayType::infer(item, rows.iter().filter_map(|r| r.get(i))),
            })
            .collect();
        result.rows = rows;
    }
}

fn field_value(packet: &DecodedPacket<'_>, name: &str) -> Value {
    packet.get_field(name).map_or(Value::Null, Value::from)
}

fn secs_to_us(secs: i64) -> u64 {
    u64::try_from(secs).unwrap_or(0).saturating_mul(1_000_000)
}

/// What a statement needs from each matched packet.
struct Plan<'s> {
    filter: Option<&'s Node>,
    /// Output columns, with `*` expanded.
    items: Vec<SelectItem>,
    aggregate: bool,
    group_by: &'s [String],
    /// Field read for each value slot: one per item, then ORDER BY fields
    /// that are not projected (flat queries only). `None` for `count()`.
    inputs: Vec<Option<String>>,
    /// Value slots to sort by.
    order_keys: Vec<usize>,
}

impl<'s> Plan<'s> {
    fn new(statement: &'s SelectStatement) -> Self {
        let items: Vec<SelectItem> = match &statement.projection {
            Projection::Wildcard => WILDCARD_COLUMNS
                .iter()
                .map(|name| SelectItem::Field(name.to_string()))
                .collect(),
            Projection::Items(items) => items.clone(),
        };
        let aggregate = statement.projection.has_aggregates() || !statement.group_by.is_empty();

        let mut inputs: Vec<Option<String>> = items
            .iter()
            .map(|item| match item {
                SelectItem::Field(name) => Some(name.clone()),
                SelectItem::Aggregate(call) => call.field.clone(),
            })
            .collect();

        let mut order_keys = Vec::new();
        for name in &statement.order_by {
            if let Some(pos) = items.iter().position(|i| i.name().eq_ignore_ascii_case(name)) {
                order_keys.push(pos);
            } else if !aggregate {
                inputs.push(Some(name.clone()));
                order_keys.push(inputs.len() - 1);
            } else {
                debug!(column = %name, "ORDER BY column is not in the output, ignored");
            }
        }

        Self {
            filter: statement.filter.as_ref(),
            items,
            aggregate,
            group_by: &statement.group_by,
            inputs,
            order_keys,
        }
    }
}

/// A packet that passed the filter.
struct Hit {
    timestamp: u64,
    key: Vec<Value>,
    values: Vec<Value>,
}

enum Outcome {
    Matched(Hit),
    Rejected,
    Unresolved(PacketPointer),
}

/// Collects hits as flat rows or group-by inputs.
enum Rows {
    Flat(Vec<Vec<Value>>),
    Grouped(Grouper),
}

struct Sink {
    rows: Rows,
    top: Option<u64>,
}

impl Sink {
    fn new(plan: &Plan<'_>, statement: &SelectStatement) -> Self {
        let rows = if plan.aggregate {
            Rows::Grouped(Grouper::new(plan.items.clone(), statement.group_by.clone()))
        } else {
            Rows::Flat(Vec::new())
        };
        Self {
            rows,
            top: statement.top,
        }
    }

    /// True once TOP packets have matched.
    fn full(&self, result: &QueryResult) -> bool {
        self.top.is_some_and(|top| result.matched_count >= top)
    }

    fn push(&mut self, hit: Hit) {
        match &mut self.rows {
            Rows::Flat(rows) => rows.push(hit.values),
            Rows::Grouped(grouper) => grouper.push(hit.key, hit.values),
        }
    }

    fn finish(self) -> Vec<Vec<Value>> {
        match self.rows {
            Rows::Flat(rows) => rows,
            Rows::Grouped(grouper) => grouper.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use chrono::TimeZone;
    use pcapql_core::testing::{build_dns_packet, build_tcp_packet, SegmentBuilder};
    use tempfile::TempDir;

    fn engine_with(segments: &[(u32, SegmentBuilder)]) -> (TempDir, QueryEngine) {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path().join("segments"), dir.path().join("index"))
            .with_workers(2);
        std::fs::create_dir_all(config.segments_dir()).unwrap();
        for (id, builder) in segments {
            builder
                .write_to(config.segments_dir().join(format!("{id}.pcap")))
                .unwrap();
        }
        IndexBuilder::new(&config).unwrap().build_all().unwrap();
        let engine = QueryEngine::new(config).unwrap();
        (dir, engine)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_wildcard_expands_columns() {
        let segment = SegmentBuilder::new().packet(
            100,
            0,
            build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1000, 80, b""),
        );
        let (_dir, engine) = engine_with(&[(1, segment)]);

        let result = engine.run_at("select * from a;", now()).unwrap();
        assert_eq!(result.column_names(), WILDCARD_COLUMNS.to_vec());
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::Int(100));
        assert_eq!(result.rows[0][4], Value::Int(0x0A00_0001));
        assert_eq!(result.columns[4].display_type, DisplayType::Ipv4);
        assert_eq!(result.columns[0].display_type, DisplayType::Timestamp);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_top_stops_early() {
        let mut segment = SegmentBuilder::new();
        for i in 0..20u16 {
            segment = segment.packet(
                u32::from(i),
                0,
                build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1000 + i, 443, b""),
            );
        }
        let (_dir, engine) = engine_with(&[(1, segment)]);

        let result = engine
            .run_at("select tcp.sport from a where tcp.dport == 443 top 5;", now())
            .unwrap();
        assert_eq!(result.rows.len(), 5);
        assert_eq!(result.matched_count, 5);
        assert_eq!(result.rows[0][0], Value::Int(1000));
        assert_eq!(result.rows[4][0], Value::Int(1004));
    }

    #[test]
    fn test_order_by_unprojected_field() {
        let segment = SegmentBuilder::new()
            .packet(1, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 3000, 80, b""))
            .packet(2, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1000, 81, b""))
            .packet(3, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 2000, 82, b""));
        let (_dir, engine) = engine_with(&[(1, segment)]);

        let result = engine
            .run_at("select tcp.dport from a order by tcp.sport;", now())
            .unwrap();
        assert_eq!(result.columns.len(), 1);
        let ports: Vec<_> = result.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(ports, vec![Value::Int(81), Value::Int(82), Value::Int(80)]);
    }

    #[test]
    fn test_protocol_prefilter_counts_candidates() {
        let segment = SegmentBuilder::new()
            .packet(1, 0, build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 4000, "a.example"))
            .packet(2, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1000, 443, b""))
            .packet(3, 0, build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 4001, "b.example"));
        let (_dir, engine) = engine_with(&[(1, segment)]);

        let result = engine
            .run_at("select udp.sport from a where dns;", now())
            .unwrap();
        assert_eq!(result.searched_count, 2);
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.min_ts, Some(1_000_000));
        assert_eq!(result.max_ts, Some(3_000_000));
    }

    #[test]
    fn test_interval_pruning_is_opt_in() {
        let early = SegmentBuilder::new().packet(
            1_000,
            0,
            build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1, 80, b""),
        );
        let late = SegmentBuilder::new().packet(
            9_000,
            0,
            build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 2, 80, b""),
        );
        let (dir, engine) = engine_with(&[(1, early), (2, late)]);
        let query = "select tcp.sport from a interval 7200 to 10800;";

        let result = engine.run_at(query, now()).unwrap();
        assert_eq!(result.rows.len(), 2);

        let pruned = QueryEngine::new(engine.config().clone().with_prune_by_interval(true)).unwrap();
        let result = pruned.run_at(query, now()).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
        drop(dir);
    }

    fn two_packet_segment() -> SegmentBuilder {
        SegmentBuilder::new()
            .packet(1, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 1, 80, b""))
            .packet(2, 0, build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 2, 80, b""))
    }

    #[test]
    fn test_stale_index_reports_unresolved_pointers() {
        let (_dir, engine) = engine_with(&[(1, two_packet_segment())]);
        let path = engine.config().segments_dir().join("1.pcap");
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(30)
            .unwrap();

        let result = engine.run_at("select tcp.sport from a;", now()).unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.searched_count, 2);
        assert_eq!(result.matched_count, 0);
        assert_eq!(
            result.errors,
            vec![
                "segment 1: no packet at offset 24",
                "segment 1: no packet at offset 94",
            ]
        );
    }

    #[test]
    fn test_deleted_segment_is_reported() {
        let intact = SegmentBuilder::new().packet(
            3,
            0,
            build_tcp_packet([10, 0, 0, 1], [10, 0, 0, 2], 3, 80, b""),
        );
        let (_dir, engine) = engine_with(&[(1, two_packet_segment()), (2, intact)]);
        std::fs::remove_file(engine.config().segments_dir().join("1.pcap")).unwrap();

        let result = engine.run_at("select tcp.sport from a;", now()).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(3)]]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("segment 1:"), "{:?}", result.errors);
    }
}
