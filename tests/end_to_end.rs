//! End-to-end tests: write segments, build indexes, run queries.

use chrono::{DateTime, TimeZone, Utc};
use pcapql::query::Value;
use pcapql::search::NO_ERRORS;
use pcapql::{EngineConfig, Error, IndexBuilder, QueryEngine, StoreError};
use pcapql_core::testing::{build_dns_packet, build_tcp_packet, SegmentBuilder};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    config: EngineConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path().join("segments"), dir.path().join("index"))
            .with_workers(2);
        std::fs::create_dir_all(config.segments_dir()).unwrap();
        Self { _dir: dir, config }
    }

    fn segment(&self, id: u32, segment: SegmentBuilder) -> &Self {
        segment
            .write_to(self.config.segments_dir().join(format!("{id}.pcap")))
            .unwrap();
        self
    }

    fn build(&self) -> QueryEngine {
        let report = IndexBuilder::new(&self.config).unwrap().build_all().unwrap();
        assert!(report.failed.is_empty(), "index build failed: {:?}", report.failed);
        QueryEngine::new(self.config.clone()).unwrap()
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

fn tcp(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> Vec<u8> {
    build_tcp_packet(src, dst, sport, dport, b"")
}

fn column(rows: &[Vec<Value>], index: usize) -> Vec<Value> {
    rows.iter().map(|r| r[index].clone()).collect()
}

#[test]
fn test_https_rows_from_mixed_segment() {
    let fixture = Fixture::new();
    fixture.segment(
        1,
        SegmentBuilder::new()
            .packet(10, 0, build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 40001, "a.example"))
            .packet(11, 0, tcp([10, 0, 0, 1], [10, 0, 0, 2], 50001, 443))
            .packet(12, 0, build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 40002, "b.example"))
            .packet(13, 0, tcp([10, 0, 0, 1], [10, 0, 0, 2], 50002, 443))
            .packet(14, 0, build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 40003, "c.example")),
    );
    let engine = fixture.build();

    let result = engine
        .run_at("select tcp.sport, tcp.dport from a where tcp.dport == 443 top 10;", now())
        .unwrap();

    assert_eq!(result.column_names(), vec!["tcp.sport", "tcp.dport"]);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(column(&result.rows, 1), vec![Value::Int(443), Value::Int(443)]);
    assert_eq!(column(&result.rows, 0), vec![Value::Int(50001), Value::Int(50002)]);
    // Only TCP packets survive the index scan
    assert_eq!(result.searched_count, 2);
    assert_eq!(result.errors, vec![NO_ERRORS]);
}

#[test]
fn test_count_packets_in_network() {
    let fixture = Fixture::new();
    let mut segment = SegmentBuilder::new();
    for host in 1..=4u8 {
        segment.push(u32::from(host), 0, tcp([10, 0, 0, 1], [192, 168, 1, host], 5000, 80));
    }
    for host in 1..=6u8 {
        segment.push(100 + u32::from(host), 0, tcp([10, 0, 0, 1], [192, 168, 2, host], 5000, 80));
    }
    fixture.segment(1, segment);
    let engine = fixture.build();

    let result = engine
        .run_at("select count() as PKT_TOTAL from a where ip.dst == 192.168.1.0/24;", now())
        .unwrap();

    assert_eq!(result.column_names(), vec!["PKT_TOTAL"]);
    assert_eq!(result.rows, vec![vec![Value::Int(4)]]);
    assert_eq!(result.matched_count, 4);
    assert_eq!(result.searched_count, 4);
}

#[test]
fn test_ip_literal_policies() {
    let a = [10, 0, 0, 1];
    let b = [10, 0, 0, 9];
    let fixture = Fixture::new();
    fixture.segment(
        1,
        SegmentBuilder::new()
            .packet(1, 0, tcp(a, b, 1, 80))
            .packet(2, 0, tcp(a, [10, 0, 0, 7], 2, 80))
            .packet(3, 0, tcp([10, 0, 0, 5], b, 3, 80)),
    );
    let engine = fixture.build();

    // Both roles: both sides must match
    let both = engine
        .run_at("select tcp.sport from a where ip.src == 10.0.0.1 and ip.dst == 10.0.0.9;", now())
        .unwrap();
    assert_eq!(both.searched_count, 1);
    assert_eq!(both.rows, vec![vec![Value::Int(1)]]);

    // One role: the other side is not checked
    let src_only = engine
        .run_at("select tcp.sport from a where ip.src == 10.0.0.1;", now())
        .unwrap();
    assert_eq!(src_only.searched_count, 2);
    assert_eq!(column(&src_only.rows, 0), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_group_by_aggregates() {
    let fixture = Fixture::new();
    fixture.segment(
        1,
        SegmentBuilder::new()
            .packet(1, 0, tcp([10, 0, 0, 2], [10, 0, 0, 9], 1, 80))
            .packet(2, 0, tcp([10, 0, 0, 1], [10, 0, 0, 9], 2, 80))
            .packet(3, 0, tcp([10, 0, 0, 2], [10, 0, 0, 9], 3, 80)),
    );
    fixture.segment(
        2,
        SegmentBuilder::new().packet(4, 0, tcp([10, 0, 0, 2], [10, 0, 0, 9], 4, 80)),
    );
    let engine = fixture.build();

    let result = engine
        .run_at(
            "select ip.src, count() as n, sum(frame.len) as bytes, max(tcp.sport) from a group by ip.src;",
            now(),
        )
        .unwrap();

    assert_eq!(result.column_names(), vec!["ip.src", "n", "bytes", "max(tcp.sport)"]);
    assert_eq!(
        result.rows,
        vec![
            vec![Value::Int(0x0A00_0001), Value::Int(1), Value::Int(54), Value::Int(2)],
            vec![Value::Int(0x0A00_0002), Value::Int(3), Value::Int(162), Value::Int(4)],
        ]
    );
}

#[test]
fn test_count_without_matches_is_zero() {
    let fixture = Fixture::new();
    fixture.segment(1, SegmentBuilder::new().packet(1, 0, tcp([10, 0, 0, 1], [10, 0, 0, 2], 1, 80)));
    let engine = fixture.build();

    let result = engine
        .run_at("select count() from a where tcp.dport == 9999;", now())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(0)]]);
    assert_eq!(result.matched_count, 0);
    assert_eq!(result.min_ts, None);
}

#[test]
fn test_distinct_and_limit() {
    let fixture = Fixture::new();
    let mut segment = SegmentBuilder::new();
    for (i, dport) in [80u16, 443, 80, 22, 443, 25].into_iter().enumerate() {
        segment.push(i as u32, 0, tcp([10, 0, 0, 1], [10, 0, 0, 2], 1000, dport));
    }
    fixture.segment(1, segment);
    let engine = fixture.build();

    let distinct = engine
        .run_at("select distinct tcp.dport from a;", now())
        .unwrap();
    assert_eq!(
        column(&distinct.rows, 0),
        vec![Value::Int(80), Value::Int(443), Value::Int(22), Value::Int(25)]
    );
    assert_eq!(distinct.fingerprints.len(), 4);

    let limited = engine
        .run_at("select tcp.dport from a order by tcp.dport limit 1, 3;", now())
        .unwrap();
    assert_eq!(
        column(&limited.rows, 0),
        vec![Value::Int(25), Value::Int(80), Value::Int(80)]
    );
}

#[test]
fn test_results_follow_segment_order() {
    let fixture = Fixture::new();
    for id in [3u32, 1, 2] {
        fixture.segment(
            id,
            SegmentBuilder::new()
                .packet(id, 0, tcp([10, 0, 0, 1], [10, 0, 0, 2], id as u16, 80))
                .packet(id, 1, tcp([10, 0, 0, 1], [10, 0, 0, 2], 100 + id as u16, 80)),
        );
    }
    let engine = fixture.build();

    let result = engine.run_at("select tcp.sport from a;", now()).unwrap();
    assert_eq!(
        column(&result.rows, 0),
        [1, 101, 2, 102, 3, 103].map(Value::Int).to_vec()
    );
    assert_eq!(result.min_ts, Some(1_000_000));
    assert_eq!(result.max_ts, Some(3_000_001));
}

#[test]
fn test_missing_segment_index_is_reported() {
    let fixture = Fixture::new();
    fixture
        .segment(1, SegmentBuilder::new().packet(1, 0, tcp([10, 0, 0, 1], [10, 0, 0, 2], 1, 80)))
        .segment(2, SegmentBuilder::new().packet(2, 0, tcp([10, 0, 0, 1], [10, 0, 0, 2], 2, 80)));
    let engine = fixture.build();
    std::fs::remove_file(fixture.config.index_dir().join("segment_2.sqlite")).unwrap();

    let result = engine.run_at("select tcp.sport from a;", now()).unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
    assert!(result.has_errors());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("segment 2:"));
}

#[test]
fn test_fatal_errors() {
    let fixture = Fixture::new();
    let engine = QueryEngine::new(fixture.config.clone()).unwrap();

    let err = engine.run_at("select * from a;", now()).unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::MissingMaster { .. })));

    let err = engine.run_at("select * where tcp;", now()).unwrap_err();
    let Error::Parse(parse) = err else {
        panic!("expected parse error, got {err:?}");
    };
    assert_eq!(parse.line, 1);
    assert_eq!(parse.token, "where");
}
