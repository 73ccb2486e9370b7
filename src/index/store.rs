//! SQLite persistence for segment indexes and the master index.
//!
//! ```text
//! <index_dir>/segment_<id>.sqlite   packets(id, timestamp, byte_offset, bitmask,
//!                                           ip_dst, ip_src, header_len, dest_port, src_port)
//! <index_dir>/master.sqlite         master_index(id, start_ts, end_ts, segment_id)
//! ```
//!
//! Every write drops and recreates its table inside one transaction, so a
//! reader sees either the previous index or the complete new one.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};

use super::bitmask::ProtocolMask;
use super::record::{MasterIndexEntry, ProtocolIndexRecord};
use crate::error::StoreError;
use crate::query::IpLiterals;

type StoreResult<T> = std::result::Result<T, StoreError>;

const CREATE_PACKETS: &str = "
    DROP TABLE IF EXISTS packets;
    CREATE TABLE packets (
        id INTEGER PRIMARY KEY,
        timestamp INTEGER NOT NULL,
        byte_offset INTEGER NOT NULL,
        bitmask INTEGER NOT NULL,
        ip_dst INTEGER NOT NULL,
        ip_src INTEGER NOT NULL,
        header_len INTEGER NOT NULL,
        dest_port INTEGER NOT NULL,
        src_port INTEGER NOT NULL
    );";

const INDEX_PACKETS: &str = "
    CREATE INDEX idx_packets_ip_src ON packets (ip_src);
    CREATE INDEX idx_packets_ip_dst ON packets (ip_dst);
    CREATE INDEX idx_packets_bitmask ON packets (bitmask);";

const CREATE_MASTER: &str = "
    DROP TABLE IF EXISTS master_index;
    CREATE TABLE master_index (
        id INTEGER PRIMARY KEY,
        start_ts INTEGER NOT NULL,
        end_ts INTEGER NOT NULL,
        segment_id INTEGER NOT NULL
    );
    CREATE INDEX idx_master_range ON master_index (start_ts, end_ts);";

const SELECT_PACKETS: &str = "
    SELECT timestamp, byte_offset, bitmask, ip_dst, ip_src, header_len, dest_port, src_port
    FROM packets";

/// Index databases in one directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn segment_path(&self, segment_id: u32) -> PathBuf {
        self.dir.join(format!("segment_{segment_id}.sqlite"))
    }

    pub fn master_path(&self) -> PathBuf {
        self.dir.join("master.sqlite")
    }

    /// Replace the index of one segment.
    pub fn write_segment(
        &self,
        segment_id: u32,
        records: &[ProtocolIndexRecord],
    ) -> StoreResult<()> {
        let mut conn = Connection::open(self.segment_path(segment_id))?;
        let tx = conn.transaction()?;
        tx.execute_batch(CREATE_PACKETS)?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO packets
                     (timestamp, byte_offset, bitmask, ip_dst, ip_src, header_len, dest_port, src_port)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for r in records {
                insert.execute(params![
                    r.timestamp as i64,
                    r.byte_offset as i64,
                    r.bitmask as i64,
                    r.ip_dst as i64,
                    r.ip_src as i64,
                    r.header_len as i64,
                    r.dest_port as i64,
                    r.src_port as i64,
                ])?;
            }
        }
        tx.execute_batch(INDEX_PACKETS)?;
        tx.commit()?;
        Ok(())
    }

    /// Records whose bitmask has every bit of `required` and whose
    /// addresses pass `ip_literals`, in file order.
    pub fn scan_segment(
        &self,
        segment_id: u32,
        required: ProtocolMask,
        ip_literals: &IpLiterals,
    ) -> StoreResult<Vec<ProtocolIndexRecord>> {
        let conn = self.open_segment(segment_id)?;
        let mut stmt = conn.prepare_cached(&format!(
            "{SELECT_PACKETS} WHERE (bitmask & ?1) = ?1 ORDER BY byte_offset"
        ))?;
        let rows = stmt.query_map([required.0 as i64], record_from_row)?;

        let mut matched = Vec::new();
        for row in rows {
            let record = row?;
            if ip_literals.matches(record.ip_src, record.ip_dst) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    /// Replace the master index. Entries are stored in segment order.
    pub fn write_master(&self, entries: &[MasterIndexEntry]) -> StoreResult<()> {
        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|e| e.segment_id);

        let mut conn = Connection::open(self.master_path())?;
        let tx = conn.transaction()?;
        tx.execute_batch(CREATE_MASTER)?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO master_index (start_ts, end_ts, segment_id) VALUES (?1, ?2, ?3)",
            )?;
            for e in &sorted {
                insert.execute(params![
                    e.start_ts as i64,
                    e.end_ts as i64,
                    e.segment_id as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Master index entries ordered by segment id.
    pub fn read_master(&self) -> StoreResult<Vec<MasterIndexEntry>> {
        let path = self.master_path();
        if !path.exists() {
            return Err(StoreError::MissingMaster { path });
        }
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare(
            "SELECT segment_id, start_ts, end_ts FROM master_index ORDER BY segment_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MasterIndexEntry {
                segment_id: row.get::<_, i64>(0)? as u32,
                start_ts: row.get::<_, i64>(1)? as u64,
                end_ts: row.get::<_, i64>(2)? as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn open_segment(&self, segment_id: u32) -> StoreResult<Connection> {
        let path = self.segment_path(segment_id);
        if !path.exists() {
            return Err(StoreError::MissingIndex {
                segment: segment_id,
                path,
            });
        }
        Ok(Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?)
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProtocolIndexRecord> {
    Ok(ProtocolIndexRecord {
        timestamp: row.get::<_, i64>(0)? as u64,
        byte_offset: row.get::<_, i64>(1)? as u64,
        bitmask: row.get::<_, i64>(2)? as u64,
        ip_dst: row.get::<_, i64>(3)? as u32,
        ip_src: row.get::<_, i64>(4)? as u32,
        header_len: row.get::<_, i64>(5)? as u16,
        dest_port: row.get::<_, i64>(6)? as u16,
        src_port: row.get::<_, i64>(7)? as u16,
    })
}
