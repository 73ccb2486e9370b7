//! Directory of capture segments.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::SegmentFile;

const SEGMENT_EXTENSION: &str = "pcap";

/// The directory holding segment files named `<id>.pcap`.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    dir: PathBuf,
}

impl SegmentStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the segment file for `id`.
    pub fn path_for(&self, id: u32) -> PathBuf {
        self.dir.join(format!("{id}.{SEGMENT_EXTENSION}"))
    }

    /// All segment ids present in the directory, ascending.
    ///
    /// Files whose stem is not a number are ignored.
    pub fn list_segments(&self) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(Error::Io)? {
            let path = entry.map_err(Error::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Open the segment with the given id.
    pub fn open(&self, id: u32) -> Result<SegmentFile> {
        SegmentFile::open(self.path_for(id))
    }
}
