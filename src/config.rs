//! Engine configuration.

use std::path::{Path, PathBuf};
use std::thread;

/// Where segments and indexes live, and how much parallelism to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding `<id>.pcap` segment files.
    pub segments_dir: PathBuf,
    /// Directory holding `segment_<id>.sqlite` and `master.sqlite`.
    pub index_dir: PathBuf,
    /// Worker threads for indexing and scanning.
    pub workers: usize,
    /// Skip segments whose time range misses the query's INTERVAL.
    pub prune_by_interval: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segments_dir: PathBuf::from("segments"),
            index_dir: PathBuf::from("index"),
            workers: default_workers(),
            prune_by_interval: false,
        }
    }
}

impl EngineConfig {
    /// Configuration with segments and indexes in the given directories.
    pub fn new<S: Into<PathBuf>, I: Into<PathBuf>>(segments_dir: S, index_dir: I) -> Self {
        Self {
            segments_dir: segments_dir.into(),
            index_dir: index_dir.into(),
            ..Self::default()
        }
    }

    /// Set the worker count. Zero selects the available parallelism.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 { default_workers() } else { workers };
        self
    }

    pub fn with_prune_by_interval(mut self, enabled: bool) -> Self {
        self.prune_by_interval = enabled;
        self
    }

    pub fn segments_dir(&self) -> &Path {
        &self.segments_dir
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.workers >= 1);
        assert!(!config.prune_by_interval);
        assert_eq!(config.segments_dir(), Path::new("segments"));
    }

    #[test]
    fn test_builder_setters() {
        let config = EngineConfig::new("/data/seg", "/data/idx")
            .with_workers(3)
            .with_prune_by_interval(true);
        assert_eq!(config.workers, 3);
        assert!(config.prune_by_interval);
        assert_eq!(config.index_dir(), Path::new("/data/idx"));

        let config = config.with_workers(0);
        assert!(config.workers >= 1);
    }
}
