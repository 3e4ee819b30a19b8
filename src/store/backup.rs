//! Full-store backup dumps with retention pruning.
//!
//! A dump is the bincode encoding of every record tree, gzip-compressed and
//! written atomically (temp file + rename). File names embed the creation
//! time so pruning never has to open an archive.

use std::fs;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;
use tracing::warn;

use super::SledCirculationStore;
use crate::constants::BACKUP_FILE_PREFIX;
use crate::utils::time::unix_secs;
use crate::Result;
use crate::StorageError;

/// Centralized naming conventions for backup files.
#[derive(Debug)]
pub(crate) struct BackupPathManager {
    pub(crate) base_dir: PathBuf,
    pub(crate) prefix: String,
    pub(crate) temp_prefix: String,
}

impl BackupPathManager {
    pub(crate) fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            prefix: BACKUP_FILE_PREFIX.to_string(),
            temp_prefix: "temp-".to_string(),
        }
    }

    pub(crate) fn final_backup_path(
        &self,
        created_secs: u64,
    ) -> PathBuf {
        self.base_dir
            .join(format!("{}{}.bin.gz", self.prefix, created_secs))
    }

    pub(crate) fn temp_work_path(
        &self,
        created_secs: u64,
    ) -> PathBuf {
        self.base_dir
            .join(format!("{}{}.bin.gz", self.temp_prefix, created_secs))
    }

    /// Extracts the creation time from a backup filename.
    pub(crate) fn parse_backup_filename(
        &self,
        filename: &str,
    ) -> Option<u64> {
        let stripped = filename.strip_prefix(&self.prefix)?;
        stripped.split('.').next()?.parse().ok()
    }
}

#[derive(Debug)]
pub struct BackupSummary {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration: Duration,
    pub pruned: usize,
}

impl std::fmt::Display for BackupSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{} ({} bytes in {:?}, pruned {})",
            self.path.display(),
            self.size_bytes,
            self.duration,
            self.pruned
        )
    }
}

pub struct BackupManager {
    store: Arc<SledCirculationStore>,
    paths: BackupPathManager,
    retention: chrono::Duration,
}

impl BackupManager {
    pub fn new(
        store: Arc<SledCirculationStore>,
        backup_dir: PathBuf,
        retention_days: i64,
    ) -> Self {
        Self {
            store,
            paths: BackupPathManager::new(backup_dir),
            retention: chrono::Duration::days(retention_days),
        }
    }

    /// Dumps the whole store, then prunes archives older than the retention
    /// window. Returns size and duration for the admin report.
    pub fn run(&self) -> Result<BackupSummary> {
        let started = Instant::now();
        let created_secs = unix_secs();
        fs::create_dir_all(&self.paths.base_dir).map_err(|e| StorageError::PathError {
            path: self.paths.base_dir.clone(),
            source: e,
        })?;

        let dump = self.store.export_trees()?;
        let encoded = bincode::serialize(&dump)?;

        let temp_path = self.paths.temp_work_path(created_secs);
        let final_path = self.paths.final_backup_path(created_secs);
        {
            let file = fs::File::create(&temp_path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&encoded)?;
            encoder.finish()?;
        }
        fs::rename(&temp_path, &final_path)?;

        let size_bytes = fs::metadata(&final_path)?.len();
        let pruned = self.prune(created_secs)?;
        let summary = BackupSummary {
            path: final_path,
            size_bytes,
            duration: started.elapsed(),
            pruned,
        };
        info!("backup finished: {}", summary);
        Ok(summary)
    }

    /// Removes archives older than the retention window.
    fn prune(
        &self,
        now_secs: u64,
    ) -> Result<usize> {
        let cutoff = now_secs.saturating_sub(self.retention.num_seconds().max(0) as u64);
        let mut pruned = 0;
        for entry in fs::read_dir(&self.paths.base_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(created) = self.paths.parse_backup_filename(name) else {
                continue;
            };
            if created < cutoff {
                match fs::remove_file(entry.path()) {
                    Ok(()) => pruned += 1,
                    Err(e) => warn!(path = %entry.path().display(), ?e, "failed to prune backup"),
                }
            }
        }
        Ok(pruned)
    }

    /// Loads an archive into the store. Intended for a freshly opened,
    /// empty database.
    pub fn restore(
        &self,
        path: &Path,
    ) -> Result<()> {
        let file = fs::File::open(path).map_err(|e| StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut decoder = GzDecoder::new(file);
        let mut encoded = Vec::new();
        decoder
            .read_to_end(&mut encoded)
            .map_err(|e| StorageError::Backup(format!("archive decompression failed: {e}")))?;
        let dump = bincode::deserialize(&encoded)?;
        self.store.import_trees(dump)?;
        info!(path = %path.display(), "store restored from backup");
        Ok(())
    }
}
