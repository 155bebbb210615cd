//! File-backed stores.
//!
//! The log is one append-only file of checksummed frames. Snapshots are one
//! file per height, written to a temp file and renamed into place.

use crate::domain::errors::LogError;
use crate::domain::record::{encode_frame, scan_frames};
use crate::domain::snapshot::Snapshot;
use crate::ports::outbound::{LogStore, SnapshotStore};
use shared_types::CertifiedEntry;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Append-only log file.
pub struct FileLogStore {
    path: PathBuf,
    file: File,
    /// `fsync` after every append.
    sync_writes: bool,
    /// End of the last complete frame; bytes past it are never kept.
    end: u64,
}

impl FileLogStore {
    /// Open or create the log file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let end = file.metadata()?.len();
        Ok(Self {
            path,
            file,
            sync_writes: true,
            end,
        })
    }

    /// Toggle `fsync` per append (tests turn it off).
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.file.write_all(frame)?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Cut the file back to the last complete frame. Failing to do so
    /// leaves garbage mid-log, so it is reported as corruption.
    fn rewind(&mut self) -> Result<(), LogError> {
        self.file
            .set_len(self.end)
            .and_then(|_| self.file.sync_all())
            .map_err(|e| LogError::Corrupted {
                offset: self.end,
                reason: format!("cannot discard partial frame: {e}"),
            })
    }
}

impl LogStore for FileLogStore {
    fn load(&mut self) -> Result<Vec<CertifiedEntry>, LogError> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;

        let scan = scan_frames::<CertifiedEntry>(&bytes)?;
        if scan.torn_tail {
            warn!(
                path = %self.path.display(),
                kept_bytes = scan.valid_len,
                dropped_bytes = bytes.len() as u64 - scan.valid_len,
                "Truncating torn tail of replication log"
            );
            self.file.set_len(scan.valid_len)?;
            self.file.sync_all()?;
        }
        self.end = scan.valid_len;

        info!(
            path = %self.path.display(),
            records = scan.values.len(),
            "Loaded replication log"
        );
        Ok(scan.values)
    }

    fn append(&mut self, entry: &CertifiedEntry) -> Result<(), LogError> {
        let frame = encode_frame(entry)?;
        let on_disk = self.file.metadata()?.len();
        if on_disk != self.end {
            warn!(
                path = %self.path.display(),
                expected = self.end,
                on_disk,
                "Discarding bytes after the last complete frame"
            );
            self.rewind()?;
        }

        if let Err(e) = self.write_frame(&frame) {
            self.rewind()?;
            return Err(e.into());
        }
        self.end += frame.len() as u64;
        Ok(())
    }
}

/// Directory of `snapshot-<height>.bin` files.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Use (and create) `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, LogError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, height: u64) -> PathBuf {
        self.dir.join(format!("snapshot-{height:020}.bin"))
    }

    /// Heights present on disk, ascending.
    pub fn heights(&self) -> Result<Vec<u64>, LogError> {
        let mut heights = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let name = dirent?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(height) = name
                .strip_prefix("snapshot-")
                .and_then(|rest| rest.strip_suffix(".bin"))
                .and_then(|digits| digits.parse::<u64>().ok())
            else {
                continue;
            };
            heights.push(height);
        }
        heights.sort_unstable();
        Ok(heights)
    }

    fn read(&self, height: u64) -> Result<Snapshot, LogError> {
        let bytes = fs::read(self.file_for(height))?;
        let scan = scan_frames::<Snapshot>(&bytes)?;
        match (scan.torn_tail, scan.values.into_iter().next()) {
            (false, Some(snapshot)) if snapshot.height == height => Ok(snapshot),
            _ => Err(LogError::Corrupted {
                offset: 0,
                reason: format!("unreadable snapshot at height {height}"),
            }),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), LogError> {
        let frame = encode_frame(snapshot)?;
        let target = self.file_for(snapshot.height);
        let temp = target.with_extension("tmp");

        let mut file = File::create(&temp)?;
        file.write_all(&frame)?;
        file.sync_all()?;
        fs::rename(&temp, &target)?;

        info!(height = snapshot.height, "Snapshot written");
        Ok(())
    }

    fn latest_at_or_below(&self, height: u64) -> Result<Option<Snapshot>, LogError> {
        for candidate in self.heights()?.into_iter().rev().filter(|h| *h <= height) {
            match self.read(candidate) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) => warn!(height = candidate, error = %e, "Skipping unreadable snapshot"),
            }
        }
        Ok(None)
    }

    fn prune(&mut self, keep: usize) -> Result<(), LogError> {
        let heights = self.heights()?;
        let excess = heights.len().saturating_sub(keep);
        for height in heights.into_iter().take(excess) {
            fs::remove_file(self.file_for(height))?;
        }
        Ok(())
    }
}
