use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::JugglerError;
use crate::rangeset::RangeSet;

/// Outcome of writing one chunk: whether the file is now complete, and if
/// so, whether its hash matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Incomplete,
    Verified,
    Rejected,
}

/// One in-progress incoming file transfer. Writes land at the offset the
/// corresponding FETCH was issued for, not in arrival order — [`RangeSet`]
/// tracks which byte ranges have actually hit disk.
pub struct Transfer {
    pub slave_id: u64,
    pub filename: String,
    expected_sha256: String,
    total_len: u64,
    temp_path: PathBuf,
    final_path: PathBuf,
    file: File,
    written: RangeSet,
    next_fetch_offset: u64,
    outstanding: VecDeque<u64>,
}

impl Transfer {
    pub fn open(
        slave_id: u64,
        filename: String,
        expected_sha256: String,
        total_len: u64,
        packages_dir: &Path,
    ) -> Result<Transfer, JugglerError> {
        let final_path = packages_dir.join(&filename);
        let temp_path = final_path.with_extension("part");
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).map_err(|source| JugglerError::Io { filename: filename.clone(), source })?;
        }
        let file = File::create(&temp_path).map_err(|source| JugglerError::Io { filename: filename.clone(), source })?;
        file.set_len(total_len).map_err(|source| JugglerError::Io { filename: filename.clone(), source })?;

        Ok(Transfer {
            slave_id,
            filename,
            expected_sha256,
            total_len,
            temp_path,
            final_path,
            file,
            written: RangeSet::new(),
            next_fetch_offset: 0,
            outstanding: VecDeque::new(),
        })
    }

    /// Delete the partial on-disk file for an in-progress transfer that will
    /// never complete (the builder's session expired mid-transfer). A
    /// missing temp file is not an error — it may never have been flushed.
    pub fn abort(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.temp_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Issue FETCH requests until `window` are outstanding or the file is
    /// fully requested. Returns the `(offset, length)` pairs to send.
    pub fn fill_window(&mut self, window: usize, chunk_size: u64) -> Vec<(u64, u64)> {
        let mut fetches = Vec::new();
        while self.outstanding.len() < window && self.next_fetch_offset < self.total_len {
            let offset = self.next_fetch_offset;
            let len = chunk_size.min(self.total_len - offset);
            self.outstanding.push_back(offset);
            self.next_fetch_offset += len;
            fetches.push((offset, len));
        }
        fetches
    }

    /// Write one received chunk at `offset`, then check whether the whole
    /// file is now present and, if so, verify its hash.
    pub fn write_chunk(&mut self, offset: u64, data: &[u8]) -> Result<ChunkOutcome, JugglerError> {
        let end = offset + data.len() as u64;
        if end > self.total_len {
            return Err(JugglerError::OutOfBounds {
                filename: self.filename.clone(),
                offset,
                len: data.len() as u64,
                total: self.total_len,
            });
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| JugglerError::Io { filename: self.filename.clone(), source })?;
        self.file
            .write_all(data)
            .map_err(|source| JugglerError::Io { filename: self.filename.clone(), source })?;

        self.outstanding.retain(|&o| o != offset);
        self.written.insert(offset, data.len() as u64);

        if !self.written.is_complete(self.total_len) {
            return Ok(ChunkOutcome::Incomplete);
        }

        self.file.sync_all().map_err(|source| JugglerError::Io { filename: self.filename.clone(), source })?;
        if self.verify_hash()? {
            self.finalize()?;
            Ok(ChunkOutcome::Verified)
        } else {
            Ok(ChunkOutcome::Rejected)
        }
    }

    fn verify_hash(&self) -> Result<bool, JugglerError> {
        let file = File::open(&self.temp_path).map_err(|source| JugglerError::Io { filename: self.filename.clone(), source })?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 65_536];
        loop {
            let n = reader.read(&mut buf).map_err(|source| JugglerError::Io { filename: self.filename.clone(), source })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let digest = hex_encode(&hasher.finalize());
        Ok(digest == self.expected_sha256)
    }

    /// Atomic rename into place, matching the `.tmp` → `sync_all` →
    /// `rename` → fsync-parent convention used for every other durable
    /// write in this workspace.
    fn finalize(&self) -> Result<(), JugglerError> {
        fs::rename(&self.temp_path, &self.final_path)
            .map_err(|source| JugglerError::Io { filename: self.filename.clone(), source })?;
        if let Some(parent) = self.final_path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }

    /// True while the builder may still reopen this file — it hasn't yet
    /// been told DONE by DRIVER.
    pub fn is_complete(&self) -> bool {
        self.written.is_complete(self.total_len)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sha256_hex(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex_encode(&hasher.finalize())
    }

    #[test]
    fn fill_window_bounds_outstanding_fetches() {
        let dir = tempdir().unwrap();
        let mut t = Transfer::open(1, "numpy.whl".into(), "deadbeef".into(), 100, dir.path()).unwrap();
        let fetches = t.fill_window(2, 40);
        assert_eq!(fetches, vec![(0, 40), (40, 40)]);
        // Window full: no more issued until a chunk completes.
        assert!(t.fill_window(2, 40).is_empty());
    }

    #[test]
    fn out_of_order_chunks_complete_and_verify() {
        let dir = tempdir().unwrap();
        let data = b"the quick brown fox jumps over the lazy dog, repeated enough to span chunks";
        let hash = sha256_hex(data);
        let mut t = Transfer::open(1, "pkg.whl".into(), hash, data.len() as u64, dir.path()).unwrap();

        let mid = data.len() / 2;
        let outcome1 = t.write_chunk(mid as u64, &data[mid..]).unwrap();
        assert_eq!(outcome1, ChunkOutcome::Incomplete);
        let outcome2 = t.write_chunk(0, &data[..mid]).unwrap();
        assert_eq!(outcome2, ChunkOutcome::Verified);

        let written = fs::read(dir.path().join("pkg.whl")).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn hash_mismatch_is_rejected_and_not_renamed() {
        let dir = tempdir().unwrap();
        let data = b"some file contents";
        let mut t = Transfer::open(1, "bad.whl".into(), "0".repeat(64), data.len() as u64, dir.path()).unwrap();
        let outcome = t.write_chunk(0, data).unwrap();
        assert_eq!(outcome, ChunkOutcome::Rejected);
        assert!(!dir.path().join("bad.whl").exists());
    }

    #[test]
    fn abort_deletes_the_partial_file() {
        let dir = tempdir().unwrap();
        let t = Transfer::open(1, "numpy.whl".into(), "deadbeef".into(), 100, dir.path()).unwrap();
        assert!(dir.path().join("numpy.part").exists());
        t.abort().unwrap();
        assert!(!dir.path().join("numpy.part").exists());
    }

    #[test]
    fn abort_on_an_already_removed_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let t = Transfer::open(1, "numpy.whl".into(), "deadbeef".into(), 100, dir.path()).unwrap();
        fs::remove_file(dir.path().join("numpy.part")).unwrap();
        t.abort().unwrap();
    }

    #[test]
    fn out_of_bounds_write_is_an_error() {
        let dir = tempdir().unwrap();
        let mut t = Transfer::open(1, "small.whl".into(), "x".into(), 4, dir.path()).unwrap();
        let err = t.write_chunk(2, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, JugglerError::OutOfBounds { .. }));
    }
}
