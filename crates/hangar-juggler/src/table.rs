use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use crate::error::JugglerError;
use crate::session::Transfer;

/// A file DRIVER has told JUGGLER to expect, recorded when DRIVER logs a
/// successful build — before the builder ever opens a connection to
/// JUGGLER's socket. A build can produce several files; each gets queued in
/// the order DRIVER announces them, matching the order the builder's
/// `SEND`/`SENT` loop will send them in.
struct Expectation {
    filename: String,
    sha256: String,
    size: u64,
}

/// `slave_id → in-progress transfer`, plus a FIFO of file metadata announced
/// ahead of the builder's per-file `FILE_HELLO`. Owned by JUGGLER's single
/// thread.
pub struct JugglerTable {
    expectations: HashMap<u64, VecDeque<Expectation>>,
    transfers: HashMap<u64, Transfer>,
    packages_dir: PathBuf,
}

impl JugglerTable {
    pub fn new(packages_dir: PathBuf) -> Self {
        JugglerTable {
            expectations: HashMap::new(),
            transfers: HashMap::new(),
            packages_dir,
        }
    }

    pub fn expect(&mut self, slave_id: u64, filename: String, sha256: String, size: u64) {
        self.expectations
            .entry(slave_id)
            .or_default()
            .push_back(Expectation { filename, sha256, size });
    }

    /// Begin the transfer for the next file queued for `slave_id`. Any
    /// existing writer for this slave is dropped first, matching the
    /// protocol's "HELLO reclaims any existing writer" rule.
    pub fn begin(&mut self, slave_id: u64) -> Result<&mut Transfer, JugglerError> {
        self.transfers.remove(&slave_id);
        let queue = self.expectations.get_mut(&slave_id).ok_or(JugglerError::NoTransfer(slave_id))?;
        let expectation = queue.pop_front().ok_or(JugglerError::NoTransfer(slave_id))?;
        if queue.is_empty() {
            self.expectations.remove(&slave_id);
        }
        let transfer = Transfer::open(slave_id, expectation.filename, expectation.sha256, expectation.size, &self.packages_dir)?;
        self.transfers.insert(slave_id, transfer);
        Ok(self.transfers.get_mut(&slave_id).expect("just inserted"))
    }

    pub fn get_mut(&mut self, slave_id: u64) -> Option<&mut Transfer> {
        self.transfers.get_mut(&slave_id)
    }

    pub fn remove(&mut self, slave_id: u64) -> Option<Transfer> {
        self.transfers.remove(&slave_id)
    }

    /// Drop any in-progress transfer and queued expectations for `slave_id`,
    /// deleting its partial file. Called when DRIVER reports the builder's
    /// session expired mid-transfer.
    pub fn abort(&mut self, slave_id: u64) {
        self.expectations.remove(&slave_id);
        if let Some(transfer) = self.transfers.remove(&slave_id) {
            if let Err(e) = transfer.abort() {
                tracing::warn!(slave_id, error = %e, "failed to remove partial transfer file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn begin_without_expectation_fails() {
        let dir = tempdir().unwrap();
        let mut table = JugglerTable::new(dir.path().to_path_buf());
        assert!(matches!(table.begin(1), Err(JugglerError::NoTransfer(1))));
    }

    #[test]
    fn begin_reclaims_any_existing_writer() {
        let dir = tempdir().unwrap();
        let mut table = JugglerTable::new(dir.path().to_path_buf());
        table.expect(1, "a.whl".into(), "hash-a".into(), 10);
        table.begin(1).unwrap();
        assert!(table.get_mut(1).is_some());

        // A second FILE_HELLO before the first transfer finishes reclaims
        // the writer and moves straight on to the next queued file.
        table.expect(1, "b.whl".into(), "hash-b".into(), 20);
        let transfer = table.begin(1).unwrap();
        assert_eq!(transfer.filename, "b.whl");
    }

    #[test]
    fn abort_removes_in_progress_transfer_and_its_partial_file() {
        let dir = tempdir().unwrap();
        let mut table = JugglerTable::new(dir.path().to_path_buf());
        table.expect(1, "a.whl".into(), "hash-a".into(), 10);
        table.begin(1).unwrap();
        assert!(dir.path().join("a.part").exists());

        table.abort(1);
        assert!(table.get_mut(1).is_none());
        assert!(!dir.path().join("a.part").exists());
    }

    #[test]
    fn abort_also_drops_any_queued_expectations() {
        let dir = tempdir().unwrap();
        let mut table = JugglerTable::new(dir.path().to_path_buf());
        table.expect(1, "a.whl".into(), "hash-a".into(), 10);
        table.expect(1, "b.whl".into(), "hash-b".into(), 20);
        table.begin(1).unwrap();

        table.abort(1);
        assert!(matches!(table.begin(1), Err(JugglerError::NoTransfer(1))));
    }

    #[test]
    fn multiple_expectations_for_one_slave_are_served_in_order() {
        let dir = tempdir().unwrap();
        let mut table = JugglerTable::new(dir.path().to_path_buf());
        table.expect(1, "a.whl".into(), "hash-a".into(), 10);
        table.expect(1, "b.whl".into(), "hash-b".into(), 20);

        assert_eq!(table.begin(1).unwrap().filename, "a.whl");
        assert_eq!(table.begin(1).unwrap().filename, "b.whl");
        assert!(matches!(table.begin(1), Err(JugglerError::NoTransfer(1))));
    }
}
