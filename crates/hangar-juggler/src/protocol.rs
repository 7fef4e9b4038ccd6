use hangar_transport::value::Value;
use hangar_transport::Message;

use crate::error::JugglerError;
use crate::session::ChunkOutcome;
use crate::table::JugglerTable;

/// Raised to DRIVER over the internal PUSH channel once a transfer either
/// verifies or fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JugglerEvent {
    Verified(String),
    Rejected(String),
}

fn fetch_messages(fetches: Vec<(u64, u64)>) -> Result<Vec<Message>, JugglerError> {
    fetches
        .into_iter()
        .map(|(offset, len)| Message::new("FETCH", vec![Value::Int(offset as i64), Value::Int(len as i64)]).map_err(JugglerError::from))
        .collect()
}

/// HELLO(slave_id): (re)start the transfer JUGGLER was told to expect and
/// issue up to `window` pipelined FETCHes.
pub fn handle_hello(
    table: &mut JugglerTable,
    slave_id: u64,
    window: usize,
    chunk_size: u64,
) -> Result<Vec<Message>, JugglerError> {
    let transfer = table.begin(slave_id)?;
    fetch_messages(transfer.fill_window(window, chunk_size))
}

/// CHUNK(bytes) for the FETCH at `offset`. Writes the bytes, tops the fetch
/// window back up, and on completion reports whether the hash matched.
pub fn handle_chunk(
    table: &mut JugglerTable,
    slave_id: u64,
    offset: u64,
    data: &[u8],
    window: usize,
    chunk_size: u64,
) -> Result<(Vec<Message>, Option<JugglerEvent>), JugglerError> {
    let transfer = table.get_mut(slave_id).ok_or(JugglerError::NoTransfer(slave_id))?;
    match transfer.write_chunk(offset, data)? {
        ChunkOutcome::Incomplete => {
            let fetches = fetch_messages(transfer.fill_window(window, chunk_size))?;
            Ok((fetches, None))
        }
        ChunkOutcome::Verified => {
            let filename = transfer.filename.clone();
            Ok((vec![Message::bare("DONE")?], Some(JugglerEvent::Verified(filename))))
        }
        ChunkOutcome::Rejected => {
            let filename = transfer.filename.clone();
            Ok((vec![Message::bare("DONE")?], Some(JugglerEvent::Rejected(filename))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hello_issues_fetches_up_to_the_window() {
        let dir = tempdir().unwrap();
        let mut table = JugglerTable::new(dir.path().to_path_buf());
        table.expect(1, "pkg.whl".into(), "hash".into(), 1000);

        let fetches = handle_hello(&mut table, 1, 4, 256).unwrap();
        assert_eq!(fetches.len(), 4);
        assert_eq!(fetches[0].tag, "FETCH");
    }

    #[test]
    fn chunk_to_unknown_slave_is_an_error() {
        let dir = tempdir().unwrap();
        let mut table = JugglerTable::new(dir.path().to_path_buf());
        let err = handle_chunk(&mut table, 99, 0, &[1, 2, 3], 4, 256).unwrap_err();
        assert!(matches!(err, JugglerError::NoTransfer(99)));
    }
}
