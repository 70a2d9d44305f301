//! Durable FIFO message queue backed by an embedded `redb` B-tree.
//!
//! Two tables: `messages` (id -> JSON row) and `status_index` (status ->
//! multimap of ids, kept only for the active `queued`/`in_flight` statuses
//! so FIFO dequeue never needs a full table scan). Recovery on open marks
//! any row still `in_flight` as `failed`, per the durability invariant.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use redb::{Database, MultimapTableDefinition, ReadableTable, TableDefinition};

use ax_domain::error::{Error, Result};

use crate::model::{MessageStatus, NewMessage, QueuedMessage};

const MESSAGES: TableDefinition<u64, Vec<u8>> = TableDefinition::new("messages");
const STATUS_INDEX: MultimapTableDefinition<&str, u64> = MultimapTableDefinition::new("status_index");

fn status_key(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Queued => "queued",
        MessageStatus::InFlight => "in_flight",
        MessageStatus::Complete => "complete",
        MessageStatus::Failed => "failed",
    }
}

fn redb_err(e: impl std::fmt::Display) -> Error {
    Error::Queue(e.to_string())
}

pub struct MessageQueue {
    db: Database,
    next_id: AtomicU64,
}

impl MessageQueue {
    /// Open (creating if absent) the queue database at `path`, recovering
    /// any stale in-flight rows left over from an unclean shutdown.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let db = Database::create(path).map_err(redb_err)?;

        let next_id = {
            let txn = db.begin_read().map_err(redb_err)?;
            match txn.open_table(MESSAGES) {
                Ok(table) => {
                    let max = table
                        .iter()
                        .map_err(redb_err)?
                        .next_back()
                        .transpose()
                        .map_err(redb_err)?
                        .map(|(k, _)| k.value())
                        .unwrap_or(0);
                    max + 1
                }
                Err(redb::TableError::TableDoesNotExist(_)) => 1,
                Err(e) => return Err(redb_err(e)),
            }
        };

        let queue = Self {
            db,
            next_id: AtomicU64::new(next_id),
        };
        queue.recover_stale()?;
        Ok(queue)
    }

    fn recover_stale(&self) -> Result<()> {
        let stale_ids: Vec<u64> = {
            let txn = self.db.begin_read().map_err(redb_err)?;
            match txn.open_multimap_table(STATUS_INDEX) {
                Ok(index) => index
                    .get(status_key(MessageStatus::InFlight))
                    .map_err(redb_err)?
                    .map(|v| v.map(|g| g.value()).map_err(redb_err))
                    .collect::<Result<Vec<u64>>>()?,
                Err(redb::TableError::TableDoesNotExist(_)) => Vec::new(),
                Err(e) => return Err(redb_err(e)),
            }
        };

        for id in stale_ids {
            tracing::warn!(id, "recovering stale in-flight row as failed");
            self.fail(id)?;
        }
        Ok(())
    }

    /// Insert a new row in `queued` status. Returns its assigned id.
    pub fn enqueue(&self, msg: NewMessage) -> Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = QueuedMessage {
            id,
            session_id: msg.session_id,
            session_key: msg.session_key,
            sender: msg.sender,
            channel: msg.channel,
            content: msg.content,
            status: MessageStatus::Queued,
            enqueued_at: chrono::Utc::now(),
        };

        let txn = self.db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(MESSAGES).map_err(redb_err)?;
            let bytes = serde_json::to_vec(&row)?;
            table.insert(id, bytes).map_err(redb_err)?;

            let mut index = txn.open_multimap_table(STATUS_INDEX).map_err(redb_err)?;
            index
                .insert(status_key(MessageStatus::Queued), id)
                .map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(id)
    }

    /// Pop the lowest-id `queued` row and mark it `in_flight`. FIFO by id
    /// (ids are assigned in arrival order).
    pub fn dequeue(&self) -> Result<Option<QueuedMessage>> {
        let candidate = {
            let txn = self.db.begin_read().map_err(redb_err)?;
            match txn.open_multimap_table(STATUS_INDEX) {
                Ok(index) => index
                    .get(status_key(MessageStatus::Queued))
                    .map_err(redb_err)?
                    .next()
                    .transpose()
                    .map_err(redb_err)?
                    .map(|g| g.value()),
                Err(redb::TableError::TableDoesNotExist(_)) => None,
                Err(e) => return Err(redb_err(e)),
            }
        };

        match candidate {
            Some(id) => self.dequeue_by_id(id),
            None => Ok(None),
        }
    }

    /// Transition a specific `queued` row to `in_flight` and return it.
    pub fn dequeue_by_id(&self, id: u64) -> Result<Option<QueuedMessage>> {
        let txn = self.db.begin_write().map_err(redb_err)?;
        let row = {
            let mut table = txn.open_table(MESSAGES).map_err(redb_err)?;
            let Some(existing) = table.get(id).map_err(redb_err)? else {
                return Ok(None);
            };
            let mut row: QueuedMessage = serde_json::from_slice(&existing.value())?;
            drop(existing);
            if row.status != MessageStatus::Queued {
                return Ok(None);
            }
            row.status = MessageStatus::InFlight;
            table.insert(id, serde_json::to_vec(&row)?).map_err(redb_err)?;
            row
        };

        {
            let mut index = txn.open_multimap_table(STATUS_INDEX).map_err(redb_err)?;
            index
                .remove(status_key(MessageStatus::Queued), id)
                .map_err(redb_err)?;
            index
                .insert(status_key(MessageStatus::InFlight), id)
                .map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(Some(row))
    }

    /// Mark an in-flight row `complete`.
    pub fn complete(&self, id: u64) -> Result<()> {
        self.transition(id, MessageStatus::Complete)
    }

    /// Mark an in-flight row `failed`.
    pub fn fail(&self, id: u64) -> Result<()> {
        self.transition(id, MessageStatus::Failed)
    }

    fn transition(&self, id: u64, to: MessageStatus) -> Result<()> {
        let txn = self.db.begin_write().map_err(redb_err)?;
        let from = {
            let mut table = txn.open_table(MESSAGES).map_err(redb_err)?;
            let Some(existing) = table.get(id).map_err(redb_err)? else {
                return Err(Error::Queue(format!("no such message id {id}")));
            };
            let mut row: QueuedMessage = serde_json::from_slice(&existing.value())?;
            drop(existing);
            let from = row.status;
            row.status = to;
            table.insert(id, serde_json::to_vec(&row)?).map_err(redb_err)?;
            from
        };

        {
            let mut index = txn.open_multimap_table(STATUS_INDEX).map_err(redb_err)?;
            index.remove(status_key(from), id).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)?;
        Ok(())
    }

    /// Fetch a row by id regardless of status.
    pub fn get(&self, id: u64) -> Result<Option<QueuedMessage>> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = match txn.open_table(MESSAGES) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(redb_err(e)),
        };
        match table.get(id).map_err(redb_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(&v.value())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_msg(session: &str, content: &str) -> NewMessage {
        NewMessage {
            session_id: session.into(),
            session_key: session.into(),
            sender: "user".into(),
            channel: "http".into(),
            content: content.into(),
        }
    }

    #[test]
    fn enqueue_then_dequeue_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let q = MessageQueue::open(&dir.path().join("q.redb")).unwrap();
        let a = q.enqueue(new_msg("s1", "first")).unwrap();
        let b = q.enqueue(new_msg("s1", "second")).unwrap();
        assert!(a < b);

        let first = q.dequeue().unwrap().unwrap();
        assert_eq!(first.id, a);
        assert_eq!(first.status, MessageStatus::InFlight);

        let second = q.dequeue().unwrap().unwrap();
        assert_eq!(second.id, b);

        assert!(q.dequeue().unwrap().is_none());
    }

    #[test]
    fn dequeue_by_id_retrieves_specific_row() {
        let dir = tempfile::tempdir().unwrap();
        let q = MessageQueue::open(&dir.path().join("q.redb")).unwrap();
        let a = q.enqueue(new_msg("s1", "a")).unwrap();
        let _b = q.enqueue(new_msg("s1", "b")).unwrap();

        let row = q.dequeue_by_id(a).unwrap().unwrap();
        assert_eq!(row.id, a);
        assert_eq!(row.status, MessageStatus::InFlight);
    }

    #[test]
    fn complete_and_fail_transition_status() {
        let dir = tempfile::tempdir().unwrap();
        let q = MessageQueue::open(&dir.path().join("q.redb")).unwrap();
        let a = q.enqueue(new_msg("s1", "a")).unwrap();
        q.dequeue_by_id(a).unwrap();
        q.complete(a).unwrap();
        assert_eq!(q.get(a).unwrap().unwrap().status, MessageStatus::Complete);

        let b = q.enqueue(new_msg("s1", "b")).unwrap();
        q.dequeue_by_id(b).unwrap();
        q.fail(b).unwrap();
        assert_eq!(q.get(b).unwrap().unwrap().status, MessageStatus::Failed);
    }

    #[test]
    fn stale_in_flight_rows_recovered_as_failed_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.redb");
        let id = {
            let q = MessageQueue::open(&path).unwrap();
            let id = q.enqueue(new_msg("s1", "a")).unwrap();
            q.dequeue_by_id(id).unwrap();
            id
        };

        let q = MessageQueue::open(&path).unwrap();
        assert_eq!(q.get(id).unwrap().unwrap().status, MessageStatus::Failed);
    }
}
