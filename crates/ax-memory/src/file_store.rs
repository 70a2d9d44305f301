//! Reference `MemoryProvider` implementation: one append-only JSONL file per
//! scope under a base directory, with an in-memory index for lookups that
//! don't amount to a full scan (`read`, `delete`).
//!
//! Other backends (a hosted service, a vector-search index) are external
//! collaborators behind the same trait and are out of scope here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use ax_domain::error::{Error, Result};
use ax_domain::trace::TraceEvent;

use crate::provider::MemoryProvider;
use crate::types::MemoryEntry;

const DEFAULT_LIMIT: usize = 50;

fn scope_file_name(scope: &str) -> String {
    format!("{}.jsonl", scope.replace([':', '/'], "__"))
}

/// File-backed `MemoryProvider`. Entries for a scope live in
/// `<base_dir>/<scope>.jsonl`, one JSON object per line, append-only; a
/// `delete` rewrites the file without the deleted entry. An in-memory index
/// (`id -> (scope, line count at write time)`) avoids an all-scopes scan on
/// `read`/`delete`.
pub struct FileMemoryProvider {
    base_dir: PathBuf,
    write_lock: parking_lot::Mutex<()>,
    index: RwLock<HashMap<String, String>>,
}

impl FileMemoryProvider {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        let provider = Self {
            base_dir: base_dir.to_path_buf(),
            write_lock: parking_lot::Mutex::new(()),
            index: RwLock::new(HashMap::new()),
        };
        provider.rebuild_index()?;
        Ok(provider)
    }

    fn rebuild_index(&self) -> Result<()> {
        let mut index = self.index.write();
        index.clear();
        let dir = std::fs::read_dir(&self.base_dir).map_err(Error::Io)?;
        for entry in dir {
            let entry = entry.map_err(Error::Io)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            for line in raw.lines() {
                if let Ok(e) = serde_json::from_str::<MemoryEntry>(line) {
                    index.insert(e.id, e.scope);
                }
            }
        }
        Ok(())
    }

    fn path_for(&self, scope: &str) -> PathBuf {
        self.base_dir.join(scope_file_name(scope))
    }

    fn load_scope(&self, scope: &str) -> Result<Vec<MemoryEntry>> {
        let path = self.path_for(scope);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut entries = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryEntry>(line) {
                Ok(e) => entries.push(e),
                Err(e) => tracing::warn!(scope, error = %e, "skipping malformed memory entry"),
            }
        }
        Ok(entries)
    }

    fn rewrite_scope(&self, scope: &str, entries: &[MemoryEntry]) -> Result<()> {
        let path = self.path_for(scope);
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, buf).map_err(Error::Io)?;
        std::fs::rename(&tmp, &path).map_err(Error::Io)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryProvider for FileMemoryProvider {
    async fn write(&self, scope: &str, content: &str, tags: Vec<String>) -> Result<MemoryEntry> {
        let _guard = self.write_lock.lock();
        let entry = MemoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            content: content.to_string(),
            tags,
            created_at: Utc::now(),
        };

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(scope))
            .map_err(Error::Io)?;
        file.write_all(serde_json::to_string(&entry)?.as_bytes())
            .map_err(Error::Io)?;
        file.write_all(b"\n").map_err(Error::Io)?;

        self.index
            .write()
            .insert(entry.id.clone(), scope.to_string());

        TraceEvent::MemoryWritten {
            scope: scope.to_string(),
            id: entry.id.clone(),
        }
        .emit();
        Ok(entry)
    }

    async fn query(
        &self,
        scope: &str,
        query: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let mut entries = self.load_scope(scope)?;
        entries.reverse();

        if let Some(needle) = query {
            let needle = needle.to_lowercase();
            entries.retain(|e| {
                e.content.to_lowercase().contains(&needle)
                    || e.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            });
        }

        entries.truncate(limit);
        Ok(entries)
    }

    async fn read(&self, id: &str) -> Result<MemoryEntry> {
        let scope = self
            .index
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Provider {
                provider: "memory".into(),
                message: format!("no such memory entry {id}"),
            })?;
        self.load_scope(&scope)?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::Provider {
                provider: "memory".into(),
                message: format!("no such memory entry {id}"),
            })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let scope = match self.index.read().get(id).cloned() {
            Some(s) => s,
            None => return Ok(()),
        };
        let entries: Vec<MemoryEntry> = self
            .load_scope(&scope)?
            .into_iter()
            .filter(|e| e.id != id)
            .collect();
        self.rewrite_scope(&scope, &entries)?;
        self.index.write().remove(id);
        TraceEvent::MemoryDeleted {
            scope,
            id: id.to_string(),
        }
        .emit();
        Ok(())
    }

    async fn list(&self, scope: &str, limit: Option<usize>) -> Result<Vec<MemoryEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let mut entries = self.load_scope(scope)?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMemoryProvider::new(dir.path()).unwrap();
        let entry = store
            .write("agent:slack:u1", "likes rust", vec!["preference".into()])
            .await
            .unwrap();
        let read_back = store.read(&entry.id).await.unwrap();
        assert_eq!(read_back.content, "likes rust");
    }

    #[tokio::test]
    async fn list_is_newest_first_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMemoryProvider::new(dir.path()).unwrap();
        for i in 0..5 {
            store
                .write("s1", &format!("fact {i}"), vec![])
                .await
                .unwrap();
        }
        let listed = store.list("s1", Some(2)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].content, "fact 4");
        assert_eq!(listed[1].content, "fact 3");
    }

    #[tokio::test]
    async fn query_matches_content_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMemoryProvider::new(dir.path()).unwrap();
        store
            .write("s1", "favourite language is rust", vec!["lang".into()])
            .await
            .unwrap();
        store
            .write("s1", "lives in berlin", vec!["location".into()])
            .await
            .unwrap();

        let by_content = store.query("s1", Some("rust"), None).await.unwrap();
        assert_eq!(by_content.len(), 1);

        let by_tag = store.query("s1", Some("location"), None).await.unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].content, "lives in berlin");
    }

    #[tokio::test]
    async fn delete_removes_entry_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMemoryProvider::new(dir.path()).unwrap();
        let entry = store.write("s1", "temp", vec![]).await.unwrap();
        store.delete(&entry.id).await.unwrap();
        assert!(store.read(&entry.id).await.is_err());
        // deleting again is not an error
        store.delete(&entry.id).await.unwrap();
    }

    #[tokio::test]
    async fn index_rebuilds_from_disk_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileMemoryProvider::new(dir.path()).unwrap();
            store.write("s1", "persisted", vec![]).await.unwrap().id
        };
        let reopened = FileMemoryProvider::new(dir.path()).unwrap();
        let entry = reopened.read(&id).await.unwrap();
        assert_eq!(entry.content, "persisted");
    }
}
