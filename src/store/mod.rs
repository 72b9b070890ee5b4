//! Durable session records.
//!
//! Every session lives in memory behind its own lock and is mirrored to
//! `<upload_dir>/<id>/session_info.json`. Each mutation rewrites the whole
//! snapshot while the session's lock is held, so writes to one session are
//! serialized and writes to different sessions never contend.
//!
//! All methods do blocking file I/O; async callers go through
//! `tokio::task::spawn_blocking`.

use dashmap::DashMap;
use parking_lot::Mutex;
use reelforged_common::paths::{session_dir, session_record_path};
use reelforged_common::{Chunk, Error, Metadata, Result, Session, SessionId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct SessionStore {
    upload_dir: PathBuf,
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
}

impl SessionStore {
    /// Open the store rooted at `upload_dir`, recovering every session
    /// snapshot found beneath it.
    ///
    /// Unreadable or corrupt snapshots are logged and skipped.
    pub fn open(upload_dir: impl Into<PathBuf>) -> Result<Self> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)
            .map_err(|e| Error::storage(&upload_dir, format!("failed to create upload dir: {e}")))?;

        let store = Self {
            upload_dir,
            sessions: DashMap::new(),
        };
        let recovered = store.recover()?;
        tracing::info!(
            sessions = recovered,
            "Opened session store at {}",
            store.upload_dir.display()
        );
        Ok(store)
    }

    fn recover(&self) -> Result<usize> {
        let entries = std::fs::read_dir(&self.upload_dir)
            .map_err(|e| Error::storage(&self.upload_dir, format!("failed to scan: {e}")))?;

        let mut recovered = 0;
        for entry in entries.flatten() {
            let record = session_record_path(&entry.path());
            if !record.is_file() {
                continue;
            }
            match load_snapshot(&record) {
                Ok(session) => {
                    tracing::debug!(session_id = %session.id, "Recovered session");
                    self.sessions
                        .insert(session.id, Arc::new(Mutex::new(session)));
                    recovered += 1;
                }
                Err(e) => tracing::warn!("Skipping unreadable session record: {}", e),
            }
        }
        Ok(recovered)
    }

    /// Root directory of all sessions.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Directory owned by session `id`.
    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        session_dir(&self.upload_dir, id)
    }

    /// Register a new, empty session and persist it.
    ///
    /// The in-memory record is kept even when the durable write fails; the
    /// failure is still returned as [`Error::Storage`].
    pub fn create(&self, id: SessionId, metadata: Metadata) -> Result<Session> {
        let entry = match self.sessions.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(Error::InvalidInput(format!("session {id} already exists")));
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(Arc::new(Mutex::new(Session::new(id, metadata))))
                    .clone()
            }
        };

        let session = entry.lock();
        self.persist(&session)?;
        Ok(session.clone())
    }

    pub fn exists(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot of a session.
    pub fn get(&self, id: &SessionId) -> Result<Session> {
        Ok(self.handle(id)?.lock().clone())
    }

    /// Record a chunk and persist the updated session.
    ///
    /// A chunk with an already-recorded number replaces the earlier record,
    /// which is returned. Completed sessions reject new chunks.
    pub fn add_chunk(&self, id: &SessionId, chunk: Chunk) -> Result<Option<Chunk>> {
        let handle = self.handle(id)?;
        let mut session = handle.lock();
        if session.completed {
            return Err(Error::SessionCompleted(id.to_string()));
        }

        let replaced = session.record_chunk(chunk);
        self.persist(&session)?;
        Ok(replaced)
    }

    /// Mark a session completed, recording the output path if there is one.
    ///
    /// Returns `false` without touching the record if it was already
    /// completed.
    pub fn complete(&self, id: &SessionId, output_path: Option<PathBuf>) -> Result<bool> {
        let handle = self.handle(id)?;
        let mut session = handle.lock();
        if !session.complete(output_path) {
            return Ok(false);
        }
        self.persist(&session)?;
        Ok(true)
    }

    /// Ids of all known sessions, oldest first.
    pub fn list(&self) -> Vec<SessionId> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| {
                let session = entry.value().lock();
                (session.created_at, session.id)
            })
            .collect();
        sessions.sort();
        sessions.into_iter().map(|(_, id)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn handle(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::session_not_found(id))
    }

    /// Write the snapshot through a temp file so readers never see a torn
    /// record.
    fn persist(&self, session: &Session) -> Result<()> {
        let path = session_record_path(&self.session_dir(&session.id));
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&tmp, json).map_err(|e| Error::storage(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Error::storage(&path, e))?;
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Session> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::storage(path, e))?;
    serde_json::from_str(&content).map_err(|e| Error::storage(path, format!("corrupt record: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn chunk(number: u32, valid: bool) -> Chunk {
        Chunk {
            number,
            path: PathBuf::from(format!("chunk_{number:04}.webm")),
            timestamp: 1_700_000_000 + number as i64,
            mime_type: Some("video/webm".to_string()),
            is_valid: valid,
        }
    }

    fn open_with_session() -> (tempfile::TempDir, SessionStore, SessionId) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let id = SessionId::new();
        std::fs::create_dir_all(store.session_dir(&id)).unwrap();
        store.create(id, Metadata::new()).unwrap();
        (dir, store, id)
    }

    #[test]
    fn create_persists_snapshot() {
        let (_dir, store, id) = open_with_session();
        let record = session_record_path(&store.session_dir(&id));
        assert!(record.is_file());

        let on_disk: Session =
            serde_json::from_str(&std::fs::read_to_string(record).unwrap()).unwrap();
        assert_eq!(on_disk.id, id);
        assert!(on_disk.chunks.is_empty());
        assert!(!on_disk.completed);
    }

    #[test]
    fn create_without_directory_keeps_memory_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let id = SessionId::new();

        let result = store.create(id, Metadata::new());
        assert_matches!(result, Err(Error::Storage { .. }));
        assert!(store.exists(&id));
        assert_eq!(store.get(&id).unwrap().id, id);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let (_dir, store, id) = open_with_session();
        assert_matches!(
            store.create(id, Metadata::new()),
            Err(Error::InvalidInput(_))
        );
    }

    #[test]
    fn unknown_session_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let id = SessionId::new();

        assert!(!store.exists(&id));
        assert!(store.get(&id).unwrap_err().is_not_found());
        assert!(store.add_chunk(&id, chunk(1, true)).unwrap_err().is_not_found());
        assert!(store.complete(&id, None).unwrap_err().is_not_found());
    }

    #[test]
    fn add_chunk_replaces_same_number() {
        let (_dir, store, id) = open_with_session();

        assert!(store.add_chunk(&id, chunk(1, false)).unwrap().is_none());
        store.add_chunk(&id, chunk(2, true)).unwrap();
        let replaced = store.add_chunk(&id, chunk(1, true)).unwrap();
        assert_eq!(replaced.map(|c| c.is_valid), Some(false));

        let session = store.get(&id).unwrap();
        let numbers: Vec<u32> = session.chunks.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![2, 1]);
        assert_eq!(session.valid_chunk_count(), 2);
    }

    #[test]
    fn complete_is_write_once() {
        let (_dir, store, id) = open_with_session();
        let output = store.session_dir(&id).join("complete_recording.webm");

        assert!(store.complete(&id, Some(output.clone())).unwrap());
        let first = store.get(&id).unwrap();
        assert!(first.completed);
        assert_eq!(first.output_path.as_deref(), Some(output.as_path()));

        assert!(!store.complete(&id, None).unwrap());
        let second = store.get(&id).unwrap();
        assert_eq!(second.completed_at, first.completed_at);
        assert_eq!(second.output_path, first.output_path);
    }

    #[test]
    fn completed_session_rejects_chunks() {
        let (_dir, store, id) = open_with_session();
        store.complete(&id, None).unwrap();

        assert_matches!(
            store.add_chunk(&id, chunk(1, true)),
            Err(Error::SessionCompleted(_))
        );
        assert!(store.get(&id).unwrap().chunks.is_empty());
    }

    #[test]
    fn reopen_recovers_sessions() {
        let (dir, store, id) = open_with_session();
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), serde_json::json!("standup"));
        let other = SessionId::new();
        std::fs::create_dir_all(store.session_dir(&other)).unwrap();
        store.create(other, metadata).unwrap();
        store.add_chunk(&id, chunk(3, true)).unwrap();
        store.add_chunk(&id, chunk(1, false)).unwrap();
        store.complete(&other, None).unwrap();

        let before_id = store.get(&id).unwrap();
        let before_other = store.get(&other).unwrap();
        drop(store);

        let reopened = SessionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.exists(&id));

        let after_id = reopened.get(&id).unwrap();
        assert_eq!(after_id.chunks, before_id.chunks);
        assert_eq!(after_id.created_at, before_id.created_at);

        let after_other = reopened.get(&other).unwrap();
        assert!(after_other.completed);
        assert_eq!(after_other.completed_at, before_other.completed_at);
        assert_eq!(after_other.metadata["title"], "standup");
    }

    #[test]
    fn recovery_skips_corrupt_records() {
        let (dir, store, id) = open_with_session();
        drop(store);

        let broken = dir.path().join("not-a-session");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(session_record_path(&broken), "{ not json").unwrap();
        std::fs::write(dir.path().join("stray.txt"), "ignored").unwrap();

        let reopened = SessionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list(), vec![id]);
    }

    #[test]
    fn list_is_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        assert!(store.is_empty());

        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = SessionId::new();
            std::fs::create_dir_all(store.session_dir(&id)).unwrap();
            store.create(id, Metadata::new()).unwrap();
            ids.push(id);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(store.list(), ids);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let (_dir, store, id) = open_with_session();
        store.add_chunk(&id, chunk(1, true)).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(store.session_dir(&id))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
