//! Durable agent → conversation id mapping.
//!
//! This is the only session-wide shared state. `MessageExchange` writes it when
//! a conversation is created and `ConversationCache` clears it when the server
//! no longer knows an id; nothing else mutates it.
//!
//! Mutations update memory immediately. Inside a tokio runtime the file write
//! runs on the blocking pool; call [`SessionStore::flush`] before exiting.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fitnesse_core::agent::AgentIdentity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    conversations: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct SessionEntries {
    conversations: BTreeMap<AgentIdentity, String>,
    durable: bool,
    /// Bumped on every mutation.
    version: u64,
}

#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    inner: Arc<Mutex<SessionEntries>>,
    /// Version last written to disk. Held for the whole write so snapshots
    /// never land out of order.
    written: Arc<Mutex<u64>>,
}

impl SessionStore {
    /// Entries live for this process only.
    pub fn in_memory() -> Self {
        Self::from_entries(None, SessionEntries::default())
    }

    fn from_entries(path: Option<PathBuf>, entries: SessionEntries) -> Self {
        Self {
            path,
            inner: Arc::new(Mutex::new(entries)),
            written: Arc::new(Mutex::new(0)),
        }
    }

    /// Load the mapping persisted at `path`. An unreadable file degrades the
    /// store to in-memory mode instead of failing.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut entries = SessionEntries {
            conversations: BTreeMap::new(),
            durable: true,
            version: 0,
        };

        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<SessionFile>(&raw) {
                Ok(file) => {
                    for (key, conversation_id) in file.conversations {
                        match key.parse::<AgentIdentity>() {
                            Ok(agent) => {
                                entries.conversations.insert(agent, conversation_id);
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "dropping persisted session entry")
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %path.display(),
                        "session file is corrupt; starting with no conversations"
                    );
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "session file unreadable; conversations will not survive restart"
                );
                entries.durable = false;
            }
        }

        Self::from_entries(Some(path), entries)
    }

    /// `open` at `path` when given, otherwise in-memory.
    pub fn open_or_memory(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::open(path),
            None => Self::in_memory(),
        }
    }

    pub fn get(&self, agent: AgentIdentity) -> Option<String> {
        self.lock().conversations.get(&agent).cloned()
    }

    pub fn entries(&self) -> Vec<(AgentIdentity, String)> {
        self.lock()
            .conversations
            .iter()
            .map(|(agent, id)| (*agent, id.clone()))
            .collect()
    }

    /// Whether writes currently reach disk.
    pub fn is_durable(&self) -> bool {
        self.path.is_some() && self.lock().durable
    }

    pub(crate) fn set(&self, agent: AgentIdentity, conversation_id: &str) {
        let write = {
            let mut entries = self.lock();
            entries
                .conversations
                .insert(agent, conversation_id.to_string());
            entries.version += 1;
            self.pending_write(&entries)
        };
        dispatch(write);
    }

    /// Clear `agent` only while it still maps to `conversation_id`, so a late
    /// not-found for an old id never erases a newer conversation.
    pub(crate) fn clear_if_matches(&self, agent: AgentIdentity, conversation_id: &str) -> bool {
        let write = {
            let mut entries = self.lock();
            if entries.conversations.get(&agent).map(String::as_str) != Some(conversation_id) {
                return false;
            }
            entries.conversations.remove(&agent);
            entries.version += 1;
            self.pending_write(&entries)
        };
        dispatch(write);
        true
    }

    /// Wait until the latest mapping has reached disk.
    pub async fn flush(&self) {
        let write = self.pending_write(&self.lock());
        let Some(write) = write else {
            return;
        };
        if let Err(err) = tokio::task::spawn_blocking(move || write.run()).await {
            tracing::warn!(error = %err, "session flush did not complete");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionEntries> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending_write(&self, entries: &SessionEntries) -> Option<PendingWrite> {
        let path = self.path.as_ref()?;
        if !entries.durable {
            return None;
        }
        Some(PendingWrite {
            path: path.clone(),
            file: SessionFile {
                conversations: entries
                    .conversations
                    .iter()
                    .map(|(agent, id)| (agent.as_str().to_string(), id.clone()))
                    .collect(),
            },
            version: entries.version,
            inner: self.inner.clone(),
            written: self.written.clone(),
        })
    }
}

/// Snapshot of the mapping waiting to be written.
struct PendingWrite {
    path: PathBuf,
    file: SessionFile,
    version: u64,
    inner: Arc<Mutex<SessionEntries>>,
    written: Arc<Mutex<u64>>,
}

impl PendingWrite {
    fn run(self) {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if self.version <= *written {
            return;
        }
        match write_session_file(&self.path, &self.file) {
            Ok(()) => *written = self.version,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %self.path.display(),
                    "failed to persist sessions; continuing in memory"
                );
                self.inner.lock().unwrap_or_else(|e| e.into_inner()).durable = false;
            }
        }
    }
}

/// Write on the blocking pool when a runtime is available, inline otherwise.
fn dispatch(write: Option<PendingWrite>) {
    let Some(write) = write else {
        return;
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || write.run());
        }
        Err(_) => write.run(),
    }
}

fn write_session_file(path: &Path, file: &SessionFile) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(file)?;

    let mut handle = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    handle.write_all(data.as_bytes())?;
    Ok(())
}

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

#[cfg(not(unix))]
trait OpenOptionsExt {
    fn mode(&mut self, _mode: u32) -> &mut Self;
}

#[cfg(not(unix))]
impl OpenOptionsExt for std::fs::OpenOptions {
    fn mode(&mut self, _mode: u32) -> &mut Self {
        self
    }
}
