//! The credential store
//!
//! One `Credential` per client instance. Reads and writes go through a
//! `std::sync::RwLock` that is never held across an await, so the store can
//! be consulted from inside the refresh coordinator's critical section.
//!
//! When constructed with `load`, the store mirrors its credential to a JSON
//! file. Writes use temp-file + rename so a crash never leaves a torn file,
//! and are serialized by a write gate held across snapshot and rename.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Access/refresh token pair authorizing requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: Secret<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret<String>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: refresh_token.map(Secret::new),
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_str()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_ref()
            .map(|t| t.expose_str())
            .filter(|t| !t.is_empty())
    }
}

struct Versioned {
    credential: Credential,
    generation: u64,
}

/// Shared holder of the live credential.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: RwLock<Versioned>,
    write_gate: Mutex<()>,
}

impl CredentialStore {
    /// In-memory store starting at generation 0.
    pub fn new(credential: Credential) -> Self {
        Self {
            path: None,
            state: RwLock::new(Versioned {
                credential,
                generation: 0,
            }),
            write_gate: Mutex::new(()),
        }
    }

    /// File-backed store.
    ///
    /// An existing file wins over `initial`, since it holds whatever the last
    /// refresh rotated to. A missing file is created from `initial`.
    pub async fn load(path: PathBuf, initial: Credential) -> Result<Self> {
        let credential = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let credential: Credential = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), "loaded persisted credential");
            credential
        } else {
            info!(path = %path.display(), "credential file not found, seeding from config");
            write_atomic(&path, &initial).await?;
            initial
        };

        Ok(Self {
            path: Some(path),
            state: RwLock::new(Versioned {
                credential,
                generation: 0,
            }),
            write_gate: Mutex::new(()),
        })
    }

    /// Clone of the current credential.
    pub fn get(&self) -> Credential {
        self.read(|v| v.credential.clone())
    }

    /// Current credential together with its generation, read atomically.
    pub fn snapshot(&self) -> (Credential, u64) {
        self.read(|v| (v.credential.clone(), v.generation))
    }

    pub fn generation(&self) -> u64 {
        self.read(|v| v.generation)
    }

    /// Replace the credential. Returns the new generation.
    pub fn set(&self, credential: Credential) -> u64 {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.credential = credential;
        state.generation += 1;
        debug!(generation = state.generation, "credential replaced");
        state.generation
    }

    /// Persist the current credential. No-op for in-memory stores.
    ///
    /// Concurrent saves queue on the write gate. The snapshot is taken after
    /// the gate is acquired, so the last save to finish writes the newest
    /// credential.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _gate = self.write_gate.lock().await;
        let credential = self.get();
        write_atomic(path, &credential).await
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read<R>(&self, f: impl FnOnce(&Versioned) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write the credential to `path` atomically with 0600 permissions.
async fn write_atomic(path: &Path, credential: &Credential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::Parse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(
        ".credential.tmp.{}.{}",
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}
