//! Filesystem-backed artifact store.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use medianet_core::{Store, StoreError, StoreResult};
use medianet_types::{Address, CommitFile, DisputeFile, ProposeFile};

/// Artifact store rooted at `<data_dir>/<account>/`.
///
/// Holds the account's exclusive `run.lock` from [`open`](Self::open)
/// until drop; a second process opening the same account directory fails
/// with [`StoreError::Locked`].
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    account: String,
    // Held for the lifetime of the store; the lock releases on drop.
    _lock: File,
}

impl FileStore {
    /// Open (creating if needed) the account's artifact directory and
    /// take the run lock.
    pub fn open(data_dir: &Path, account: Address) -> StoreResult<Self> {
        let account = format!("{account:#x}");
        let dir = data_dir.join(&account);
        fs::create_dir_all(&dir).map_err(|e| StoreError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let lock_path = dir.join("run.lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::Io {
                path: lock_path.clone(),
                source: e,
            })?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path))?;

        info!(dir = %dir.display(), "artifact store opened");
        Ok(Self {
            dir,
            account,
            _lock: lock,
        })
    }

    fn path_for(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{kind}_{}.json", self.account))
    }

    /// Serialize to a temp file, fsync, then rename over the target.
    fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        let io_err = |p: &Path| {
            let p = p.to_path_buf();
            move |e: std::io::Error| StoreError::Io { path: p, source: e }
        };

        let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
        file.write_all(&data).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
        fs::rename(&tmp, path).map_err(io_err(path))?;

        debug!(path = %path.display(), bytes = data.len(), "artifact written");
        Ok(())
    }

    /// Read an artifact back, if present, and run the supplied
    /// validation.
    fn read_validated<T, F>(&self, path: &Path, validate: F) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(&T) -> Result<(), String>,
    {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let value: T = serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("not valid JSON: {e}"),
        })?;
        validate(&value).map_err(|reason| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(Some(value))
    }
}

impl Store for FileStore {
    fn write_commit(&self, file: &CommitFile) -> StoreResult<()> {
        self.write_atomic(&self.path_for("commit"), file)
    }

    fn read_commit(&self) -> StoreResult<Option<CommitFile>> {
        self.read_validated(&self.path_for("commit"), |f: &CommitFile| {
            f.validate().map_err(|e| e.to_string())
        })
    }

    fn write_propose(&self, file: &ProposeFile) -> StoreResult<()> {
        self.write_atomic(&self.path_for("propose"), file)
    }

    fn read_propose(&self) -> StoreResult<Option<ProposeFile>> {
        self.read_validated(&self.path_for("propose"), |f: &ProposeFile| {
            f.validate().map_err(|e| e.to_string())
        })
    }

    fn write_dispute(&self, file: &DisputeFile) -> StoreResult<()> {
        self.write_atomic(&self.path_for("dispute"), file)
    }

    fn read_dispute(&self) -> StoreResult<Option<DisputeFile>> {
        self.read_validated(&self.path_for("dispute"), |f: &DisputeFile| {
            f.validate().map_err(|e| e.to_string())
        })
    }
}
