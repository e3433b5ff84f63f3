//! File-based storage backend for persistent storage.
//!
//! Layout of a storage directory:
//!
//! ```text
//! <dir>/
//! ├─ LOCK                # Advisory lock for single-writer
//! ├─ <key>.val           # Current value for each key
//! └─ <key>.val.tmp       # In-progress write (only present mid-write or after a crash)
//! ```

use crate::backend::{validate_key, KvBackend};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const VALUE_SUFFIX: &str = ".val";
const TEMP_SUFFIX: &str = ".val.tmp";

/// A directory-backed key-value backend.
///
/// Each key is stored in its own file. Writes use the write-then-rename
/// pattern so a value is always either fully old or fully new:
/// 1. Write to a temporary file
/// 2. Sync the temporary file to disk
/// 3. Rename it over the value file
/// 4. Fsync the directory so the rename is durable
///
/// # Thread Safety
///
/// The backend holds an exclusive `fs2` lock on `LOCK` for its lifetime, so
/// only one `FileBackend` can exist per directory. Writes within the process
/// are serialized by an internal mutex.
///
/// # Example
///
/// ```no_run
/// use entisync_storage::{FileBackend, KvBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("sync_state")).unwrap();
/// backend.write("offline_queue", b"[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a storage directory.
    ///
    /// Leftover temporary files from an interrupted write are removed; the
    /// value file they were meant to replace is still intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the path is not
    /// a directory, or another backend holds the lock.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(StorageError::InvalidLocation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let backend = Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        };
        backend.remove_stale_temp_files()?;
        Ok(backend)
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{key}{VALUE_SUFFIX}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{key}{TEMP_SUFFIX}"))
    }

    fn remove_stale_temp_files(&self) -> StorageResult<()> {
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(TEMP_SUFFIX) {
                warn!(file = %name.to_string_lossy(), "removing interrupted write");
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        // NTFS journaling covers rename durability
        Ok(())
    }
}

impl KvBackend for FileBackend {
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let mut file = match File::open(self.value_path(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        let temp_path = self.temp_path(key);
        let mut file = File::create(&temp_path)?;
        file.write_all(value)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.value_path(key))?;
        self.sync_directory()?;

        debug!(key, bytes = value.len(), "value replaced");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(self.value_path(key)) {
            Ok(()) => {
                self.sync_directory()?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            if let Some(key) = name.strip_suffix(VALUE_SUFFIX) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
