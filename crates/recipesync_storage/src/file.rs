//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A single-file storage backend.
///
/// An exclusive advisory lock on a sibling `<name>.lock` file is held for
/// the lifetime of the backend, so two processes can never append to the
/// same journal. The lock is independent of the journal inode and survives
/// `replace()`.
///
/// # Durability
///
/// - `append()` writes through the OS page cache
/// - `sync()` calls `File::sync_all()`
/// - `replace()` writes a sibling temp file, syncs it, and renames it over
///   the journal
///
/// If the journal cannot be reopened after a successful rename, the backend
/// refuses every later operation with [`StorageError::Detached`].
///
/// # Example
///
/// ```no_run
/// use recipesync_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("recipes.journal")).unwrap();
/// backend.append(b"frame").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    /// `None` once the journal handle has been lost.
    file: RwLock<Option<File>>,
    size: RwLock<u64>,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates the file at `path` and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds the lock, or
    /// an I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let lock_file = Self::acquire_lock(path)?;
        let file = Self::open_journal(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
            size: RwLock::new(size),
            _lock_file: lock_file,
        })
    }

    /// Opens the file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the lock file guarding `path`.
    #[must_use]
    pub fn lock_path(path: &Path) -> PathBuf {
        sibling(path, ".lock")
    }

    fn acquire_lock(path: &Path) -> StorageResult<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(Self::lock_path(path))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }
        Ok(lock_file)
    }

    fn open_journal(path: &Path) -> StorageResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    fn detached(&self) -> StorageError {
        StorageError::Detached {
            path: self.path.clone(),
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl StorageBackend for FileBackend {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let mut buffer = Vec::with_capacity(size as usize);

        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or_else(|| self.detached())?;
        file.seek(SeekFrom::Start(0))?;
        Read::by_ref(file).take(size).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or_else(|| self.detached())?;
        let mut size = self.size.write();

        let offset = *size;
        if data.is_empty() {
            return Ok(offset);
        }
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or_else(|| self.detached())?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        if self.file.read().is_none() {
            return Err(self.detached());
        }
        Ok(*self.size.read())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut guard = self.file.write();
        if guard.is_none() {
            return Err(self.detached());
        }
        let mut size = self.size.write();

        let temp = sibling(&self.path, ".tmp");
        let staged = File::create(&temp)
            .and_then(|mut tmp| {
                tmp.write_all(data)?;
                tmp.sync_all()
            })
            .and_then(|()| fs::rename(&temp, &self.path));
        if let Err(e) = staged {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        // The old handle points at the unlinked inode now.
        match Self::open_journal(&self.path) {
            Ok(file) => {
                *guard = Some(file);
                *size = data.len() as u64;
                Ok(())
            }
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }
}
