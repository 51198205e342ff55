// ============================================
// File: crates/cirrus-server/src/services/storage.rs
// ============================================
//! # Storage Service
//!
//! ## Creation Reason
//! All filesystem access of the server goes through this service so that
//! path confinement holds in one place: every operation takes validated
//! [`Name`] values and resolves them strictly under
//! `<data_dir>/<username>/`.
//!
//! ## Main Functionality
//! - file listing as the comma-separated, NUL-terminated wire form
//! - chunked readers/writers aligned with the protocol's [`ChunkPlan`]
//! - rename/delete/existence checks with symlink rejection
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Name` validation already rejects `/`, `.` and `..`; keep it that
//!   way; nothing here re-checks for separators
//! - downloads must refuse symlinks and non-regular files; a symlink in
//!   a user directory must never leak data from outside it

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use cirrus_common::Name;
use cirrus_core::protocol::ChunkPlan;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage failure kinds. `NotFound` and `AlreadyExists` map to typed
/// reply codes; `Io` mid-transfer is session-fatal.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The file does not exist (or is not a regular file).
    #[error("file not found")]
    NotFound,

    /// The target name is already taken.
    #[error("file already exists")]
    AlreadyExists,

    /// Underlying filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================
// Storage
// ============================================

/// Per-user file storage rooted at the configured data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates the service, creating the root directory if needed.
    ///
    /// # Errors
    /// Returns `Io` if the root cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Path of a user's directory.
    #[must_use]
    pub fn user_dir(&self, user: &Name) -> PathBuf {
        self.root.join(user.as_str())
    }

    fn file_path(&self, user: &Name, name: &Name) -> PathBuf {
        self.user_dir(user).join(name.as_str())
    }

    /// Ensures the user's directory exists (run once per session).
    ///
    /// # Errors
    /// Returns `Io` on filesystem failure.
    pub fn ensure_user_dir(&self, user: &Name) -> Result<()> {
        fs::create_dir_all(self.user_dir(user))?;
        Ok(())
    }

    /// Returns the user's filenames as the wire form of the list reply:
    /// comma-separated, NUL-terminated; empty when there are no files.
    ///
    /// Names are sorted so both listing and tests are deterministic.
    ///
    /// # Errors
    /// Returns `Io` if the directory cannot be read.
    pub fn list_files(&self, user: &Name) -> Result<Vec<u8>> {
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(self.user_dir(user))? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(_) => warn!(user = %user, "skipping non-UTF-8 filename in listing"),
            }
        }
        if names.is_empty() {
            return Ok(Vec::new());
        }
        names.sort_unstable();

        let mut list = names.join(",").into_bytes();
        list.push(0);
        Ok(list)
    }

    /// True when the file exists under the user's directory.
    #[must_use]
    pub fn is_present(&self, user: &Name, name: &Name) -> bool {
        self.file_path(user, name).symlink_metadata().is_ok()
    }

    /// Opens a file for chunked download.
    ///
    /// # Errors
    /// Returns `NotFound` for missing files, symlinks and anything that
    /// is not a regular file; `Io` if the open fails.
    pub fn open_for_read(&self, user: &Name, name: &Name) -> Result<FileReader> {
        let path = self.file_path(user, name);
        let metadata = path.symlink_metadata().map_err(|_| StorageError::NotFound)?;
        if metadata.file_type().is_symlink() || !metadata.is_file() {
            warn!(user = %user, file = %name, "refusing non-regular file for download");
            return Err(StorageError::NotFound);
        }

        let file = File::open(&path)?;
        debug!(user = %user, file = %name, size = metadata.len(), "opened for download");
        Ok(FileReader {
            file,
            size: metadata.len(),
        })
    }

    /// Creates a new file for chunked upload. Fails if the name is
    /// already taken.
    ///
    /// # Errors
    /// Returns `AlreadyExists` on collision, `Io` if creation fails.
    pub fn create_for_write(&self, user: &Name, name: &Name) -> Result<FileWriter> {
        let path = self.file_path(user, name);
        if self.is_present(user, name) {
            return Err(StorageError::AlreadyExists);
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists
                } else {
                    StorageError::Io(e)
                }
            })?;
        debug!(user = %user, file = %name, "created for upload");
        Ok(FileWriter {
            file: Some(file),
            path,
        })
    }

    /// Renames a file inside the user's directory.
    ///
    /// # Errors
    /// - `NotFound` when the old name does not exist
    /// - `AlreadyExists` when the new name is taken
    /// - `Io` if the rename itself fails
    pub fn rename(&self, user: &Name, old: &Name, new: &Name) -> Result<()> {
        if !self.is_present(user, old) {
            return Err(StorageError::NotFound);
        }
        if self.is_present(user, new) {
            return Err(StorageError::AlreadyExists);
        }
        fs::rename(self.file_path(user, old), self.file_path(user, new))?;
        Ok(())
    }

    /// Deletes a file inside the user's directory.
    ///
    /// # Errors
    /// - `NotFound` when the file does not exist
    /// - `Io` if the removal fails
    pub fn delete(&self, user: &Name, name: &Name) -> Result<()> {
        if !self.is_present(user, name) {
            return Err(StorageError::NotFound);
        }
        fs::remove_file(self.file_path(user, name))?;
        Ok(())
    }
}

// ============================================
// FileReader
// ============================================

/// Sequential chunked reader for a download.
#[derive(Debug)]
pub struct FileReader {
    file: File,
    size: u64,
}

impl FileReader {
    /// Total file size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// The chunk schedule for this file.
    #[must_use]
    pub const fn chunk_plan(&self) -> ChunkPlan {
        ChunkPlan::new(self.size)
    }

    /// Reads the next chunk of exactly `len` bytes.
    ///
    /// # Errors
    /// Returns `Io` if the file ends early or the read fails.
    pub fn read_chunk(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

// ============================================
// FileWriter
// ============================================

/// Sequential chunked writer for an upload. If the session dies before
/// [`FileWriter::finish`], call [`FileWriter::discard`] to remove the
/// partial file.
#[derive(Debug)]
pub struct FileWriter {
    file: Option<File>,
    path: PathBuf,
}

impl FileWriter {
    /// Appends one chunk.
    ///
    /// # Errors
    /// Returns `Io` if the write fails.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .as_mut()
            .expect("writer used after finish/discard")
            .write_all(chunk)?;
        Ok(())
    }

    /// Flushes and closes the completed file.
    ///
    /// # Errors
    /// Returns `Io` if the final flush fails.
    pub fn finish(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    /// Removes the partially written file after a session-fatal error.
    pub fn discard(mut self) {
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove partial upload");
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::protocol::CHUNK_SIZE;

    fn setup() -> (tempfile::TempDir, Storage, Name) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("data")).unwrap();
        let user = Name::new("alice").unwrap();
        storage.ensure_user_dir(&user).unwrap();
        (dir, storage, user)
    }

    #[test]
    fn empty_directory_lists_empty() {
        let (_dir, storage, user) = setup();
        assert!(storage.list_files(&user).unwrap().is_empty());
    }

    #[test]
    fn list_is_sorted_comma_joined_nul_terminated() {
        let (_dir, storage, user) = setup();
        for name in ["b.txt", "a.txt"] {
            let n = Name::new(name).unwrap();
            storage
                .create_for_write(&user, &n)
                .unwrap()
                .finish()
                .unwrap();
        }
        let list = storage.list_files(&user).unwrap();
        assert_eq!(list, b"a.txt,b.txt\0");
    }

    #[test]
    fn upload_roundtrip_via_chunks() {
        let (_dir, storage, user) = setup();
        let name = Name::new("blob.bin").unwrap();

        let payload: Vec<u8> = (0..2 * CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        let mut writer = storage.create_for_write(&user, &name).unwrap();
        for chunk in payload.chunks(CHUNK_SIZE) {
            writer.write_chunk(chunk).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = storage.open_for_read(&user, &name).unwrap();
        assert_eq!(reader.size(), payload.len() as u64);
        let plan = reader.chunk_plan();
        let mut out = Vec::new();
        for i in 0..plan.chunk_count() {
            out.extend(reader.read_chunk(plan.chunk_len(i)).unwrap());
        }
        assert_eq!(out, payload);
    }

    #[test]
    fn create_rejects_existing_name() {
        let (_dir, storage, user) = setup();
        let name = Name::new("dup.txt").unwrap();
        storage
            .create_for_write(&user, &name)
            .unwrap()
            .finish()
            .unwrap();
        assert!(matches!(
            storage.create_for_write(&user, &name),
            Err(StorageError::AlreadyExists)
        ));
    }

    #[test]
    fn read_rejects_missing_and_symlink() {
        let (_dir, storage, user) = setup();
        let missing = Name::new("missing").unwrap();
        assert!(matches!(
            storage.open_for_read(&user, &missing),
            Err(StorageError::NotFound)
        ));

        #[cfg(unix)]
        {
            let target = storage.user_dir(&user).join("target.txt");
            fs::write(&target, b"data").unwrap();
            let link = Name::new("link").unwrap();
            std::os::unix::fs::symlink(&target, storage.user_dir(&user).join("link")).unwrap();
            assert!(matches!(
                storage.open_for_read(&user, &link),
                Err(StorageError::NotFound)
            ));
        }
    }

    #[test]
    fn rename_semantics() {
        let (_dir, storage, user) = setup();
        let old = Name::new("old.txt").unwrap();
        let new = Name::new("new.txt").unwrap();

        assert!(matches!(
            storage.rename(&user, &old, &new),
            Err(StorageError::NotFound)
        ));

        storage
            .create_for_write(&user, &old)
            .unwrap()
            .finish()
            .unwrap();
        storage.rename(&user, &old, &new).unwrap();
        assert!(!storage.is_present(&user, &old));
        assert!(storage.is_present(&user, &new));

        storage
            .create_for_write(&user, &old)
            .unwrap()
            .finish()
            .unwrap();
        assert!(matches!(
            storage.rename(&user, &old, &new),
            Err(StorageError::AlreadyExists)
        ));
    }

    #[test]
    fn delete_semantics() {
        let (_dir, storage, user) = setup();
        let name = Name::new("gone.txt").unwrap();
        assert!(matches!(
            storage.delete(&user, &name),
            Err(StorageError::NotFound)
        ));

        storage
            .create_for_write(&user, &name)
            .unwrap()
            .finish()
            .unwrap();
        storage.delete(&user, &name).unwrap();
        assert!(!storage.is_present(&user, &name));
    }

    #[test]
    fn discard_removes_partial_file() {
        let (_dir, storage, user) = setup();
        let name = Name::new("partial.bin").unwrap();
        let mut writer = storage.create_for_write(&user, &name).unwrap();
        writer.write_chunk(&[0u8; 128]).unwrap();
        writer.discard();
        assert!(!storage.is_present(&user, &name));
    }

    #[test]
    fn users_are_confined_to_their_directories() {
        let (_dir, storage, user) = setup();
        let other = Name::new("bob").unwrap();
        storage.ensure_user_dir(&other).unwrap();

        let name = Name::new("secret.txt").unwrap();
        storage
            .create_for_write(&other, &name)
            .unwrap()
            .finish()
            .unwrap();
        assert!(!storage.is_present(&user, &name));
        assert!(storage.is_present(&other, &name));
    }
}
