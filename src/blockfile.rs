//! `BlockFile` (component C2): a scoped, exclusive, append-only random
//! access file. Higher layers never overwrite existing bytes; they only
//! append and then reread by offset.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::errors::{Result, StoreError};
use crate::value::{ByteSource, Value, decode_at, size_at};

/// Tracks canonical paths currently held open, standing in for the
/// "exclusive handle" discipline of spec §4.2 within a single process.
static OPEN_PATHS: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    ReadWrite,
}

/// An exclusively-held, append-only file.
pub struct BlockFile {
    file: File,
    mode: Mode,
    canonical: PathBuf,
}

impl BlockFile {
    /// Opens (creating if absent, in `ReadWrite` mode) an exclusive handle
    /// on `path`.
    ///
    /// # Errors
    /// Returns `StoreError::AlreadyOpen` if another handle on this process
    /// already holds `path`, `StoreError::NotFound` if opening read-only
    /// against a missing file, or `StoreError::Io` on any other failure.
    pub fn open(path: impl AsRef<Path>, mode: Mode) -> Result<Self> {
        let path = path.as_ref();
        if mode == Mode::Read && !path.exists() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        let mut opts = OpenOptions::new();
        opts.read(true);
        if mode == Mode::ReadWrite {
            opts.write(true).create(true);
        }
        let file = opts.open(path)?;
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        {
            let mut open = OPEN_PATHS.lock();
            if open.contains(&canonical) {
                return Err(StoreError::AlreadyOpen(canonical.display().to_string()));
            }
            open.insert(canonical.clone());
        }

        Ok(Self { file, mode, canonical })
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// # Errors
    /// Returns an error if the metadata query fails.
    pub fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Reads up to `len` bytes starting at `offset`. Returns fewer bytes
    /// only when the read reaches end of file.
    ///
    /// # Errors
    /// Returns an error if the underlying seek/read fails.
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        let mut total = 0usize;
        loop {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(total);
        Ok(buf)
    }

    /// Writes `bytes` at `offset`, overwriting/extending as needed.
    ///
    /// # Errors
    /// Returns `StoreError::ReadOnly` in `Read` mode, or an I/O error.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.require_writable()?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Appends `bytes` at the current end of file and returns the offset
    /// they were written at.
    ///
    /// # Errors
    /// See [`Self::write_at`].
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        self.require_writable()?;
        let at = self.size()?;
        self.write_at(at, bytes)?;
        Ok(at)
    }

    /// # Errors
    /// Returns `StoreError::ReadOnly` in `Read` mode, or an I/O error.
    pub fn truncate(&mut self, new_size: u64) -> Result<()> {
        self.require_writable()?;
        self.file.set_len(new_size)?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the flush syscall fails.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    #[must_use]
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// # Errors
    /// Returns an error if the file cannot be removed.
    pub fn delete(path: impl AsRef<Path>) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    /// Iterates successive top-level records from offset 0 using
    /// `size_at`, stopping cleanly at end of file.
    #[must_use]
    pub fn scan(&self) -> Scan<'_> {
        Scan { file: self, offset: 0, done: false }
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode == Mode::Read {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl ByteSource for BlockFile {
    fn read_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        self.read_range(offset, len).map_err(|e| match e {
            StoreError::Io(io) => io,
            other => std::io::Error::other(other.to_string()),
        })
    }
}

impl Drop for BlockFile {
    fn drop(&mut self) {
        OPEN_PATHS.lock().remove(&self.canonical);
    }
}

/// A single-pass, finite iterator over the top-level records of a
/// `BlockFile`.
pub struct Scan<'a> {
    file: &'a BlockFile,
    offset: u64,
    done: bool,
}

impl Iterator for Scan<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let file_size = match self.file.size() {
            Ok(s) => s,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if self.offset >= file_size {
            self.done = true;
            return None;
        }
        let size = match size_at(self.file, self.offset) {
            Ok(s) => s,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let bytes = match self.file.read_range(self.offset, size as usize) {
            Ok(b) => b,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        match decode_at(&bytes, 0) {
            Ok((value, _)) => {
                self.offset += size;
                Some(Ok(value))
            }
            Err(e) => {
                log::warn!("failed to decode record at offset {}: {e}", self.offset);
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
