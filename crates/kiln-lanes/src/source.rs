// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sources of raw resource bytes.

use ahash::{AHashMap, AHashSet};
use kiln_core::asset::DecodeError;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// First word of every archive.
pub const ARCHIVE_MAGIC: u32 = 0x012F_5B66;
/// The archive layout version this crate reads and writes.
pub const ARCHIVE_VERSION: u32 = 1;

/// Reads the raw bytes behind a resource path.
///
/// Called from worker threads, possibly from several at once.
pub trait ResourceSource: Send + Sync {
    /// Reads the whole resource at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>, DecodeError>;
}

/// Reads resources from files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceSource for DirectorySource {
    fn read(&self, path: &str) -> Result<Vec<u8>, DecodeError> {
        let full = self.root.join(path);
        std::fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DecodeError::Missing {
                path: path.to_string(),
            },
            _ => DecodeError::Io {
                path: path.to_string(),
                message: format!("{}: {e}", full.display()),
            },
        })
    }
}

/// An in-memory source, mostly for tests and embedded data.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: RwLock<AHashMap<String, Vec<u8>>>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` under `path`, replacing any previous entry.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), bytes.into());
    }

    /// Removes the entry at `path`. Returns `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the source holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceSource for MemorySource {
    fn read(&self, path: &str) -> Result<Vec<u8>, DecodeError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| DecodeError::Missing {
                path: path.to_string(),
            })
    }
}

/// Errors raised while opening or writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive file could not be read or written.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The file does not start with [`ARCHIVE_MAGIC`].
    #[error("not an archive (magic {0:#010x})")]
    BadMagic(u32),
    /// The archive was written by an unknown layout version.
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u32),
    /// An entry of the index is unusable.
    #[error("corrupt archive index: {0}")]
    CorruptIndex(String),
    /// An entry does not fit the 32-bit layout.
    #[error("'{0}' is too large for an archive")]
    TooLarge(String),
}

/// Where one file lives inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArchiveEntry {
    offset: u64,
    size: u64,
}

/// Reads resources packed in a single archive file.
///
/// The layout is little-endian throughout: magic, version and file count,
/// then one index record per file (path length, path bytes, size, absolute
/// data offset), then the file data. Only the index is kept in memory; every
/// read opens the archive and seeks to the requested entry, so concurrent
/// workers never share a file cursor.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    path: PathBuf,
    entries: AHashMap<String, ArchiveEntry>,
}

impl ArchiveSource {
    /// Opens the archive at `path` and reads its index.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let file = File::open(&path)?;
        let archive_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let magic = read_u32(&mut reader)?;
        if magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::BadMagic(magic));
        }
        let version = read_u32(&mut reader)?;
        if version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let count = read_u32(&mut reader)?;
        let mut entries = AHashMap::with_capacity(count as usize);
        for _ in 0..count {
            let name_len = read_u32(&mut reader)? as usize;
            let mut name = vec![0u8; name_len];
            reader.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| ArchiveError::CorruptIndex("path is not UTF-8".to_string()))?;
            let size = u64::from(read_u32(&mut reader)?);
            let offset = u64::from(read_u32(&mut reader)?);
            if offset + size > archive_len {
                return Err(ArchiveError::CorruptIndex(format!(
                    "'{name}' ends past the end of the archive"
                )));
            }
            entries.insert(name, ArchiveEntry { offset, size });
        }

        log::info!("Archive '{}' opened ({} file(s))", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    /// The archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the archive holds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of files in the archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the archive holds no file.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn io_error(&self, name: &str, e: std::io::Error) -> DecodeError {
        DecodeError::Io {
            path: name.to_string(),
            message: format!("{}: {e}", self.path.display()),
        }
    }
}

impl ResourceSource for ArchiveSource {
    fn read(&self, path: &str) -> Result<Vec<u8>, DecodeError> {
        let entry = self.entries.get(path).ok_or_else(|| DecodeError::Missing {
            path: path.to_string(),
        })?;
        let mut file = File::open(&self.path).map_err(|e| self.io_error(path, e))?;
        file.seek(SeekFrom::Start(entry.offset))
            .map_err(|e| self.io_error(path, e))?;
        let mut bytes = vec![0u8; entry.size as usize];
        file.read_exact(&mut bytes)
            .map_err(|e| self.io_error(path, e))?;
        Ok(bytes)
    }
}

/// Writes `files` as an archive at `dest`, replacing any existing file.
///
/// Fails with [`ArchiveError::CorruptIndex`] for an empty or duplicated
/// file list.
pub fn write_archive(dest: impl AsRef<Path>, files: &[(&str, &[u8])]) -> Result<(), ArchiveError> {
    if files.is_empty() {
        return Err(ArchiveError::CorruptIndex("an archive needs at least one file".to_string()));
    }
    let mut seen = AHashSet::with_capacity(files.len());
    for (name, _) in files {
        if !seen.insert(*name) {
            return Err(ArchiveError::CorruptIndex(format!("'{name}' listed twice")));
        }
    }

    let fits = |value: usize, name: &str| {
        u32::try_from(value).map_err(|_| ArchiveError::TooLarge(name.to_string()))
    };
    let index_len: usize = 12 + files.iter().map(|(name, _)| 12 + name.len()).sum::<usize>();
    let mut offset = index_len;

    let mut writer = BufWriter::new(File::create(dest.as_ref())?);
    writer.write_all(&ARCHIVE_MAGIC.to_le_bytes())?;
    writer.write_all(&ARCHIVE_VERSION.to_le_bytes())?;
    writer.write_all(&fits(files.len(), "<index>")?.to_le_bytes())?;
    for (name, data) in files {
        writer.write_all(&fits(name.len(), name)?.to_le_bytes())?;
        writer.write_all(name.as_bytes())?;
        writer.write_all(&fits(data.len(), name)?.to_le_bytes())?;
        writer.write_all(&fits(offset, name)?.to_le_bytes())?;
        offset += data.len();
    }
    for (_, data) in files {
        writer.write_all(data)?;
    }
    writer.flush()?;

    log::debug!(
        "Archive '{}' written ({} file(s))",
        dest.as_ref().display(),
        files.len()
    );
    Ok(())
}

fn read_u32(reader: &mut impl Read) -> Result<u32, ArchiveError> {
    let mut word = [0u8; 4];
    reader.read_exact(&mut word)?;
    Ok(u32::from_le_bytes(word))
}

/// Tries several sources in order and returns the first hit.
///
/// A layer reporting [`DecodeError::Missing`] passes the request on; any
/// other error stops the lookup. Typical use puts a [`DirectorySource`] in
/// front of an [`ArchiveSource`] so loose files override packed ones.
#[derive(Clone, Default)]
pub struct LayeredSource {
    layers: Vec<Arc<dyn ResourceSource>>,
}

impl LayeredSource {
    /// Creates a source with no layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer consulted after every existing one.
    pub fn with_layer(mut self, layer: Arc<dyn ResourceSource>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layer was added.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl std::fmt::Debug for LayeredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredSource")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl ResourceSource for LayeredSource {
    fn read(&self, path: &str) -> Result<Vec<u8>, DecodeError> {
        for layer in &self.layers {
            match layer.read(path) {
                Err(DecodeError::Missing { .. }) => continue,
                result => return result,
            }
        }
        Err(DecodeError::Missing {
            path: path.to_string(),
        })
    }
}
