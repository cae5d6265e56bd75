// SPDX-License-Identifier: AGPL-3.0-or-later
//! Content-hashed asset store
//!
//! Assets are written through a [`ScopedWriter`], frozen to compute their
//! hash and size, then registered with [`AssetStore::add`]. The store keeps
//! entries in registration order, which is the document order of the
//! leaves that produced them. It does not deduplicate on its own; callers
//! check [`AssetStore::entry_exists`] or use [`AssetStore::reuse`].
//!
//! Three variants share the same contract:
//! - `InMemoryBase64`: bytes held in memory, referenced as `data:` URIs
//! - `TempFileGzip`: gzip-compressed temporary files, referenced as `assets/<file>`
//! - `Discard`: bytes hashed then dropped, referenced as `ref://<hash>`

use crate::traits::{BuildError, Result};
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempPath};

/// Scheme for store-internal references emitted in markup
pub const REF_SCHEME: &str = "ref://";

/// Directory holding external asset files
pub const ASSETS_DIR: &str = "assets";

/// Gzip header mtime (2000-01-01T00:00:00Z) so identical content compresses identically
const GZIP_MTIME: u32 = 946_684_800;

/// Number of hex digits kept from the SHA-256 digest
const HASH_LEN: usize = 10;

const TEMP_PREFIX: &str = "rx-";

/// Store implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreVariant {
    #[default]
    InMemoryBase64,
    TempFileGzip,
    Discard,
}

/// Handle a block keeps after its payload is registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    pub hash: String,
    pub mime: String,
    pub variant: StoreVariant,
}

impl EntryRef {
    /// `ref://<hash>`
    pub fn reference(&self) -> String {
        format!("{REF_SCHEME}{}", self.hash)
    }
}

#[derive(Debug, Clone)]
enum EntryData {
    Memory(Arc<[u8]>),
    Gzip { path: Arc<TempPath>, stored_size: u64 },
    Discarded,
}

/// A registered, read-only asset
///
/// Clones share the underlying bytes or file; spooled files are deleted when
/// the last clone drops.
#[derive(Debug, Clone)]
pub struct FrozenEntry {
    mime: String,
    ext: String,
    hash: String,
    size: u64,
    variant: StoreVariant,
    data: EntryData,
}

impl FrozenEntry {
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Uncompressed length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn variant(&self) -> StoreVariant {
        self.variant
    }

    /// `<hash><ext>`
    pub fn file_name(&self) -> String {
        format!("{}{}", self.hash, self.ext)
    }

    /// Bytes on disk for spooled entries, otherwise the content length
    pub fn stored_size(&self) -> u64 {
        match &self.data {
            EntryData::Gzip { stored_size, .. } => *stored_size,
            _ => self.size,
        }
    }

    pub fn entry_ref(&self) -> EntryRef {
        EntryRef {
            hash: self.hash.clone(),
            mime: self.mime.clone(),
            variant: self.variant,
        }
    }

    /// Uncompressed content; empty for discarded entries
    pub fn read_content(&self) -> Result<Vec<u8>> {
        match &self.data {
            EntryData::Memory(bytes) => Ok(bytes.to_vec()),
            EntryData::Gzip { path, .. } => {
                let mut content = Vec::with_capacity(self.size as usize);
                GzDecoder::new(File::open(&**path)?).read_to_end(&mut content)?;
                Ok(content)
            }
            EntryData::Discarded => Ok(Vec::new()),
        }
    }

    /// Copy the content to `sink`, gzip-compressed when `compressed`
    pub fn write_to(&self, sink: &mut dyn Write, compressed: bool) -> Result<()> {
        match (&self.data, compressed) {
            (EntryData::Gzip { path, .. }, true) => {
                io::copy(&mut File::open(&**path)?, sink)?;
            }
            (_, true) => {
                let mut encoder = gzip_encoder(sink);
                encoder.write_all(&self.read_content()?)?;
                encoder.finish()?;
            }
            (_, false) => sink.write_all(&self.read_content()?)?,
        }
        Ok(())
    }

    /// `data:<mime>;base64,<content>`
    pub fn data_uri(&self) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.read_content()?);
        Ok(format!("data:{};base64,{}", self.mime, encoded))
    }
}

fn gzip_encoder<W: Write>(sink: W) -> GzEncoder<W> {
    GzBuilder::new()
        .mtime(GZIP_MTIME)
        .write(sink, Compression::default())
}

enum Sink {
    Memory(Vec<u8>),
    Gzip(GzEncoder<NamedTempFile>),
    Discard,
}

/// Write-once sink for a new entry
pub struct ScopedWriter {
    ext: String,
    mime: String,
    variant: StoreVariant,
    sink: Option<Sink>,
    hasher: Sha256,
    written: u64,
}

impl ScopedWriter {
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(BuildError::FrozenEntryWriteError)?;
        match sink {
            Sink::Memory(bytes) => bytes.extend_from_slice(buf),
            Sink::Gzip(encoder) => encoder.write_all(buf)?,
            Sink::Discard => {}
        }
        self.hasher.update(buf);
        self.written += buf.len() as u64;
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.sink.is_none()
    }

    /// Finish writing, computing hash and size
    ///
    /// The writer rejects every write afterwards.
    pub fn freeze(&mut self) -> Result<FrozenEntry> {
        let sink = self.sink.take().ok_or(BuildError::FrozenEntryWriteError)?;
        let digest = std::mem::take(&mut self.hasher).finalize();
        let hash = hex::encode(digest)[..HASH_LEN].to_string();
        let data = match sink {
            Sink::Memory(bytes) => EntryData::Memory(bytes.into()),
            Sink::Gzip(encoder) => {
                let file = encoder.finish()?;
                let stored_size = file.as_file().metadata()?.len();
                EntryData::Gzip {
                    path: Arc::new(file.into_temp_path()),
                    stored_size,
                }
            }
            Sink::Discard => EntryData::Discarded,
        };
        tracing::debug!(hash = %hash, mime = %self.mime, size = self.written, "froze asset entry");
        Ok(FrozenEntry {
            mime: std::mem::take(&mut self.mime),
            ext: std::mem::take(&mut self.ext),
            hash,
            size: self.written,
            variant: self.variant,
            data,
        })
    }
}

impl Write for ScopedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(|err| match err {
            BuildError::IoError(io_err) => io_err,
            other => io::Error::other(other),
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(Sink::Gzip(encoder)) => encoder.flush(),
            _ => Ok(()),
        }
    }
}

/// Snapshot of one entry for embedding in an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub mime: String,
    pub size: u64,
    pub reference: String,
}

/// Hash to entry, in registration order
pub type Manifest = IndexMap<String, ManifestEntry>;

/// Asset collection for one build
#[derive(Debug)]
pub struct AssetStore {
    variant: StoreVariant,
    spool_dir: Option<PathBuf>,
    entries: Vec<FrozenEntry>,
    failed: bool,
}

impl AssetStore {
    pub fn new(variant: StoreVariant) -> Self {
        Self {
            variant,
            spool_dir: None,
            entries: Vec::new(),
            failed: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StoreVariant::InMemoryBase64)
    }

    pub fn temp_gzip() -> Self {
        Self::new(StoreVariant::TempFileGzip)
    }

    pub fn discard() -> Self {
        Self::new(StoreVariant::Discard)
    }

    /// Spool gzip entries under `dir` instead of the system temp directory
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    pub fn variant(&self) -> StoreVariant {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order
    pub fn entries(&self) -> &[FrozenEntry] {
        &self.entries
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(BuildError::StoreFailed);
        }
        Ok(())
    }

    /// Poison the store after a failed write
    pub fn mark_failed(&mut self) {
        tracing::warn!(entries = self.entries.len(), "asset store marked failed");
        self.failed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Allocate a writer for a new entry
    pub fn get_writer(&self, ext: &str, mime: &str) -> Result<ScopedWriter> {
        self.ensure_usable()?;
        let sink = match self.variant {
            StoreVariant::InMemoryBase64 => Sink::Memory(Vec::new()),
            StoreVariant::TempFileGzip => {
                let mut builder = tempfile::Builder::new();
                builder.prefix(TEMP_PREFIX).suffix(ext);
                let file = match &self.spool_dir {
                    Some(dir) => builder.tempfile_in(dir)?,
                    None => builder.tempfile()?,
                };
                Sink::Gzip(gzip_encoder(file))
            }
            StoreVariant::Discard => Sink::Discard,
        };
        Ok(ScopedWriter {
            ext: ext.to_string(),
            mime: mime.to_string(),
            variant: self.variant,
            sink: Some(sink),
            hasher: Sha256::new(),
            written: 0,
        })
    }

    /// Register a frozen entry
    pub fn add(&mut self, entry: FrozenEntry) -> Result<EntryRef> {
        self.ensure_usable()?;
        let entry_ref = entry.entry_ref();
        self.entries.push(entry);
        Ok(entry_ref)
    }

    /// Copy a file into a new entry
    pub fn load_from_path(&mut self, path: &Path) -> Result<EntryRef> {
        let ext = path_extension(path);
        let mime = guess_mime(&ext);
        let mut writer = self.get_writer(&ext, mime)?;
        let mut file = File::open(path)?;
        if let Err(err) = io::copy(&mut file, &mut writer) {
            self.mark_failed();
            return Err(err.into());
        }
        let entry = writer.freeze()?;
        self.add(entry)
    }

    pub fn entry_exists(&self, hash: &str) -> bool {
        self.entries.iter().any(|e| e.hash == hash)
    }

    pub fn get_entry(&self, hash: &str) -> Option<&FrozenEntry> {
        self.entries.iter().find(|e| e.hash == hash)
    }

    /// Register an existing entry again if this store holds it and the variant matches
    pub fn reuse(&mut self, entry_ref: &EntryRef) -> Result<Option<EntryRef>> {
        self.ensure_usable()?;
        if entry_ref.variant != self.variant {
            return Ok(None);
        }
        match self.get_entry(&entry_ref.hash).cloned() {
            Some(entry) => self.add(entry).map(Some),
            None => Ok(None),
        }
    }

    /// External reference for `entry` under this store's variant
    pub fn reference(&self, entry: &FrozenEntry) -> Result<String> {
        match self.variant {
            StoreVariant::InMemoryBase64 => entry.data_uri(),
            StoreVariant::TempFileGzip => Ok(format!("{ASSETS_DIR}/{}", entry.file_name())),
            StoreVariant::Discard => Ok(format!("{REF_SCHEME}{}", entry.hash)),
        }
    }

    /// Manifest with this variant's references
    pub fn as_manifest(&self) -> Result<Manifest> {
        self.manifest_with(|entry| self.reference(entry))
    }

    /// Manifest with caller-chosen references
    ///
    /// Keyed by hash: identical contents registered twice share one entry,
    /// listed at the position of the first registration.
    pub fn manifest_with<F>(&self, mut reference: F) -> Result<Manifest>
    where
        F: FnMut(&FrozenEntry) -> Result<String>,
    {
        let mut manifest = Manifest::with_capacity(self.entries.len());
        for entry in &self.entries {
            manifest.insert(
                entry.hash.clone(),
                ManifestEntry {
                    mime: entry.mime.clone(),
                    size: entry.size,
                    reference: reference(entry)?,
                },
            );
        }
        Ok(manifest)
    }
}

/// All suffixes of the file name, e.g. `.tar.gz`
fn path_extension(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.find('.').map(|idx| name[idx..].to_string()))
        .unwrap_or_default()
}

/// MIME type from the last suffix
pub fn guess_mime(ext: &str) -> &'static str {
    let last = ext.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match last.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "csv" => "text/csv",
        "txt" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "gz" => "application/gzip",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_manifest_follows_registration_order(
            blobs in prop::collection::hash_set(prop::collection::vec(any::<u8>(), 1..64), 1..8)
        ) {
            let mut store = AssetStore::in_memory();
            let mut expected = Vec::new();
            for blob in &blobs {
                let mut writer = store.get_writer(".bin", "application/octet-stream").unwrap();
                writer.write_bytes(blob).unwrap();
                let entry = writer.freeze().unwrap();
                expected.push(store.add(entry).unwrap().hash);
            }
            let manifest = store.as_manifest().unwrap();
            let hashes: Vec<String> = manifest.keys().cloned().collect();
            prop_assert_eq!(hashes, expected);
        }
    }
}
