use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{self, Commit, Object, ObjectKind, TreeEntry};

/// how long a cached object listing stays valid
const LIST_CACHE_TTL: Duration = Duration::from_secs(5);

/// aggregate numbers reported by [`ObjectStore::stats`]
#[derive(Debug, Default, Clone)]
pub struct StoreStats {
    pub blob_count: usize,
    pub tree_count: usize,
    pub commit_count: usize,
    /// bytes the objects occupy on disk (gzip-compressed)
    pub compressed_bytes: u64,
    /// total uncompressed size of all blob bodies
    pub uncompressed_blob_bytes: u64,
    /// compressed / uncompressed, a proxy for dedup + compression savings
    pub ratio: f64,
}

impl StoreStats {
    pub fn object_count(&self) -> usize {
        self.blob_count + self.tree_count + self.commit_count
    }
}

/// content-addressed object store over `objects/<2hex>/<62hex>`
///
/// objects are immutable once written; `put_*` is idempotent because the
/// key is the content hash. callers serialize overlapping writes (one
/// logical writer per project directory); the listing cache below is a
/// listing cache only, never a parsed-object cache, and the filesystem
/// stays the source of truth.
pub struct ObjectStore {
    objects_dir: PathBuf,
    compression: Compression,
    list_cache: Mutex<Option<(Instant, Vec<Hash>)>>,
}

impl ObjectStore {
    pub fn new(objects_dir: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            objects_dir: objects_dir.into(),
            compression,
            list_cache: Mutex::new(None),
        }
    }

    /// create the objects directory (idempotent)
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.objects_dir).with_path(&self.objects_dir)
    }

    /// filesystem path of an object
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        let (dir, file) = hash.to_path_components();
        self.objects_dir.join(dir).join(file)
    }

    /// check if an object exists
    pub fn has(&self, hash: &Hash) -> bool {
        self.object_path(hash).exists()
    }

    /// store a blob, returning its hash
    pub fn put_blob(&self, content: &[u8]) -> Result<Hash> {
        self.put(ObjectKind::Blob, content)
    }

    /// store a tree; entries are validated and sorted into canonical order
    pub fn put_tree(&self, entries: &[TreeEntry]) -> Result<Hash> {
        let body = object::serialize_entries(entries)?;
        self.put(ObjectKind::Tree, &body)
    }

    /// store a commit
    pub fn put_commit(&self, commit: &Commit) -> Result<Hash> {
        self.put(ObjectKind::Commit, &commit.encode())
    }

    fn put(&self, kind: ObjectKind, body: &[u8]) -> Result<Hash> {
        let hash = object::hash_body(kind, body);
        let (shard, file) = hash.to_path_components();
        let shard_dir = self.objects_dir.join(shard);
        let path = shard_dir.join(file);

        // dedup: identical content is already on disk under this key
        if path.exists() {
            return Ok(hash);
        }

        fs::create_dir_all(&shard_dir).with_path(&shard_dir)?;

        let framed = object::frame(kind, body);
        let mut encoder = GzEncoder::new(Vec::new(), self.compression);
        encoder.write_all(&framed).with_path(&path)?;
        let compressed = encoder.finish().with_path(&path)?;

        // atomic write: uniquely named sibling, then rename into place
        let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(&compressed).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Io { path, source });
        }

        self.invalidate_cache();
        Ok(hash)
    }

    /// read and decode an object
    pub fn get(&self, hash: &Hash) -> Result<Object> {
        let path = self.object_path(hash);
        let compressed = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ObjectNotFound(*hash)
            } else {
                Error::Io { path, source: e }
            }
        })?;

        let mut framed = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut framed)
            .map_err(|e| Error::CorruptObject {
                hash: *hash,
                reason: format!("gunzip failed: {}", e),
            })?;

        object::decode(*hash, &framed)
    }

    /// read a commit object, failing on any other kind
    pub fn get_commit(&self, hash: &Hash) -> Result<Commit> {
        self.get(hash)?.into_commit(*hash)
    }

    /// read a tree object, failing on any other kind
    pub fn get_tree(&self, hash: &Hash) -> Result<Vec<TreeEntry>> {
        self.get(hash)?.into_tree(*hash)
    }

    /// read a blob object, failing on any other kind
    pub fn get_blob(&self, hash: &Hash) -> Result<Vec<u8>> {
        self.get(hash)?.into_blob(*hash)
    }

    /// remove an object; used by gc and explicit delete/reset
    pub fn delete(&self, hash: &Hash) -> Result<()> {
        let path = self.object_path(hash);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ObjectNotFound(*hash)
            } else {
                Error::Io { path, source: e }
            }
        })?;
        self.invalidate_cache();
        Ok(())
    }

    /// list every stored hash
    ///
    /// only paths shaped `<2hex>/<62hex>` count; stray temp files and
    /// foreign names are ignored. results are cached briefly and the
    /// cache dropped on any write.
    pub fn list(&self) -> Result<Vec<Hash>> {
        {
            let cache = self.list_cache.lock().expect("list cache poisoned");
            if let Some((taken_at, hashes)) = cache.as_ref() {
                if taken_at.elapsed() < LIST_CACHE_TTL {
                    return Ok(hashes.clone());
                }
            }
        }

        let mut hashes = Vec::new();
        if self.objects_dir.exists() {
            for entry in WalkDir::new(&self.objects_dir).min_depth(2).max_depth(2) {
                let entry = entry.map_err(|e| Error::Io {
                    path: self.objects_dir.clone(),
                    source: e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walkdir error")),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(hash) = hash_from_object_path(entry.path()) {
                    hashes.push(hash);
                }
            }
        }

        let mut cache = self.list_cache.lock().expect("list cache poisoned");
        *cache = Some((Instant::now(), hashes.clone()));
        Ok(hashes)
    }

    /// aggregate counts and sizes across the store
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();

        for hash in self.list()? {
            let path = self.object_path(&hash);
            if let Ok(meta) = fs::metadata(&path) {
                stats.compressed_bytes += meta.len();
            }
            match self.get(&hash)? {
                Object::Blob(bytes) => {
                    stats.blob_count += 1;
                    stats.uncompressed_blob_bytes += bytes.len() as u64;
                }
                Object::Tree(_) => stats.tree_count += 1,
                Object::Commit(_) => stats.commit_count += 1,
            }
        }

        if stats.uncompressed_blob_bytes > 0 {
            stats.ratio = stats.compressed_bytes as f64 / stats.uncompressed_blob_bytes as f64;
        }
        Ok(stats)
    }

    fn invalidate_cache(&self) {
        let mut cache = self.list_cache.lock().expect("list cache poisoned");
        *cache = None;
    }
}

/// reconstruct a hash from `objects/<2hex>/<62hex>`, rejecting anything
/// that does not match that shape exactly
fn hash_from_object_path(path: &Path) -> Option<Hash> {
    let file_name = path.file_name()?.to_str()?;
    let shard = path.parent()?.file_name()?.to_str()?;

    if shard.len() != 2 || file_name.len() != 62 {
        return None;
    }
    if !is_lower_hex(shard) || !is_lower_hex(file_name) {
        return None;
    }

    Hash::from_hex(&format!("{}{}", shard, file_name)).ok()
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
