//! object kinds and their canonical byte encoding
//!
//! every object is framed as `"<kind> <body_len>\0"` followed by the body;
//! the frame is what gets hashed and (gzip-compressed) written to disk.

pub mod commit;
pub mod tree;

pub use commit::{now_rfc3339, Commit};
pub use tree::{
    parse_entries, serialize_entries, sort_entries, validate_entry_name, EntryKind, TreeEntry,
    MODE_DIR, MODE_DIR_DEFAULT, MODE_FILE,
};

use crate::error::{Error, Result};
use crate::hash::{object_hash, Hash};

/// the three stored object kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// a decoded object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
    Commit(Commit),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// unwrap as commit or fail with the kind mismatch
    pub fn into_commit(self, hash: Hash) -> Result<Commit> {
        match self {
            Object::Commit(commit) => Ok(commit),
            other => Err(Error::UnexpectedObjectKind {
                hash,
                expected: "commit",
                actual: other.kind().label(),
            }),
        }
    }

    /// unwrap as tree entries or fail with the kind mismatch
    pub fn into_tree(self, hash: Hash) -> Result<Vec<TreeEntry>> {
        match self {
            Object::Tree(entries) => Ok(entries),
            other => Err(Error::UnexpectedObjectKind {
                hash,
                expected: "tree",
                actual: other.kind().label(),
            }),
        }
    }

    /// unwrap as blob bytes or fail with the kind mismatch
    pub fn into_blob(self, hash: Hash) -> Result<Vec<u8>> {
        match self {
            Object::Blob(bytes) => Ok(bytes),
            other => Err(Error::UnexpectedObjectKind {
                hash,
                expected: "blob",
                actual: other.kind().label(),
            }),
        }
    }
}

/// frame a body with its kind header; the result is what gets hashed
/// and stored
pub fn frame(kind: ObjectKind, body: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(body.len() + 16);
    framed.extend_from_slice(kind.label().as_bytes());
    framed.push(b' ');
    framed.extend_from_slice(body.len().to_string().as_bytes());
    framed.push(0);
    framed.extend_from_slice(body);
    framed
}

/// hash a body under its kind header
pub fn hash_body(kind: ObjectKind, body: &[u8]) -> Hash {
    object_hash(kind.label(), body)
}

/// decode a framed object
///
/// a header/body length mismatch, an unknown kind, or an unparseable body
/// is a fatal `CorruptObject`.
pub fn decode(hash: Hash, framed: &[u8]) -> Result<Object> {
    let corrupt = |reason: String| Error::CorruptObject { hash, reason };

    let nul = framed
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| corrupt("missing header terminator".to_string()))?;
    let header = std::str::from_utf8(&framed[..nul])
        .map_err(|_| corrupt("header is not utf-8".to_string()))?;
    let body = &framed[nul + 1..];

    let (label, len_str) = header
        .split_once(' ')
        .ok_or_else(|| corrupt(format!("malformed header {:?}", header)))?;
    let kind = ObjectKind::from_label(label)
        .ok_or_else(|| corrupt(format!("unknown object kind {:?}", label)))?;
    let declared: usize = len_str
        .parse()
        .map_err(|_| corrupt(format!("bad length {:?}", len_str)))?;

    if declared != body.len() {
        return Err(corrupt(format!(
            "declared length {} but body is {} bytes",
            declared,
            body.len()
        )));
    }

    match kind {
        ObjectKind::Blob => Ok(Object::Blob(body.to_vec())),
        ObjectKind::Tree => parse_entries(body).map(Object::Tree).map_err(corrupt),
        ObjectKind::Commit => Commit::parse(body).map(Object::Commit).map_err(corrupt),
    }
}
