use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::hash::Hash;

/// directory entry mode bits
pub const MODE_DIR: u32 = 0o040000;
/// default mode for regular files when the platform has none
pub const MODE_FILE: u32 = 0o100644;
/// default mode for directories when the platform has none
pub const MODE_DIR_DEFAULT: u32 = 0o040755;

const MODE_KIND_MASK: u32 = 0o170000;

/// what a tree entry points at, derived from its mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Tree,
}

/// a single entry in a tree object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub mode: u32,
    pub hash: Hash,
    pub size: u64,
}

impl TreeEntry {
    /// create a file entry
    pub fn blob(name: impl Into<String>, mode: u32, hash: Hash, size: u64) -> Self {
        Self {
            name: name.into(),
            mode,
            hash,
            size,
        }
    }

    /// create a directory entry (size is always 0)
    pub fn tree(name: impl Into<String>, mode: u32, hash: Hash) -> Self {
        Self {
            name: name.into(),
            mode,
            hash,
            size: 0,
        }
    }

    pub fn kind(&self) -> EntryKind {
        if self.is_tree() {
            EntryKind::Tree
        } else {
            EntryKind::Blob
        }
    }

    pub fn is_tree(&self) -> bool {
        self.mode & MODE_KIND_MASK == MODE_DIR
    }

    /// ordering key: directory names compare as if suffixed with '/'
    ///
    /// this keeps tree bytes stable no matter how the filesystem returned
    /// the entries ("foo" sorts before "foo-bar", but a directory "foo"
    /// sorts as "foo/", after it).
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if self.is_tree() {
            key.push(b'/');
        }
        key
    }
}

/// validate an entry name for the wire format
pub fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    for forbidden in ['/', '\0', '\n'] {
        if name.contains(forbidden) {
            return Err(Error::InvalidEntryName(format!(
                "name contains {:?}: {}",
                forbidden, name
            )));
        }
    }
    Ok(())
}

/// sort entries into canonical order
pub fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// serialize entries into a tree object body
///
/// entries are validated, checked for duplicate names and sorted first;
/// each becomes `"<mode_octal> <name> <size>\0"` followed by the 32 raw
/// hash bytes.
pub fn serialize_entries(entries: &[TreeEntry]) -> Result<Vec<u8>> {
    let mut seen = HashSet::new();
    for entry in entries {
        validate_entry_name(&entry.name)?;
        if !seen.insert(entry.name.as_str()) {
            return Err(Error::InvalidEntryName(format!(
                "duplicate name: {}",
                entry.name
            )));
        }
    }

    let mut sorted = entries.to_vec();
    sort_entries(&mut sorted);

    let mut body = Vec::new();
    for entry in &sorted {
        body.extend_from_slice(format!("{:o} ", entry.mode).as_bytes());
        body.extend_from_slice(entry.name.as_bytes());
        body.extend_from_slice(format!(" {}", entry.size).as_bytes());
        body.push(0);
        body.extend_from_slice(entry.hash.as_bytes());
    }
    Ok(body)
}

/// parse a tree object body
///
/// accepts the current form `"<mode> <name> <size>\0" ‖ hash` and the
/// legacy form without the size field (size reads as 0). the size is the
/// last space-separated token of the header when that token is all digits,
/// which lets names keep their embedded spaces.
pub fn parse_entries(body: &[u8]) -> std::result::Result<Vec<TreeEntry>, String> {
    let mut entries = Vec::new();
    let mut rest = body;

    while !rest.is_empty() {
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or("entry header missing NUL terminator")?;
        let header =
            std::str::from_utf8(&rest[..nul]).map_err(|_| "entry header is not utf-8")?;
        rest = &rest[nul + 1..];

        if rest.len() < 32 {
            return Err("entry truncated before hash".to_string());
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&rest[..32]);
        rest = &rest[32..];

        let (mode_str, tail) = header
            .split_once(' ')
            .ok_or_else(|| format!("malformed entry header: {:?}", header))?;
        let mode = u32::from_str_radix(mode_str, 8)
            .map_err(|_| format!("bad mode {:?}", mode_str))?;

        let (name, size) = match tail.rsplit_once(' ') {
            Some((name, digits))
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let size = digits
                    .parse::<u64>()
                    .map_err(|_| format!("bad size {:?}", digits))?;
                (name, size)
            }
            // legacy entries carry no size field
            _ => (tail, 0),
        };

        if name.is_empty() {
            return Err("entry with empty name".to_string());
        }

        entries.push(TreeEntry {
            name: name.to_string(),
            mode,
            hash: Hash::from_bytes(raw),
            size,
        });
    }

    Ok(entries)
}
