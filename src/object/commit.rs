use chrono::{SecondsFormat, Utc};

use crate::hash::Hash;

/// a checkpoint commit pointing at a root tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    /// root tree hash
    pub tree: Hash,
    /// parent commit hashes (empty for the first checkpoint)
    pub parents: Vec<Hash>,
    /// author identity
    pub author: String,
    /// RFC 3339 timestamp; the canonical form compares chronologically
    /// as a plain string
    pub timestamp: String,
    /// commit message
    pub message: String,
}

impl Commit {
    /// create a new commit stamped with the current time
    pub fn new(
        tree: Hash,
        parents: Vec<Hash>,
        author: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author: author.into(),
            timestamp: now_rfc3339(),
            message: message.into(),
        }
    }

    /// create a commit with an explicit timestamp
    pub fn with_timestamp(
        tree: Hash,
        parents: Vec<Hash>,
        author: impl Into<String>,
        timestamp: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author: author.into(),
            timestamp: timestamp.into(),
            message: message.into(),
        }
    }

    /// is this an initial commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// is this a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// serialize to the text body stored in the object
    pub fn encode(&self) -> Vec<u8> {
        let mut text = String::new();
        text.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            text.push_str(&format!("parent {}\n", parent));
        }
        text.push_str(&format!("author {}\n", self.author));
        text.push_str(&format!("timestamp {}\n", self.timestamp));
        text.push('\n');
        text.push_str(&self.message);
        text.into_bytes()
    }

    /// parse the text body of a commit object
    pub fn parse(body: &[u8]) -> std::result::Result<Self, String> {
        let text = std::str::from_utf8(body).map_err(|_| "commit body is not utf-8")?;

        let (header, message) = match text.split_once("\n\n") {
            Some((h, m)) => (h, m.to_string()),
            None => (text.trim_end_matches('\n'), String::new()),
        };

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = String::new();
        let mut timestamp = String::new();

        for line in header.lines() {
            if let Some(hex) = line.strip_prefix("tree ") {
                tree = Some(Hash::from_hex(hex).map_err(|_| format!("bad tree hash {:?}", hex))?);
            } else if let Some(hex) = line.strip_prefix("parent ") {
                parents
                    .push(Hash::from_hex(hex).map_err(|_| format!("bad parent hash {:?}", hex))?);
            } else if let Some(rest) = line.strip_prefix("author ") {
                author = rest.to_string();
            } else if let Some(rest) = line.strip_prefix("timestamp ") {
                timestamp = rest.to_string();
            } else {
                return Err(format!("unknown commit header line {:?}", line));
            }
        }

        let tree = tree.ok_or("commit has no tree line")?;

        Ok(Self {
            tree,
            parents,
            author,
            timestamp,
            message,
        })
    }
}

/// current time as a fixed-width RFC 3339 string (UTC, millisecond
/// precision) so timestamps order correctly under byte comparison
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
