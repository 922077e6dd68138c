use serde::{Deserialize, Serialize};

/// Metadata for a single file published by a peer.
///
/// `content_hash` is MD5 hex, used purely for integrity display, not for
/// security or dedup. An empty string is only valid when hashing failed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    pub filename: String,
    pub relative_path: String,
    pub size: u64,
    pub content_hash: String,
    pub last_modified: i64,
    pub mime_type: String,
    pub tags: Vec<String>,
}

impl FileMetadata {
    pub fn default_mime() -> &'static str {
        "application/octet-stream"
    }
}

/// Snapshot of a peer as seen by the directory or cached by a PC session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerSummary {
    pub peer_id: String,
    pub username: String,
    pub host: String,
    pub port: u32,
    pub is_online: bool,
    pub last_seen: i64,
    pub file_count: u32,
}

/// A single search hit: a file plus the peer that holds it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileLocation {
    pub file: FileMetadata,
    pub peer: PeerSummary,
    pub download_url: String,
    pub is_available: bool,
}
