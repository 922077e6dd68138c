use std::collections::HashMap;
use std::path::{Path, PathBuf};

use netshare_common::hash::hash_file_async;
use netshare_common::mime::guess_mime;
use netshare_common::model::FileMetadata;
use netshare_common::DirectoryError;
use tokio::sync::Mutex;
use walkdir::WalkDir;

/// The peer's local file catalog. Scans are non-recursive and idempotent;
/// the index is replaced wholesale on every scan so readers never observe a
/// partially-rebuilt map.
pub struct FileManager {
    shared_root: PathBuf,
    index: Mutex<HashMap<String, FileMetadata>>,
}

impl FileManager {
    pub fn new(shared_root: impl Into<PathBuf>) -> Self {
        FileManager {
            shared_root: shared_root.into(),
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared_root(&self) -> &Path {
        &self.shared_root
    }

    /// Rebuilds the catalog from the top-level entries of `shared_root`
    /// (no recursion into subdirectories) and returns the fresh file list.
    pub async fn scan(&self) -> Vec<FileMetadata> {
        tokio::fs::create_dir_all(&self.shared_root).await.ok();

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.shared_root).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    log::warn!("scan: skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            entries.push(entry.into_path());
        }

        let mut fresh = HashMap::with_capacity(entries.len());
        for path in entries {
            match self.metadata_for(&path).await {
                Ok(meta) => {
                    fresh.insert(meta.filename.clone(), meta);
                }
                Err(err) => log::warn!("scan: could not stat {}: {err}", path.display()),
            }
        }

        let files: Vec<FileMetadata> = fresh.values().cloned().collect();
        let mut index = self.index.lock().await;
        *index = fresh;
        files
    }

    async fn metadata_for(&self, path: &Path) -> std::io::Result<FileMetadata> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "non-utf8 filename"))?
            .to_string();
        let stat = tokio::fs::metadata(path).await?;
        let last_modified = stat
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let content_hash = hash_file_async(path.to_path_buf()).await;
        let mime_type = guess_mime(path);

        Ok(FileMetadata {
            filename: filename.clone(),
            relative_path: filename,
            size: stat.len(),
            content_hash,
            last_modified,
            mime_type,
            tags: Vec::new(),
        })
    }

    pub async fn files(&self) -> Vec<FileMetadata> {
        self.index.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    /// Resolves `filename` to a path inside `shared_root`, rejecting any
    /// attempt to escape it via separators or `..` components.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, DirectoryError> {
        let candidate = Path::new(filename);
        let is_safe = candidate
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
            && candidate.components().count() == 1;
        if !is_safe {
            return Err(DirectoryError::BadRequest(format!("invalid filename: {filename}")));
        }
        Ok(self.shared_root.join(candidate))
    }

    /// Writes `bytes` as `filename` under `shared_root`, overwriting any
    /// existing file of the same name, then triggers a rescan.
    pub async fn write_upload(&self, filename: &str, bytes: &[u8]) -> Result<(), DirectoryError> {
        let path = self.resolve(filename)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| DirectoryError::Internal(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_picks_up_top_level_files_only() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"hello world").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("sub").join("b.txt"), b"nested").await.unwrap();

        let manager = FileManager::new(dir.path());
        let files = manager.scan().await;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "a.txt");
        assert_eq!(files[0].content_hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[tokio::test]
    async fn resolve_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FileManager::new(dir.path());
        assert!(manager.resolve("../secret").is_err());
        assert!(manager.resolve("sub/inner.txt").is_err());
        assert!(manager.resolve("plain.txt").is_ok());
    }

    #[tokio::test]
    async fn upload_then_scan_reflects_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FileManager::new(dir.path());
        manager.write_upload("doc.pdf", b"content").await.unwrap();
        let files = manager.scan().await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "doc.pdf");
    }
}
