use std::io::Read;
use std::path::Path;

/// Computes the MD5 hex digest of a file by reading it in fixed-size
/// chunks. Returns an empty string if the file cannot be read, per
/// spec: "empty string allowed only if hashing failed".
pub fn hash_file_sync(path: &Path) -> String {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return String::new(),
    };

    let mut reader = std::io::BufReader::new(file);
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 1_000_000];

    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => return String::new(),
        };

        context.consume(&buffer[..count]);
    }

    format!("{:x}", context.compute())
}

/// Async wrapper around [`hash_file_sync`] for use from request handlers
/// that must not block the executor while hashing.
pub async fn hash_file_async(path: std::path::PathBuf) -> String {
    tokio::task::spawn_blocking(move || hash_file_sync(&path))
        .await
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn hashes_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"hello world")
            .unwrap();

        let hash = hash_file_async(path).await;

        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn missing_file_yields_empty_hash() {
        let hash = hash_file_sync(Path::new("/nonexistent/path/does-not-exist"));

        assert_eq!(hash, "");
    }
}
