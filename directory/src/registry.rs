use std::collections::HashMap;
use std::sync::Arc;

use netshare_common::model::{FileLocation, FileMetadata, PeerSummary};
use netshare_common::time::now_unix;
use netshare_common::token::generate_token;
use netshare_common::DirectoryError;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct PeerRecord {
    peer_id: String,
    username: String,
    host: String,
    port: u32,
    token: String,
    is_online: bool,
    last_seen: i64,
    files: HashMap<String, FileMetadata>,
    login_attempts: u32,
    created_at: i64,
}

impl PeerRecord {
    fn summary(&self) -> PeerSummary {
        PeerSummary {
            peer_id: self.peer_id.clone(),
            username: self.username.clone(),
            host: self.host.clone(),
            port: self.port,
            is_online: self.is_online,
            last_seen: self.last_seen,
            file_count: self.files.len() as u32,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    peers: HashMap<String, PeerRecord>,
    peer_index: HashMap<String, String>,
    username_index: HashMap<String, String>,
}

impl RegistryState {
    /// Looks up a record by token and, if online, bumps `last_seen`.
    /// Every authenticated operation routes through here exactly once.
    fn authenticate(&mut self, token: &str) -> Result<&mut PeerRecord, DirectoryError> {
        let record = self
            .peers
            .get_mut(token)
            .filter(|r| r.is_online)
            .ok_or(DirectoryError::Auth)?;
        record.last_seen = now_unix();
        Ok(record)
    }

    fn online_peers_excluding<'a>(&'a self, exclude_token: &'a str) -> impl Iterator<Item = &'a PeerRecord> {
        self.peers
            .values()
            .filter(move |p| p.is_online && p.token != exclude_token)
    }

    fn remove_record(&mut self, token: &str) {
        if let Some(record) = self.peers.remove(token) {
            self.peer_index.remove(&record.peer_id);
            self.username_index.remove(&record.username);
        }
    }
}

/// Tracks every peer currently known to the directory: session tokens, online
/// status, and each peer's published file catalog. Guarded by a single lock;
/// public methods acquire it exactly once and delegate to private helpers
/// that take `&mut RegistryState`, rather than re-entering the lock.
pub struct PeerRegistry {
    state: Arc<Mutex<RegistryState>>,
    max_login_attempts: u32,
    peer_timeout: i64,
}

impl Clone for PeerRegistry {
    fn clone(&self) -> Self {
        PeerRegistry {
            state: self.state.clone(),
            max_login_attempts: self.max_login_attempts,
            peer_timeout: self.peer_timeout,
        }
    }
}

impl PeerRegistry {
    pub fn new(max_login_attempts: u32, peer_timeout: i64) -> Self {
        PeerRegistry {
            state: Arc::new(Mutex::new(RegistryState::default())),
            max_login_attempts,
            peer_timeout,
        }
    }

    /// `password` is accepted but not checked against a credential store; the
    /// directory has none (see the login design note in DESIGN.md). A
    /// "failed" attempt for rate-limiting purposes is a username collision
    /// from a non-matching host.
    pub async fn login(
        &self,
        username: &str,
        _password: &str,
        peer_id: &str,
        host: &str,
        port: u32,
    ) -> Result<(String, Vec<PeerSummary>), DirectoryError> {
        let mut state = self.state.lock().await;

        if let Some(existing_token) = state.username_index.get(username).cloned() {
            let same_host = state
                .peers
                .get(&existing_token)
                .map(|r| r.host == host)
                .unwrap_or(false);

            if same_host {
                let record = state
                    .peers
                    .get_mut(&existing_token)
                    .expect("username_index entry without backing record");
                record.is_online = true;
                record.port = port;
                record.last_seen = now_unix();
                record.login_attempts = 0;

                let connected = state
                    .online_peers_excluding(&existing_token)
                    .map(PeerRecord::summary)
                    .collect();
                return Ok((existing_token, connected));
            }

            let attempts = {
                let record = state
                    .peers
                    .get_mut(&existing_token)
                    .expect("username_index entry without backing record");
                record.login_attempts += 1;
                record.login_attempts
            };

            if attempts > self.max_login_attempts {
                return Err(DirectoryError::RateLimited);
            }
            return Err(DirectoryError::Conflict(format!(
                "username {username} is already registered from a different host"
            )));
        }

        if state.peer_index.contains_key(peer_id) {
            return Err(DirectoryError::Conflict(format!(
                "peer_id {peer_id} is already registered"
            )));
        }

        let mut token = generate_token();
        while state.peers.contains_key(&token) {
            token = generate_token();
        }

        let now = now_unix();
        let record = PeerRecord {
            peer_id: peer_id.to_string(),
            username: username.to_string(),
            host: host.to_string(),
            port,
            token: token.clone(),
            is_online: true,
            last_seen: now,
            files: HashMap::new(),
            login_attempts: 0,
            created_at: now,
        };

        let connected = state
            .online_peers_excluding(&token)
            .map(PeerRecord::summary)
            .collect();

        state.peer_index.insert(peer_id.to_string(), token.clone());
        state.username_index.insert(username.to_string(), token.clone());
        state.peers.insert(token.clone(), record);

        Ok((token, connected))
    }

    pub async fn logout(&self, token: &str) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().await;
        let record = state.peers.get_mut(token).ok_or(DirectoryError::Auth)?;
        record.is_online = false;
        Ok(())
    }

    pub async fn index(&self, token: &str, files: Vec<FileMetadata>) -> Result<u32, DirectoryError> {
        let mut state = self.state.lock().await;
        let record = state.authenticate(token)?;

        let mut replacement = HashMap::with_capacity(files.len());
        for file in files {
            replacement.insert(file.filename.clone(), file);
        }
        let count = replacement.len() as u32;
        record.files = replacement;
        Ok(count)
    }

    pub async fn search(
        &self,
        token: &str,
        name: &str,
        pattern: &str,
    ) -> Result<Vec<FileLocation>, DirectoryError> {
        let mut state = self.state.lock().await;
        state.authenticate(token)?;

        let q_name = name.to_lowercase();
        let q_pattern = pattern.to_lowercase();
        if q_name.is_empty() && q_pattern.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for peer in state.online_peers_excluding(token) {
            let summary = peer.summary();
            for file in peer.files.values() {
                let lower = file.filename.to_lowercase();
                let matched = (!q_name.is_empty() && lower.contains(&q_name))
                    || (!q_pattern.is_empty() && lower.contains(&q_pattern));
                if !matched {
                    continue;
                }
                results.push(FileLocation {
                    download_url: format!(
                        "http://{}:{}/download/{}",
                        peer.host, peer.port, file.filename
                    ),
                    file: file.clone(),
                    peer: summary.clone(),
                    is_available: true,
                });
            }
        }
        Ok(results)
    }

    pub async fn get_peer_info(&self, token: &str) -> Result<Vec<PeerSummary>, DirectoryError> {
        let mut state = self.state.lock().await;
        state.authenticate(token)?;

        Ok(state
            .peers
            .values()
            .filter(|p| p.is_online)
            .map(PeerRecord::summary)
            .collect())
    }

    pub async fn heartbeat(&self, token: &str) -> Result<(i64, u32), DirectoryError> {
        let mut state = self.state.lock().await;
        state.authenticate(token)?;

        let active = state.peers.values().filter(|p| p.is_online).count() as u32;
        Ok((now_unix(), active))
    }

    /// Removes every record whose `last_seen` is older than `peer_timeout`,
    /// online or not, cleaning both secondary indexes in the same pass.
    pub async fn sweep(&self) {
        let mut state = self.state.lock().await;
        let cutoff = now_unix() - self.peer_timeout;
        let stale: Vec<String> = state
            .peers
            .iter()
            .filter(|(_, r)| r.last_seen < cutoff)
            .map(|(token, r)| {
                log::info!("sweep: removing inactive peer {} ({})", r.peer_id, token);
                token.clone()
            })
            .collect();
        for token in stale {
            state.remove_record(&token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(name: &str) -> FileMetadata {
        FileMetadata {
            filename: name.to_string(),
            relative_path: name.to_string(),
            size: 7,
            content_hash: "5eb63bbbe01eeed093cb22bb8f5acdc3".to_string(),
            last_modified: now_unix(),
            mime_type: "text/plain".to_string(),
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn login_then_search_returns_published_file() {
        let registry = PeerRegistry::new(3, 60);

        let (token_a, _) = registry
            .login("alice", "pw", "peer-a", "10.0.0.1", 9001)
            .await
            .unwrap();
        registry.index(&token_a, vec![sample_file("hello.txt")]).await.unwrap();

        let (token_b, connected) = registry
            .login("bob", "pw", "peer-b", "10.0.0.2", 9002)
            .await
            .unwrap();
        assert_eq!(connected.len(), 1);

        let results = registry.search(&token_b, "hello", "").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file.filename, "hello.txt");
        assert_eq!(results[0].download_url, "http://10.0.0.1:9001/download/hello.txt");
    }

    #[tokio::test]
    async fn empty_search_terms_yield_no_results() {
        let registry = PeerRegistry::new(3, 60);
        let (token_a, _) = registry.login("alice", "pw", "peer-a", "h", 1).await.unwrap();
        registry.index(&token_a, vec![sample_file("x.bin")]).await.unwrap();
        let (token_b, _) = registry.login("bob", "pw", "peer-b", "h2", 2).await.unwrap();

        let results = registry.search(&token_b, "", "").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn reconnect_from_same_host_reuses_token() {
        let registry = PeerRegistry::new(3, 60);
        let (token1, _) = registry.login("alice", "pw", "peer-a", "host1", 1).await.unwrap();
        registry.logout(&token1).await.unwrap();
        let (token2, _) = registry.login("alice", "pw", "peer-a", "host1", 1).await.unwrap();
        assert_eq!(token1, token2);
    }

    #[tokio::test]
    async fn login_with_username_owned_by_different_host_conflicts() {
        let registry = PeerRegistry::new(3, 60);
        registry.login("alice", "pw", "peer-a", "host1", 1).await.unwrap();
        let err = registry
            .login("alice", "pw", "peer-a2", "host2", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn repeated_host_mismatch_eventually_rate_limits() {
        let registry = PeerRegistry::new(2, 60);
        registry.login("alice", "pw", "peer-a", "host1", 1).await.unwrap();
        for _ in 0..2 {
            let err = registry.login("alice", "pw", "peer-a2", "host2", 2).await.unwrap_err();
            assert!(matches!(err, DirectoryError::Conflict(_)));
        }
        let err = registry.login("alice", "pw", "peer-a2", "host2", 2).await.unwrap_err();
        assert!(matches!(err, DirectoryError::RateLimited));
    }

    #[tokio::test]
    async fn logged_out_token_cannot_heartbeat() {
        let registry = PeerRegistry::new(3, 60);
        let (token, _) = registry.login("alice", "pw", "peer-a", "h", 1).await.unwrap();
        registry.logout(&token).await.unwrap();
        let err = registry.heartbeat(&token).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Auth));
    }

    #[tokio::test]
    async fn unknown_token_fails_auth() {
        let registry = PeerRegistry::new(3, 60);
        let err = registry.get_peer_info("not-a-real-token").await.unwrap_err();
        assert!(matches!(err, DirectoryError::Auth));
    }

    #[tokio::test]
    async fn sweep_removes_stale_peers_from_subsequent_lookups() {
        let registry = PeerRegistry::new(3, -1);
        let (token_a, _) = registry.login("alice", "pw", "peer-a", "h", 1).await.unwrap();
        let (token_b, _) = registry.login("bob", "pw", "peer-b", "h2", 2).await.unwrap();

        registry.sweep().await;

        let peers = registry.get_peer_info(&token_b).await;
        assert!(peers.is_err(), "bob's own token should have been swept too");
        let err = registry.heartbeat(&token_a).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Auth));
    }

    #[tokio::test]
    async fn republish_replaces_entire_catalog() {
        let registry = PeerRegistry::new(3, 60);
        let (token, _) = registry.login("alice", "pw", "peer-a", "h", 1).await.unwrap();
        registry
            .index(&token, vec![sample_file("a.txt"), sample_file("b.txt")])
            .await
            .unwrap();
        let count = registry.index(&token, vec![sample_file("c.txt")]).await.unwrap();
        assert_eq!(count, 1);

        let (token_b, _) = registry.login("bob", "pw", "peer-b", "h2", 2).await.unwrap();
        let results = registry.search(&token_b, "a", "").await.unwrap();
        assert!(results.is_empty());
        let results = registry.search(&token_b, "c", "").await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
