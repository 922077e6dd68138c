use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use netshare_common::model::{FileLocation, FileMetadata, PeerSummary};
use netshare_common::DirectoryError;
use netshare_proto::peer_directory_client::PeerDirectoryClient;
use netshare_proto::{
    FileMetadata as WireFileMetadata, HeartbeatRequest, IndexRequest, LoginRequest, LogoutRequest,
    PeerInfo as WirePeerInfo, PeerInfoRequest, SearchRequest,
};
use tokio::sync::{oneshot, Mutex};
use tonic::transport::Channel;
use tonic::Status;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ClientIdentity {
    pub peer_id: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u32,
    pub server_url: String,
    pub primary_friend: String,
    pub backup_friend: String,
    pub connection_timeout: Duration,
    pub heartbeat_interval: Duration,
}

fn from_status(status: Status) -> DirectoryError {
    use tonic::Code;
    let message = status.message().to_string();
    match status.code() {
        Code::Unauthenticated => DirectoryError::Auth,
        Code::InvalidArgument => DirectoryError::Conflict(message),
        Code::ResourceExhausted => DirectoryError::RateLimited,
        Code::NotFound => DirectoryError::NotFound(message),
        Code::Unavailable => DirectoryError::Unavailable(message),
        _ => DirectoryError::Internal(message),
    }
}

fn wire_metadata(f: FileMetadata) -> WireFileMetadata {
    WireFileMetadata {
        filename: f.filename,
        file_path: f.relative_path,
        file_size: f.size,
        file_hash: f.content_hash,
        last_modified: f.last_modified,
        mime_type: f.mime_type,
        tags: f.tags,
    }
}

fn summary_from_wire(p: WirePeerInfo) -> PeerSummary {
    PeerSummary {
        peer_id: p.peer_id,
        username: p.username,
        host: p.url,
        port: p.port,
        is_online: p.is_online,
        last_seen: p.last_seen,
        file_count: p.file_count,
    }
}

fn location_from_wire(loc: netshare_proto::FileLocation) -> Option<FileLocation> {
    Some(FileLocation {
        file: loc.file_info.map(|f| FileMetadata {
            filename: f.filename,
            relative_path: f.file_path,
            size: f.file_size,
            content_hash: f.file_hash,
            last_modified: f.last_modified,
            mime_type: f.mime_type,
            tags: f.tags,
        })?,
        peer: loc.peer_info.map(summary_from_wire)?,
        download_url: loc.download_url,
        is_available: loc.is_available,
    })
}

struct Inner {
    rpc: Option<PeerDirectoryClient<Channel>>,
    token: Option<String>,
    known_peers: HashMap<String, PeerSummary>,
    connected: bool,
    heartbeat_cancel: Option<oneshot::Sender<()>>,
}

/// The outbound side of a peer: owns the one RPC session to the directory
/// and drives login, indexing, search, and download. `PeerClient` is the
/// only component permitted to hold the session token.
pub struct PeerClient {
    identity: Arc<ClientIdentity>,
    inner: Arc<Mutex<Inner>>,
}

impl Clone for PeerClient {
    fn clone(&self) -> Self {
        PeerClient {
            identity: self.identity.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl PeerClient {
    pub fn new(identity: ClientIdentity) -> Self {
        PeerClient {
            identity: Arc::new(identity),
            inner: Arc::new(Mutex::new(Inner {
                rpc: None,
                token: None,
                known_peers: HashMap::new(),
                connected: false,
                heartbeat_cancel: None,
            })),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    pub async fn known_peers(&self) -> Vec<PeerSummary> {
        self.inner.lock().await.known_peers.values().cloned().collect()
    }

    /// Establishes the RPC channel, logs in with the configured identity,
    /// and starts the background heartbeat task.
    pub async fn connect_to_server(&self) -> Result<(), DirectoryError> {
        let endpoint = Channel::from_shared(self.identity.server_url.clone())
            .map_err(|err| DirectoryError::Internal(err.to_string()))?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|err| DirectoryError::Unavailable(err.to_string()))?;
        let mut rpc = PeerDirectoryClient::new(channel);

        let response = rpc
            .login(LoginRequest {
                username: self.identity.username.clone(),
                password: self.identity.password.clone(),
                peer_id: self.identity.peer_id.clone(),
                peer_url: self.identity.host.clone(),
                port: self.identity.port,
            })
            .await
            .map_err(from_status)?
            .into_inner();

        if !response.success {
            return Err(DirectoryError::Auth);
        }

        let known_peers: HashMap<String, PeerSummary> = response
            .connected_peers
            .into_iter()
            .map(summary_from_wire)
            .map(|p| (p.peer_id.clone(), p))
            .collect();

        {
            let mut inner = self.inner.lock().await;
            inner.rpc = Some(rpc);
            inner.token = Some(response.token);
            inner.known_peers = known_peers;
            inner.connected = true;
        }

        self.start_heartbeat_task().await;
        Ok(())
    }

    /// Probes the configured friend peers in order. This never substitutes
    /// for the directory; a success only means the friend answered.
    pub async fn connect_to_friend(&self) -> bool {
        for friend in [&self.identity.primary_friend, &self.identity.backup_friend] {
            if friend.is_empty() {
                continue;
            }
            let Ok(endpoint) = Channel::from_shared(friend.clone()) else {
                continue;
            };
            let connect = tokio::time::timeout(self.identity.connection_timeout, endpoint.connect()).await;
            let Ok(Ok(channel)) = connect else {
                log::warn!("friend peer unreachable: {friend}");
                continue;
            };
            let mut rpc = PeerDirectoryClient::new(channel);
            let probe = rpc.heartbeat(HeartbeatRequest {
                token: String::new(),
                peer_id: self.identity.peer_id.clone(),
                timestamp: netshare_common::time::now_unix(),
            });
            if let Ok(Ok(response)) = tokio::time::timeout(self.identity.connection_timeout, probe).await {
                if response.into_inner().success {
                    log::info!("friend peer reachable: {friend}");
                    return true;
                }
            }
        }
        false
    }

    async fn start_heartbeat_task(&self) {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let client = self.clone();
        let interval = self.identity.heartbeat_interval;

        self.inner.lock().await.heartbeat_cancel = Some(cancel_tx);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = client.heartbeat_once().await {
                            log::warn!("heartbeat failed, continuing: {err}");
                        }
                    }
                    _ = &mut cancel_rx => {
                        log::info!("heartbeat task cancelled");
                        break;
                    }
                }
            }
        });
    }

    pub async fn heartbeat_once(&self) -> Result<(i64, u32), DirectoryError> {
        let (mut rpc, token) = {
            let inner = self.inner.lock().await;
            let rpc = inner.rpc.clone().ok_or(DirectoryError::Unavailable("not connected".into()))?;
            let token = inner.token.clone().ok_or(DirectoryError::Unavailable("not connected".into()))?;
            (rpc, token)
        };
        let response = rpc
            .heartbeat(HeartbeatRequest {
                token,
                peer_id: self.identity.peer_id.clone(),
                timestamp: netshare_common::time::now_unix(),
            })
            .await
            .map_err(from_status)?
            .into_inner();
        Ok((response.server_timestamp, response.active_peers))
    }

    pub async fn index_files(&self, files: Vec<FileMetadata>) -> Result<u32, DirectoryError> {
        let (mut rpc, token) = self.require_session().await?;
        let response = rpc
            .index(IndexRequest {
                token,
                peer_id: self.identity.peer_id.clone(),
                files: files.into_iter().map(wire_metadata).collect(),
            })
            .await
            .map_err(from_status)?
            .into_inner();
        Ok(response.files_indexed)
    }

    pub async fn search_files(&self, name: &str, pattern: &str) -> Result<Vec<FileLocation>, DirectoryError> {
        let (mut rpc, token) = self.require_session().await?;
        let response = rpc
            .search(SearchRequest {
                token,
                peer_id: self.identity.peer_id.clone(),
                filename: name.to_string(),
                file_pattern: pattern.to_string(),
            })
            .await
            .map_err(from_status)?
            .into_inner();
        Ok(response.results.into_iter().filter_map(location_from_wire).collect())
    }

    pub async fn get_peer_info(&self) -> Result<Vec<PeerSummary>, DirectoryError> {
        let (mut rpc, token) = self.require_session().await?;
        let response = rpc
            .get_peer_info(PeerInfoRequest {
                token,
                peer_id: self.identity.peer_id.clone(),
            })
            .await
            .map_err(from_status)?
            .into_inner();

        let peers: Vec<PeerSummary> = response.peers.into_iter().map(summary_from_wire).collect();
        let mut inner = self.inner.lock().await;
        for peer in &peers {
            inner.known_peers.insert(peer.peer_id.clone(), peer.clone());
        }
        Ok(peers)
    }

    /// Streams `location.download_url` to `save_path` in fixed-size chunks.
    /// Any non-2xx status or a transfer that ends short is a failure.
    pub async fn download_file(&self, location: &FileLocation, save_path: &Path) -> Result<(), DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| DirectoryError::Internal(err.to_string()))?;

        let response = http
            .get(&location.download_url)
            .send()
            .await
            .map_err(|err| DirectoryError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "peer returned {} for {}",
                response.status(),
                location.download_url
            )));
        }

        let mut file = tokio::fs::File::create(save_path)
            .await
            .map_err(|err| DirectoryError::Internal(err.to_string()))?;
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();
        use tokio::io::AsyncWriteExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| DirectoryError::Unavailable(err.to_string()))?;
            received += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|err| DirectoryError::Internal(err.to_string()))?;
        }

        if received != location.file.size {
            return Err(DirectoryError::Unavailable(format!(
                "truncated transfer: expected {} bytes, received {received}",
                location.file.size
            )));
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        let (rpc, token, cancel) = {
            let mut inner = self.inner.lock().await;
            inner.connected = false;
            (inner.rpc.take(), inner.token.take(), inner.heartbeat_cancel.take())
        };
        if let Some(cancel) = cancel {
            let _ = cancel.send(());
        }
        if let (Some(mut rpc), Some(token)) = (rpc, token) {
            let _ = rpc
                .logout(LogoutRequest {
                    token,
                    peer_id: self.identity.peer_id.clone(),
                })
                .await;
        }
        self.inner.lock().await.known_peers.clear();
    }

    async fn require_session(&self) -> Result<(PeerDirectoryClient<Channel>, String), DirectoryError> {
        let inner = self.inner.lock().await;
        let rpc = inner
            .rpc
            .clone()
            .ok_or(DirectoryError::Unavailable("not connected to directory".into()))?;
        let token = inner
            .token
            .clone()
            .ok_or(DirectoryError::Unavailable("not connected to directory".into()))?;
        Ok((rpc, token))
    }
}
