use netshare_common::model::{FileLocation, FileMetadata, PeerSummary};
use netshare_common::DirectoryError;
use netshare_proto::peer_directory_server::PeerDirectory;
use netshare_proto::{
    HeartbeatRequest, HeartbeatResponse, IndexRequest, IndexResponse, LoginRequest, LoginResponse,
    LogoutRequest, LogoutResponse, PeerInfoRequest, PeerInfoResponse, SearchRequest,
    SearchResponse,
};
use tonic::{Request, Response, Status};

use crate::registry::PeerRegistry;

pub struct DirectoryService {
    registry: PeerRegistry,
}

impl DirectoryService {
    pub fn new(registry: PeerRegistry) -> Self {
        DirectoryService { registry }
    }
}

/// Translates the shared error kinds to RPC status codes. Runs exactly once,
/// at this boundary; handlers below never construct a `Status` directly.
fn to_status(err: DirectoryError) -> Status {
    match err {
        DirectoryError::Auth => Status::unauthenticated(err.to_string()),
        DirectoryError::Conflict(_) => Status::invalid_argument(err.to_string()),
        DirectoryError::RateLimited => Status::resource_exhausted(err.to_string()),
        DirectoryError::BadRequest(_) => Status::invalid_argument(err.to_string()),
        DirectoryError::NotFound(_) => Status::not_found(err.to_string()),
        DirectoryError::Unavailable(_) => Status::unavailable(err.to_string()),
        DirectoryError::Internal(_) => Status::internal(err.to_string()),
    }
}

fn metadata_to_wire(f: FileMetadata) -> netshare_proto::FileMetadata {
    netshare_proto::FileMetadata {
        filename: f.filename,
        file_path: f.relative_path,
        file_size: f.size,
        file_hash: f.content_hash,
        last_modified: f.last_modified,
        mime_type: f.mime_type,
        tags: f.tags,
    }
}

fn metadata_from_wire(f: netshare_proto::FileMetadata) -> FileMetadata {
    FileMetadata {
        filename: f.filename,
        relative_path: f.file_path,
        size: f.file_size,
        content_hash: f.file_hash,
        last_modified: f.last_modified,
        mime_type: f.mime_type,
        tags: f.tags,
    }
}

fn summary_to_wire(p: PeerSummary) -> netshare_proto::PeerInfo {
    netshare_proto::PeerInfo {
        peer_id: p.peer_id,
        username: p.username,
        url: p.host,
        port: p.port,
        is_online: p.is_online,
        last_seen: p.last_seen,
        file_count: p.file_count,
    }
}

fn location_to_wire(loc: FileLocation) -> netshare_proto::FileLocation {
    netshare_proto::FileLocation {
        file_info: Some(metadata_to_wire(loc.file)),
        peer_info: Some(summary_to_wire(loc.peer)),
        download_url: loc.download_url,
        is_available: loc.is_available,
    }
}

#[tonic::async_trait]
impl PeerDirectory for DirectoryService {
    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        log::info!("login request from {} ({})", req.username, req.peer_id);

        match self
            .registry
            .login(&req.username, &req.password, &req.peer_id, &req.peer_url, req.port)
            .await
        {
            Ok((token, connected_peers)) => Ok(Response::new(LoginResponse {
                success: true,
                token,
                message: "login successful".to_string(),
                connected_peers: connected_peers.into_iter().map(summary_to_wire).collect(),
            })),
            Err(err) => Err(to_status(err)),
        }
    }

    async fn logout(&self, request: Request<LogoutRequest>) -> Result<Response<LogoutResponse>, Status> {
        let req = request.into_inner();
        match self.registry.logout(&req.token).await {
            Ok(()) => Ok(Response::new(LogoutResponse {
                success: true,
                message: "logout successful".to_string(),
            })),
            Err(err) => Err(to_status(err)),
        }
    }

    async fn index(&self, request: Request<IndexRequest>) -> Result<Response<IndexResponse>, Status> {
        let req = request.into_inner();
        let files: Vec<FileMetadata> = req.files.into_iter().map(metadata_from_wire).collect();

        match self.registry.index(&req.token, files).await {
            Ok(count) => Ok(Response::new(IndexResponse {
                success: true,
                message: "files indexed".to_string(),
                files_indexed: count,
            })),
            Err(err) => Err(to_status(err)),
        }
    }

    async fn search(&self, request: Request<SearchRequest>) -> Result<Response<SearchResponse>, Status> {
        let req = request.into_inner();
        match self.registry.search(&req.token, &req.filename, &req.file_pattern).await {
            Ok(results) => {
                let message = format!("found {} results", results.len());
                Ok(Response::new(SearchResponse {
                    success: true,
                    message,
                    results: results.into_iter().map(location_to_wire).collect(),
                }))
            }
            Err(err) => Err(to_status(err)),
        }
    }

    async fn get_peer_info(
        &self,
        request: Request<PeerInfoRequest>,
    ) -> Result<Response<PeerInfoResponse>, Status> {
        let req = request.into_inner();
        match self.registry.get_peer_info(&req.token).await {
            Ok(peers) => Ok(Response::new(PeerInfoResponse {
                success: true,
                peers: peers.into_iter().map(summary_to_wire).collect(),
            })),
            Err(err) => Err(to_status(err)),
        }
    }

    async fn heartbeat(
        &self,
        request: Request<HeartbeatRequest>,
    ) -> Result<Response<HeartbeatResponse>, Status> {
        let req = request.into_inner();
        match self.registry.heartbeat(&req.token).await {
            Ok((server_timestamp, active_peers)) => Ok(Response::new(HeartbeatResponse {
                success: true,
                server_timestamp,
                active_peers,
            })),
            Err(err) => Err(to_status(err)),
        }
    }
}
