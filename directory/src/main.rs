mod registry;
mod rpc;
mod sweep;

use std::time::Duration;

use netshare_common::config::DirectoryConfig;
use netshare_proto::peer_directory_server::PeerDirectoryServer;
use registry::PeerRegistry;
use rpc::DirectoryService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "directory.toml".to_string());
    let config = DirectoryConfig::load(std::path::Path::new(&config_path)).unwrap_or_else(|err| {
        log::warn!("could not load config from {config_path}: {err}; using defaults");
        DirectoryConfig::default()
    });

    let addr = format!("{}:{}", config.server.host, config.server.grpc_port).parse()?;

    let registry = PeerRegistry::new(
        config.security.max_login_attempts,
        config.database.peer_timeout as i64,
    );

    let sweep_handle = sweep::spawn(
        registry.clone(),
        Duration::from_secs(config.database.cleanup_interval),
    );

    log::info!("directory listening on {addr}");

    let service = DirectoryService::new(registry);

    let result = tonic::transport::Server::builder()
        .add_service(PeerDirectoryServer::new(service))
        .serve(addr)
        .await;

    sweep_handle.stop();
    result?;
    Ok(())
}
