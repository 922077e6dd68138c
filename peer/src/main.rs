mod auth;
mod client;
mod files;
mod handlers;

use std::time::Duration;

use actix_web::{web, App, HttpServer};
use auth::AuthManager;
use client::{ClientIdentity, PeerClient};
use files::FileManager;
use netshare_common::config::PeerConfig;

pub struct AppState {
    pub auth: AuthManager,
    pub files: FileManager,
    pub client: PeerClient,
    pub max_file_size: u64,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "peer.toml".to_string());
    let config = PeerConfig::load(std::path::Path::new(&config_path)).unwrap_or_else(|err| {
        log::warn!("could not load config from {config_path}: {err}; using defaults");
        PeerConfig::default()
    });

    let identity = ClientIdentity {
        peer_id: config.peer.peer_id.clone(),
        username: config.peer.username.clone(),
        password: config.peer.password.clone(),
        host: config.network.host.clone(),
        port: config.network.rest_port as u32,
        server_url: config.network.server_url.clone(),
        primary_friend: config.peers.primary_friend.clone(),
        backup_friend: config.peers.backup_friend.clone(),
        connection_timeout: Duration::from_secs(config.peers.connection_timeout),
        heartbeat_interval: Duration::from_secs(config.peers.heartbeat_interval),
    };

    let state = web::Data::new(AppState {
        auth: AuthManager::new(config.peer.peer_id.clone(), config.peer.username.clone(), config.peer.password.clone()),
        files: FileManager::new(config.files.shared_directory.clone()),
        client: PeerClient::new(identity),
        max_file_size: config.files.max_file_size,
    });

    let bind_addr = (config.network.host.clone(), config.network.rest_port);
    log::info!("peer server listening on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(handlers::health)
            .service(handlers::login)
            .service(handlers::create_file)
            .service(handlers::search)
            .service(handlers::download)
            .service(handlers::logout)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
