use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use netshare_common::DirectoryError;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|s| s.to_string())
}

async fn require_auth(state: &AppState, req: &HttpRequest) -> Result<(), HttpResponse> {
    let Some(token) = bearer_token(req) else {
        return Err(HttpResponse::Unauthorized().json(json!({"error": "authorization token required"})));
    };
    if !state.auth.verify(&token).await {
        return Err(HttpResponse::Unauthorized().json(json!({"error": "invalid or expired token"})));
    }
    Ok(())
}

fn error_response(err: DirectoryError) -> HttpResponse {
    match err {
        DirectoryError::Auth => HttpResponse::Unauthorized().json(json!({"error": err.to_string()})),
        DirectoryError::Conflict(_) => HttpResponse::Conflict().json(json!({"error": err.to_string()})),
        DirectoryError::RateLimited => {
            HttpResponse::TooManyRequests().json(json!({"error": err.to_string()}))
        }
        DirectoryError::BadRequest(_) => HttpResponse::BadRequest().json(json!({"error": err.to_string()})),
        DirectoryError::NotFound(_) => HttpResponse::NotFound().json(json!({"error": err.to_string()})),
        DirectoryError::Unavailable(_) => {
            HttpResponse::ServiceUnavailable().json(json!({"error": err.to_string()}))
        }
        DirectoryError::Internal(_) => HttpResponse::InternalServerError().json(json!({"error": err.to_string()})),
    }
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "peer_id": state.auth.peer_id(),
        "username": state.auth.username(),
        "files_available": state.files.len().await,
        "logged_in": state.auth.is_logged_in().await,
        "shared_directory": state.files.shared_root().display().to_string(),
        "timestamp": Utc::now().timestamp(),
    }))
}

#[derive(Deserialize)]
pub struct LoginBody {
    peer_id: String,
    username: String,
    password: String,
}

#[post("/login")]
pub async fn login(state: web::Data<AppState>, body: web::Json<LoginBody>) -> HttpResponse {
    let Some(token) = state.auth.authenticate(&body.peer_id, &body.username, &body.password).await else {
        return HttpResponse::Unauthorized().json(json!({"error": "invalid credentials"}));
    };

    let files = state.files.scan().await;

    let mut index_message = "";
    if !state.client.is_connected().await {
        match state.client.connect_to_server().await {
            Ok(()) => {
                if !files.is_empty() {
                    if let Err(err) = state.client.index_files(files.clone()).await {
                        log::warn!("login: could not publish catalog: {err}");
                        index_message = " (catalog publish failed)";
                    }
                }
            }
            Err(err) => {
                log::warn!("login: could not reach directory: {err}");
                index_message = " (no connection to directory)";
            }
        }
    }

    HttpResponse::Ok().json(json!({
        "token": token,
        "peer_info": {
            "peer_id": state.auth.peer_id(),
            "username": state.auth.username(),
            "files_available": files.len(),
        },
        "message": format!("login successful{index_message}"),
    }))
}

#[post("/create")]
pub async fn create_file(
    state: web::Data<AppState>,
    req: HttpRequest,
    mut payload: Multipart,
) -> HttpResponse {
    if let Err(resp) = require_auth(&state, &req).await {
        return resp;
    }

    let mut filename = None;
    let mut bytes = Vec::new();

    while let Ok(Some(mut field)) = payload.try_next().await {
        let content_disposition = field.content_disposition().cloned();
        let name = content_disposition.as_ref().and_then(|cd| cd.get_filename()).map(String::from);
        if name.is_none() {
            continue;
        }
        filename = name;

        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(data) => {
                    if bytes.len() as u64 + data.len() as u64 > state.max_file_size {
                        return HttpResponse::PayloadTooLarge()
                            .json(json!({"error": format!("file exceeds max_file_size of {} bytes", state.max_file_size)}));
                    }
                    bytes.extend_from_slice(&data);
                }
                Err(err) => {
                    return HttpResponse::BadRequest().json(json!({"error": err.to_string()}));
                }
            }
        }
    }

    let Some(filename) = filename.map(|f| sanitize_filename::sanitize(&f)) else {
        return HttpResponse::BadRequest().json(json!({"error": "no file field in upload"}));
    };

    if bytes.is_empty() {
        return HttpResponse::BadRequest().json(json!({"error": "uploaded file is empty"}));
    }

    if let Err(err) = state.files.write_upload(&filename, &bytes).await {
        return error_response(err);
    }

    let files = state.files.scan().await;

    if state.client.is_connected().await {
        if let Err(err) = state.client.index_files(files.clone()).await {
            log::warn!("create: could not republish catalog: {err}");
        }
    }

    HttpResponse::Ok().json(json!({
        "filename": filename,
        "size": bytes.len(),
        "total_files": files.len(),
    }))
}

#[derive(Deserialize)]
pub struct SearchBody {
    query: String,
    #[serde(default)]
    pattern: String,
}

#[post("/search")]
pub async fn search(state: web::Data<AppState>, req: HttpRequest, body: web::Json<SearchBody>) -> HttpResponse {
    if let Err(resp) = require_auth(&state, &req).await {
        return resp;
    }
    if !state.client.is_connected().await {
        return HttpResponse::ServiceUnavailable()
            .json(json!({"error": "not connected to the directory"}));
    }

    match state.client.search_files(&body.query, &body.pattern).await {
        Ok(results) => {
            let results: Vec<_> = results
                .into_iter()
                .map(|mut result| {
                    result.download_url = format!(
                        "http://{}:{}/download/{}",
                        result.peer.peer_id, result.peer.port, result.file.filename
                    );
                    result
                })
                .collect();
            HttpResponse::Ok().json(json!({
                "query": body.query,
                "results_count": results.len(),
                "results": results,
            }))
        }
        Err(err) => error_response(err),
    }
}

#[get("/download/{filename}")]
pub async fn download(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    if let Err(resp) = require_auth(&state, &req).await {
        return resp;
    }
    let filename = path.into_inner();

    let resolved = match state.files.resolve(&filename) {
        Ok(p) => p,
        Err(err) => return error_response(err),
    };

    let bytes = match tokio::fs::read(&resolved).await {
        Ok(b) => b,
        Err(_) => {
            return HttpResponse::NotFound().json(json!({"error": format!("file not found: {filename}")}))
        }
    };

    let mime = netshare_common::mime::guess_mime(&resolved);

    HttpResponse::Ok()
        .content_type(mime)
        .insert_header(("Content-Disposition", format!("attachment; filename={filename}")))
        .insert_header(("X-Peer-ID", state.auth.peer_id().to_string()))
        .insert_header(("X-Peer-Username", state.auth.username().to_string()))
        .insert_header(("X-File-Size", bytes.len().to_string()))
        .body(bytes)
}

#[post("/logout")]
pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(resp) = require_auth(&state, &req).await {
        return resp;
    }
    state.client.disconnect().await;
    state.auth.logout().await;
    HttpResponse::Ok().json(json!({"message": "logout successful"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientIdentity;
    use actix_web::{test, App};
    use std::time::Duration;

    fn test_state(shared_root: &std::path::Path) -> web::Data<AppState> {
        let identity = ClientIdentity {
            peer_id: "peer-a".to_string(),
            username: "alice".to_string(),
            password: "secret".to_string(),
            host: "127.0.0.1".to_string(),
            port: 9001,
            server_url: "http://127.0.0.1:1".to_string(),
            primary_friend: String::new(),
            backup_friend: String::new(),
            connection_timeout: Duration::from_millis(50),
            heartbeat_interval: Duration::from_secs(30),
        };
        web::Data::new(AppState {
            auth: crate::auth::AuthManager::new("peer-a".to_string(), "alice".to_string(), "secret".to_string()),
            files: crate::files::FileManager::new(shared_root),
            client: crate::client::PeerClient::new(identity),
            max_file_size: 1024,
        })
    }

    #[actix_web::test]
    async fn health_reports_peer_identity_without_auth() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = test::init_service(App::new().app_data(state.clone()).service(health)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["peer_id"], "peer-a");
        assert_eq!(body["logged_in"], false);
    }

    #[actix_web::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = test::init_service(App::new().app_data(state.clone()).service(login)).await;

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(&json!({"peer_id": "peer-a", "username": "alice", "password": "wrong"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn download_without_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"hi").await.unwrap();
        let state = test_state(dir.path());
        let app = test::init_service(App::new().app_data(state.clone()).service(download)).await;

        let req = test::TestRequest::get().uri("/download/a.txt").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn download_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let token = state.auth.authenticate("peer-a", "alice", "secret").await.unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).service(download)).await;

        let req = test::TestRequest::get()
            .uri("/download/..%2Fsecret.txt")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
