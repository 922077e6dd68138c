use netshare_common::token::generate_token;
use tokio::sync::Mutex;

struct Session {
    token: String,
}

/// Holds the peer operator's configured credentials and at most one active
/// session. All mutation is serialized through the inner mutex, matching the
/// single-writer discipline the peer server otherwise relies on.
pub struct AuthManager {
    peer_id: String,
    username: String,
    password: String,
    session: Mutex<Option<Session>>,
}

impl AuthManager {
    pub fn new(peer_id: String, username: String, password: String) -> Self {
        AuthManager {
            peer_id,
            username,
            password,
            session: Mutex::new(None),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Mints a new token when `peer_id`/`username`/`password` all match the
    /// configured identity. A new login invalidates whatever session was
    /// active before it.
    pub async fn authenticate(&self, peer_id: &str, username: &str, password: &str) -> Option<String> {
        if peer_id != self.peer_id || username != self.username || password != self.password {
            return None;
        }
        let token = generate_token();
        let mut session = self.session.lock().await;
        *session = Some(Session { token: token.clone() });
        Some(token)
    }

    pub async fn verify(&self, token: &str) -> bool {
        let session = self.session.lock().await;
        session.as_ref().map(|s| s.token == token).unwrap_or(false)
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub async fn logout(&self) {
        let mut session = self.session.lock().await;
        *session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wrong_credentials_are_rejected() {
        let auth = AuthManager::new("peer-a".into(), "alice".into(), "secret".into());
        assert!(auth.authenticate("peer-a", "alice", "wrong").await.is_none());
        assert!(!auth.is_logged_in().await);
    }

    #[tokio::test]
    async fn new_login_invalidates_previous_token() {
        let auth = AuthManager::new("peer-a".into(), "alice".into(), "secret".into());
        let first = auth.authenticate("peer-a", "alice", "secret").await.unwrap();
        let second = auth.authenticate("peer-a", "alice", "secret").await.unwrap();
        assert_ne!(first, second);
        assert!(!auth.verify(&first).await);
        assert!(auth.verify(&second).await);
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let auth = AuthManager::new("peer-a".into(), "alice".into(), "secret".into());
        let token = auth.authenticate("peer-a", "alice", "secret").await.unwrap();
        auth.logout().await;
        assert!(!auth.verify(&token).await);
        assert!(!auth.is_logged_in().await);
    }
}
