use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use rand::Rng;

use crate::api::{CredentialProvider, SessionAuth};
use crate::storage::Store;

const ACTOR_TOKEN_KEY: &str = "actor_token";
const SESSION_USERNAME_KEY: &str = "session_username";
const SESSION_TOKEN_KEY: &str = "session_token";

pub struct Manager {
    store: Arc<Store>,
    actor_token: String,
    session: RwLock<Option<SessionAuth>>,
}

impl Manager {
    // Loads the persisted identity, minting the anonymous actor token on
    // first run so it stays stable across restarts.
    pub fn load(store: Arc<Store>) -> Result<Self> {
        let actor_token = match store
            .get_identity(ACTOR_TOKEN_KEY)
            .context("session: load actor token")?
        {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                let token = generate_actor_token();
                store
                    .set_identity(ACTOR_TOKEN_KEY, &token)
                    .context("session: persist actor token")?;
                token
            }
        };

        let session = match (
            store.get_identity(SESSION_USERNAME_KEY)?,
            store.get_identity(SESSION_TOKEN_KEY)?,
        ) {
            (Some(username), Some(token)) if !username.is_empty() && !token.is_empty() => {
                Some(SessionAuth { username, token })
            }
            _ => None,
        };

        Ok(Self {
            store,
            actor_token,
            session: RwLock::new(session),
        })
    }

    pub fn login(&self, username: &str, token: &str) -> Result<()> {
        let username = username.trim();
        let token = token.trim();
        if username.is_empty() {
            bail!("session: username required");
        }
        if token.is_empty() {
            bail!("session: token required");
        }
        self.store.set_identity(SESSION_USERNAME_KEY, username)?;
        self.store.set_identity(SESSION_TOKEN_KEY, token)?;
        *self.session.write() = Some(SessionAuth {
            username: username.to_owned(),
            token: token.to_owned(),
        });
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.store.clear_identity(SESSION_USERNAME_KEY)?;
        self.store.clear_identity(SESSION_TOKEN_KEY)?;
        *self.session.write() = None;
        Ok(())
    }

    pub fn current(&self) -> Option<SessionAuth> {
        self.session.read().clone()
    }

    pub fn username(&self) -> Option<String> {
        self.session.read().as_ref().map(|auth| auth.username.clone())
    }
}

impl CredentialProvider for Manager {
    // Votes are attributed to the login when present, otherwise to the
    // stable anonymous token.
    fn actor_id(&self) -> String {
        self.username().unwrap_or_else(|| self.actor_token.clone())
    }

    fn session(&self) -> Option<SessionAuth> {
        self.current()
    }
}

fn generate_actor_token() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("user_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Options;
    use tempfile::tempdir;

    fn open_store(path: &std::path::Path) -> Arc<Store> {
        Arc::new(
            Store::open(Options {
                path: Some(path.to_path_buf()),
            })
            .unwrap(),
        )
    }

    #[test]
    fn actor_token_is_minted_once_and_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        let first = Manager::load(open_store(&path)).unwrap();
        let token = first.actor_id();
        assert!(token.starts_with("user_"));
        assert_eq!(token.len(), "user_".len() + 9);
        drop(first);

        let second = Manager::load(open_store(&path)).unwrap();
        assert_eq!(second.actor_id(), token);
    }

    #[test]
    fn login_switches_the_actor_and_logout_restores_it() {
        let dir = tempdir().unwrap();
        let manager = Manager::load(open_store(&dir.path().join("state.db"))).unwrap();
        let anonymous = manager.actor_id();

        manager.login("ada", "secret-token").unwrap();
        assert_eq!(manager.actor_id(), "ada");
        assert_eq!(
            manager.session().map(|auth| auth.token),
            Some("secret-token".to_owned())
        );

        manager.logout().unwrap();
        assert!(manager.session().is_none());
        assert_eq!(manager.actor_id(), anonymous);
    }

    #[test]
    fn session_persists_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");

        let manager = Manager::load(open_store(&path)).unwrap();
        manager.login("ada", "secret-token").unwrap();
        drop(manager);

        let reloaded = Manager::load(open_store(&path)).unwrap();
        assert_eq!(reloaded.username().as_deref(), Some("ada"));
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let dir = tempdir().unwrap();
        let manager = Manager::load(open_store(&dir.path().join("state.db"))).unwrap();
        assert!(manager.login("", "token").is_err());
        assert!(manager.login("ada", "  ").is_err());
        assert!(manager.session().is_none());
    }
}
