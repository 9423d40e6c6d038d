use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Client-credentials material handed out by a token manager.
/// Immutable once loaded.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub resource: String,
}

impl Credentials {
    pub fn from_env_values() -> Self {
        let client_id =
            std::env::var("ECOTWIN_CLIENT_ID").expect("ECOTWIN_CLIENT_ID must be set");
        let client_secret =
            std::env::var("ECOTWIN_CLIENT_SECRET").expect("ECOTWIN_CLIENT_SECRET must be set");
        let resource = std::env::var("ECOTWIN_RESOURCE").expect("ECOTWIN_RESOURCE must be set");

        Credentials {
            client_id,
            client_secret,
            resource,
        }
    }
}

/// An access token together with the epoch second after which it is stale.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub access_token: String,
    pub expires_at: i64,
}

impl TokenRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().timestamp()
    }
}

/// Collaborator owning credential storage and the token cache. How the
/// backing store is secured is the implementation's concern, not ours.
#[cfg_attr(test, automock)]
pub trait TokenManager {
    fn get_credentials(&self) -> Result<Credentials, anyhow::Error>;
    fn get_token(&self) -> Option<TokenRecord>;
    fn store_token(&self, token: TokenRecord);
}

/// Keeps credentials and the cached token in process memory. Fine for
/// one-shot jobs; anything long-lived should persist tokens elsewhere.
pub struct MemoryTokenManager {
    credentials: Credentials,
    token: Mutex<Option<TokenRecord>>,
}

impl MemoryTokenManager {
    pub fn new(credentials: Credentials) -> Self {
        MemoryTokenManager {
            credentials,
            token: Mutex::new(None),
        }
    }
}

impl TokenManager for MemoryTokenManager {
    fn get_credentials(&self) -> Result<Credentials, anyhow::Error> {
        Ok(self.credentials.clone())
    }

    fn get_token(&self) -> Option<TokenRecord> {
        self.token.lock().unwrap().clone()
    }

    fn store_token(&self, token: TokenRecord) {
        *self.token.lock().unwrap() = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            resource: "https://energyoptimizer.azure-api.net".to_string(),
        }
    }

    #[test]
    fn fresh_record_is_not_expired() {
        let record = TokenRecord {
            access_token: "tok".to_string(),
            expires_at: Utc::now().timestamp() + 3600,
        };
        assert!(!record.is_expired());
    }

    #[test]
    fn past_record_is_expired() {
        let record = TokenRecord {
            access_token: "tok".to_string(),
            expires_at: Utc::now().timestamp() - 1,
        };
        assert!(record.is_expired());
    }

    #[test]
    fn memory_manager_round_trips_tokens() {
        let manager = MemoryTokenManager::new(credentials());
        assert_eq!(manager.get_token(), None);

        let record = TokenRecord {
            access_token: "tok".to_string(),
            expires_at: 42,
        };
        manager.store_token(record.clone());
        assert_eq!(manager.get_token(), Some(record));
        assert_eq!(manager.get_credentials().unwrap(), credentials());
    }
}
