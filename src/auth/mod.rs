mod flow;
mod manager;
mod store;

pub use flow::OAuthFlow;
pub use manager::{AuthPhase, CredentialManager};
pub use store::CredentialStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Seconds before real expiry at which a token is treated as expired
const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry time as seconds since Unix epoch
    pub expires_at: i64,
}

impl Credential {
    /// Check if the access token is expired or about to expire (within 5 minutes)
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at < (now + EXPIRY_MARGIN_SECS)
    }
}

/// Source of new credentials: interactive consent and silent refresh.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self) -> Result<Credential>;

    async fn refresh(&self, refresh_token: &str) -> Result<Credential>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_margin() {
        let now = chrono::Utc::now().timestamp();
        let soon = Credential {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: now + 120,
        };
        let later = Credential {
            expires_at: now + 900,
            ..soon.clone()
        };

        assert!(soon.is_expired());
        assert!(!later.is_expired());
    }

    #[test]
    fn test_missing_refresh_token_deserializes() {
        let credential: Credential =
            serde_json::from_str(r#"{"access_token":"abc","expires_at":1700000000}"#).unwrap();

        assert_eq!(credential.refresh_token, None);
        assert_eq!(credential.expires_at, 1_700_000_000);
    }
}
