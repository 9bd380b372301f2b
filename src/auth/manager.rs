use super::{AuthorizationFlow, Credential, CredentialStore};
use crate::error::{AppError, Result};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Expired,
    Refreshing,
    Failed,
}

/// Owns the active credential for the life of the process.
///
/// The credential slot is guarded by an async mutex that stays held across
/// refresh and interactive authorization. Callers arriving mid-refresh wait on
/// the lock and then see the refreshed token, so a burst of concurrent requests
/// costs one refresh (or one consent prompt) rather than one each.
pub struct CredentialManager<F> {
    store: CredentialStore,
    flow: F,
    current: Mutex<Option<Credential>>,
    phase: watch::Sender<AuthPhase>,
}

impl<F: AuthorizationFlow> CredentialManager<F> {
    pub fn new(store: CredentialStore, flow: F) -> Self {
        Self {
            store,
            flow,
            current: Mutex::new(None),
            phase: watch::Sender::new(AuthPhase::Unauthenticated),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn phase(&self) -> AuthPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: AuthPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(from = ?previous, to = ?phase, "Credential phase changed");
        }
    }

    /// Return a usable access token, refreshing or authorizing as needed.
    #[instrument(name = "Getting access token", skip_all)]
    pub async fn get_active_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if current.is_none() {
            *current = self.store.load()?;
        }

        let refresh_token = match current.as_ref() {
            Some(credential) if !credential.is_expired() => {
                self.set_phase(AuthPhase::Authenticated);
                return Ok(credential.access_token.clone());
            }
            Some(credential) => {
                self.set_phase(AuthPhase::Expired);
                credential.refresh_token.clone()
            }
            None => None,
        };

        if let Some(refresh_token) = refresh_token {
            self.set_phase(AuthPhase::Refreshing);
            match self.flow.refresh(&refresh_token).await {
                Ok(mut refreshed) => {
                    if refreshed.refresh_token.is_none() {
                        refreshed.refresh_token = Some(refresh_token);
                    }
                    self.store.save(&refreshed)?;
                    debug!("Token refresh successful");
                    return Ok(self.install(&mut current, refreshed));
                }
                Err(e) => {
                    warn!("Token refresh failed ({}), re-authorizing", e);
                }
            }
        }

        *current = None;
        self.set_phase(AuthPhase::Unauthenticated);
        self.authorize(&mut current).await
    }

    async fn authorize(&self, current: &mut MutexGuard<'_, Option<Credential>>) -> Result<String> {
        self.set_phase(AuthPhase::Authenticating);

        let credential = match self.flow.authorize().await {
            Ok(credential) => credential,
            Err(e) => {
                self.set_phase(AuthPhase::Failed);
                return Err(match e {
                    AppError::Auth(_) => e,
                    other => AppError::Auth(other.to_string()),
                });
            }
        };

        if let Err(e) = self.store.save(&credential) {
            self.set_phase(AuthPhase::Failed);
            return Err(e);
        }

        info!("Authorization complete");
        Ok(self.install(current, credential))
    }

    fn install(
        &self,
        current: &mut MutexGuard<'_, Option<Credential>>,
        credential: Credential,
    ) -> String {
        let token = credential.access_token.clone();
        **current = Some(credential);
        self.set_phase(AuthPhase::Authenticated);
        token
    }

    /// Forget the active credential and delete the token cache.
    pub async fn reset(&self) -> Result<()> {
        let mut current = self.current.lock().await;
        self.store.clear()?;
        *current = None;
        self.set_phase(AuthPhase::Unauthenticated);
        Ok(())
    }
}
