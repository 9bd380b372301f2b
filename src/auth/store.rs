use super::Credential;
use crate::error::{AppError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use yup_oauth2::ApplicationSecret;

const CREDENTIALS_FILE: &str = "credentials.json";
const TOKEN_FILE: &str = "token.json";
const TOKEN_TEMP_FILE: &str = "token.json.tmp";

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

/// Owner-only directory holding the client secret and the token cache.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// Read the OAuth client identifier and secret.
    pub fn load_client_secret(&self) -> Result<ApplicationSecret> {
        let path = self.credentials_path();

        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::CredentialsMissing(path));
            }
            Err(e) => return Err(e.into()),
        };

        yup_oauth2::parse_application_secret(contents).map_err(|e| AppError::CredentialsCorrupt {
            path,
            reason: e.to_string(),
        })
    }

    /// Read the cached token. `None` until the first successful authorization.
    pub fn load(&self) -> Result<Option<Credential>> {
        let path = self.token_path();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?path, "No cached token");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let credential = serde_json::from_str(&contents).map_err(|e| {
            AppError::CredentialsCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Some(credential))
    }

    /// Persist the token cache, replacing any previous one atomically.
    #[instrument(name = "Saving token cache", skip_all)]
    pub fn save(&self, credential: &Credential) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::set_permissions(&self.dir, fs::Permissions::from_mode(DIR_MODE))?;

        let contents = serde_json::to_string_pretty(credential)?;

        let temp_path = self.dir.join(TOKEN_TEMP_FILE);
        // Created owner-only so the secret is never readable by others, even briefly
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(FILE_MODE)
            .open(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        // mode() only applies on creation; a leftover temp file keeps its old bits
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(FILE_MODE))?;

        fs::rename(&temp_path, self.token_path())?;
        debug!(path = ?self.token_path(), "Token cache written");

        Ok(())
    }

    /// Delete the cached token. The client secret is left in place.
    #[instrument(name = "Clearing cached token", skip_all)]
    pub fn clear(&self) -> Result<()> {
        let path = self.token_path();

        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = ?path, "Cleared cached token");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cached token to clear");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_helpers::fresh_credential;
    use crate::error::FailureKind;

    const CLIENT_SECRET_JSON: &str = r#"{
        "installed": {
            "client_id": "1234.apps.googleusercontent.com",
            "project_id": "sheet-cli-test",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_secret": "shh",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_load_without_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested"));
        let credential = fresh_credential("abc");

        store.save(&credential).unwrap();

        assert_eq!(store.load().unwrap(), Some(credential));
        assert!(!store.dir().join(TOKEN_TEMP_FILE).exists());
    }

    #[test]
    fn test_save_applies_owner_only_modes() {
        let dir = tempfile::tempdir().unwrap();
        let cred_dir = dir.path().join("creds");
        fs::create_dir_all(&cred_dir).unwrap();
        fs::set_permissions(&cred_dir, fs::Permissions::from_mode(0o755)).unwrap();
        let store = CredentialStore::new(&cred_dir);

        store.save(&fresh_credential("first")).unwrap();
        assert_eq!(mode_of(&cred_dir), 0o700);
        assert_eq!(mode_of(&store.token_path()), 0o600);

        // Loosened by someone else; the next save tightens both again
        fs::set_permissions(&cred_dir, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&store.token_path(), fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&fresh_credential("second")).unwrap();
        assert_eq!(mode_of(&cred_dir), 0o700);
        assert_eq!(mode_of(&store.token_path()), 0o600);
        assert_eq!(store.load().unwrap().unwrap().access_token, "second");
    }

    #[test]
    fn test_corrupt_cache_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.token_path(), "{not json").unwrap();

        let err = store.load().unwrap_err();

        assert!(matches!(err, AppError::CredentialsCorrupt { .. }), "got {:?}", err);
        assert_eq!(err.kind(), FailureKind::Authentication);
    }

    #[test]
    fn test_missing_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        let err = store.load_client_secret().unwrap_err();

        let AppError::CredentialsMissing(path) = err else {
            panic!("unexpected error {:?}", err);
        };
        assert_eq!(path, dir.path().join("credentials.json"));
    }

    #[test]
    fn test_client_secret_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.credentials_path(), CLIENT_SECRET_JSON).unwrap();

        let secret = store.load_client_secret().unwrap();

        assert_eq!(secret.client_id, "1234.apps.googleusercontent.com");
        assert_eq!(secret.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_unparsable_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.credentials_path(), r#"{"web": 1}"#).unwrap();

        let err = store.load_client_secret().unwrap_err();

        assert!(matches!(err, AppError::CredentialsCorrupt { .. }), "got {:?}", err);
    }

    #[test]
    fn test_clear_removes_only_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        fs::write(store.credentials_path(), CLIENT_SECRET_JSON).unwrap();
        store.save(&fresh_credential("abc")).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        assert_eq!(store.load().unwrap(), None);
        assert!(store.credentials_path().exists());
    }
}
