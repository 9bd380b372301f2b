use super::{AuthorizationFlow, Credential};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, StandardRevocableToken,
    TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use tiny_http::{Response, Server};
use tracing::{debug, instrument};
use url::Url;
use yup_oauth2::ApplicationSecret;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Browser consent over a loopback redirect, plus refresh-token exchange.
pub struct OAuthFlow {
    client: ConfiguredClient,
    http_client: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(secret: &ApplicationSecret) -> Result<Self> {
        let auth_url = AuthUrl::new(secret.auth_uri.clone())
            .map_err(|e| AppError::Auth(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(secret.token_uri.clone())
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(secret.client_id.clone()))
            .set_client_secret(ClientSecret::new(secret.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url);

        // Following redirects on the token endpoint would expose the code to third parties
        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
        })
    }

    fn credential_from(
        token_result: BasicTokenResponse,
        fallback_refresh_token: Option<&str>,
    ) -> Credential {
        let refresh_token = token_result
            .refresh_token()
            .map(|token| token.secret().clone())
            .or_else(|| fallback_refresh_token.map(str::to_string));

        let expires_in = token_result
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        Credential {
            access_token: token_result.access_token().secret().clone(),
            refresh_token,
            expires_at: chrono::Utc::now().timestamp() + expires_in,
        }
    }
}

#[async_trait]
impl AuthorizationFlow for OAuthFlow {
    #[instrument(name = "Authorizing with Google", skip_all)]
    async fn authorize(&self) -> Result<Credential> {
        // Port 0 lets the OS pick a free port for the loopback redirect
        let server = Server::http("127.0.0.1:0")
            .map_err(|e| AppError::Auth(format!("Failed to start callback listener: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| AppError::Auth("Callback listener has no IP address".to_string()))?;

        let redirect_url = RedirectUrl::new(format!("http://127.0.0.1:{}/", port))
            .map_err(|e| AppError::Auth(format!("Invalid redirect URL: {}", e)))?;
        let client = self.client.clone().set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(SHEETS_SCOPE.to_string()))
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        // stdout is reserved for command output and the protocol stream
        eprintln!("Open this URL in your browser:\n{}", auth_url);
        eprintln!();
        eprintln!("Waiting for authorization...");

        let (code, state) = tokio::task::spawn_blocking(move || receive_callback(&server))
            .await
            .map_err(|e| AppError::Auth(format!("Callback listener failed: {}", e)))??;

        if state != *csrf_token.secret() {
            return Err(AppError::Auth("CSRF token mismatch".to_string()));
        }

        let token_result = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to exchange code: {:?}", e)))?;

        if token_result.refresh_token().is_none() {
            debug!("Authorization returned no refresh token");
        }

        Ok(Self::credential_from(token_result, None))
    }

    #[instrument(name = "Refreshing Google token", skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {:?}", e)))?;

        Ok(Self::credential_from(token_result, Some(refresh_token)))
    }
}

/// Block until the browser redirect arrives. Returns `(code, state)`.
fn receive_callback(server: &Server) -> Result<(String, String)> {
    loop {
        let request = server
            .recv()
            .map_err(|e| AppError::Auth(format!("Failed to receive request: {}", e)))?;

        let url = Url::parse(&format!("http://127.0.0.1{}", request.url()))
            .map_err(|e| AppError::Auth(format!("Failed to parse callback URL: {}", e)))?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            respond(request, "Authorization was declined. You can close this window.")?;
            return Err(AppError::Auth(format!("Authorization declined: {}", error)));
        }

        // Browsers also request things like /favicon.ico
        let Some(code) = param("code") else {
            if let Err(e) = request.respond(Response::empty(404)) {
                debug!("Failed to answer stray request: {}", e);
            }
            continue;
        };

        let state = param("state")
            .ok_or_else(|| AppError::Auth("No state in callback".to_string()))?;

        respond(request, "Authentication successful! You can close this window.")?;
        return Ok((code, state));
    }
}

fn respond(request: tiny_http::Request, body: &str) -> Result<()> {
    request
        .respond(Response::from_string(body))
        .map_err(|e| AppError::Auth(format!("Failed to send response: {}", e)))
}
