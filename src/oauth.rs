//! Session provider: OAuth2 installed-app credentials backed by a client-secret
//! file and a persisted authorized-user token file.
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub const GMAIL_SCOPE: &str = "https://mail.google.com/";
pub const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Authorized-user token, laid out like the `token.json` written by Google's
/// client libraries so existing files keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

impl StoredToken {
    /// Unknown expiry counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(exp) => now >= exp - Duration::seconds(EXPIRY_MARGIN_SECS),
            None => true,
        }
    }

    pub fn covers(&self, scopes: &[String]) -> bool {
        self.scopes.is_empty() || scopes.iter().all(|s| self.scopes.contains(s))
    }

    pub fn is_valid_for(&self, scopes: &[String], now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && !self.is_expired_at(now) && self.covers(scopes)
    }
}

/// Load, refresh, and persist contract for the token backing a session.
#[allow(async_fn_in_trait)]
pub trait CredentialProvider {
    fn scopes(&self) -> &[String];
    async fn load(&self) -> AppResult<Option<StoredToken>>;
    /// `Ok(None)` means the grant was rejected and consent must be repeated.
    async fn refresh(&self, token: &StoredToken) -> AppResult<Option<StoredToken>>;
    async fn authorize(&self) -> AppResult<StoredToken>;
    async fn persist(&self, token: &StoredToken) -> AppResult<()>;
}

/// Returns a usable access token, refreshing or re-running consent as needed.
/// Any new token is persisted before it is handed out.
pub async fn obtain_access_token<P: CredentialProvider>(provider: &P) -> AppResult<String> {
    let existing = provider.load().await?;
    let now = Utc::now();

    if let Some(token) = &existing {
        if token.is_valid_for(provider.scopes(), now) {
            debug!("Stored access token still valid");
            return Ok(token.token.clone());
        }
    }

    let refreshed = match &existing {
        Some(token) if token.refresh_token.is_some() && token.covers(provider.scopes()) => {
            provider.refresh(token).await?
        }
        _ => None,
    };

    let token = match refreshed {
        Some(token) => {
            info!("Access token refreshed");
            token
        }
        None => {
            if existing.is_some() {
                warn!("Stored token unusable; re-authenticating");
            }
            provider.authorize().await?
        }
    };

    provider.persist(&token).await?;
    Ok(token.token)
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    AUTH_URL.to_string()
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Auth(format!("reading client secrets {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(raw)
            .map_err(|e| AppError::Auth(format!("parse client secrets: {e}")))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| AppError::Auth("client secrets missing `installed` section".into()))
    }
}

/// File-backed provider: client secrets at one path, token at another.
#[derive(Debug, Clone)]
pub struct InstalledAppProvider {
    secrets_path: PathBuf,
    token_path: PathBuf,
    scopes: Vec<String>,
}

impl InstalledAppProvider {
    pub fn new(
        secrets_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
        scopes: &[&str],
    ) -> Self {
        Self {
            secrets_path: secrets_path.into(),
            token_path: token_path.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }
}

impl CredentialProvider for InstalledAppProvider {
    fn scopes(&self) -> &[String] {
        &self.scopes
    }

    async fn load(&self) -> AppResult<Option<StoredToken>> {
        read_token_file(&self.token_path)
    }

    async fn refresh(&self, token: &StoredToken) -> AppResult<Option<StoredToken>> {
        let Some(refresh) = token.refresh_token.clone() else {
            return Ok(None);
        };
        let secrets = ClientSecrets {
            client_id: token.client_id.clone(),
            client_secret: token.client_secret.clone(),
            auth_uri: AUTH_URL.to_string(),
            token_uri: token.token_uri.clone(),
        };
        let client = build_client(&secrets, None)?;
        let res = client
            .exchange_refresh_token(&RefreshToken::new(refresh.clone()))
            .request_async(async_http_client)
            .await;
        match res {
            Ok(token_res) => Ok(Some(stored_from_response(
                &token_res,
                &secrets,
                &self.scopes,
                Some(refresh),
            ))),
            Err(err) => {
                warn!("Refresh token invalid or expired: {err}");
                Ok(None)
            }
        }
    }

    async fn authorize(&self) -> AppResult<StoredToken> {
        let secrets = ClientSecrets::from_file(&self.secrets_path)?;
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| AppError::Auth(format!("failed to bind loopback port: {e}")))?;
        let local_port = listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(|e| AppError::Auth(format!("failed to read local addr: {e}")))?;

        let redirect = format!("http://127.0.0.1:{local_port}/");
        let client = build_client(&secrets, Some(&redirect))?;
        let (auth_url, verifier, csrf) = build_auth_url(&client, &self.scopes);
        info!(redirect = %redirect, "Opening browser for Google OAuth consent");
        open_in_browser(&auth_url);

        let code = listen_for_code(listener).await?;
        if code.state != *csrf.secret() {
            return Err(AppError::Auth("OAuth state mismatch".into()));
        }

        let token_res = client
            .exchange_code(AuthorizationCode::new(code.code))
            .set_pkce_verifier(verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| AppError::Auth(format!("token exchange failed: {e}")))?;

        Ok(stored_from_response(&token_res, &secrets, &self.scopes, None))
    }

    async fn persist(&self, token: &StoredToken) -> AppResult<()> {
        write_token_file(&self.token_path, token)
    }
}

pub fn read_token_file(path: &Path) -> AppResult<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Auth(format!("reading token file {}: {e}", path.display())))?;
    match serde_json::from_str(&raw) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            warn!(path = %path.display(), "Ignoring unreadable token file: {e}");
            Ok(None)
        }
    }
}

pub fn write_token_file(path: &Path, token: &StoredToken) -> AppResult<()> {
    let serialized =
        serde_json::to_string(token).map_err(|e| AppError::Unexpected(format!("{e}")))?;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| AppError::Auth(format!("opening token file {}: {e}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
    }

    file.write_all(serialized.as_bytes())
        .map_err(|e| AppError::Auth(format!("writing token file: {e}")))?;
    file.sync_all()
        .map_err(|e| AppError::Auth(format!("syncing token file: {e}")))?;
    debug!(path = %path.display(), "Token file written");
    Ok(())
}

fn stored_from_response(
    res: &BasicTokenResponse,
    secrets: &ClientSecrets,
    scopes: &[String],
    previous_refresh: Option<String>,
) -> StoredToken {
    StoredToken {
        token: res.access_token().secret().to_string(),
        refresh_token: res
            .refresh_token()
            .map(|r| r.secret().to_string())
            .or(previous_refresh),
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: scopes.to_vec(),
        expiry: res
            .expires_in()
            .map(|d| Utc::now() + Duration::from_std(d).unwrap_or_else(|_| Duration::seconds(0))),
    }
}

fn build_client(secrets: &ClientSecrets, redirect: Option<&str>) -> AppResult<BasicClient> {
    let auth_url = AuthUrl::new(secrets.auth_uri.clone())
        .map_err(|e| AppError::Config(format!("invalid auth uri: {e}")))?;
    let token_url = TokenUrl::new(secrets.token_uri.clone())
        .map_err(|e| AppError::Config(format!("invalid token uri: {e}")))?;
    let mut client = BasicClient::new(
        ClientId::new(secrets.client_id.clone()),
        Some(ClientSecret::new(secrets.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(oauth2::AuthType::RequestBody);

    if let Some(redirect) = redirect {
        client = client.set_redirect_uri(
            RedirectUrl::new(redirect.to_string())
                .map_err(|e| AppError::Config(format!("invalid redirect uri {redirect}: {e}")))?,
        );
    }
    Ok(client)
}

fn build_auth_url(client: &BasicClient, scopes: &[String]) -> (String, PkceCodeVerifier, CsrfToken) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let mut req = client
        .authorize_url(CsrfToken::new_random)
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge);
    for scope in scopes {
        req = req.add_scope(Scope::new(scope.clone()));
    }
    let (url, csrf) = req.url();
    (url.to_string(), verifier, csrf)
}

struct CodeResponse {
    code: String,
    state: String,
}

async fn listen_for_code(listener: TcpListener) -> AppResult<CodeResponse> {
    let (mut stream, _) = listener
        .accept()
        .await
        .map_err(|e| AppError::Auth(format!("redirect accept failed: {e}")))?;

    let mut buf = [0u8; 4096];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| AppError::Auth(format!("reading auth callback failed: {e}")))?;
    let req = String::from_utf8_lossy(&buf[..n]);
    let parsed = parse_callback(&req)?;

    let response =
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nAuth complete. You can close this tab.";
    let _ = stream.write_all(response.as_bytes()).await;
    Ok(parsed)
}

fn parse_callback(request: &str) -> AppResult<CodeResponse> {
    let first_line = request.lines().next().unwrap_or("");
    let path = first_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AppError::Auth("invalid HTTP request".into()))?;
    let parsed = url::Url::parse(&format!("http://localhost{path}"))
        .map_err(|e| AppError::Auth(format!("failed to parse callback url: {e}")))?;

    if let Some((_, err)) = parsed.query_pairs().find(|(k, _)| k == "error") {
        return Err(AppError::Auth(format!("consent denied: {err}")));
    }
    let code = parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .ok_or_else(|| AppError::Auth("callback missing code parameter".into()))?;
    let state = parsed
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .unwrap_or_default();
    Ok(CodeResponse { code, state })
}

fn open_in_browser(url: &str) {
    let attempt = if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(url).status()
    } else if cfg!(target_os = "windows") {
        std::process::Command::new("rundll32.exe")
            .args(["url.dll,FileProtocolHandler", url])
            .status()
    } else {
        std::process::Command::new("xdg-open").arg(url).status()
    };
    if let Err(e) = attempt {
        warn!("Could not auto-open browser: {e}. Open this URL manually:\n{url}");
    } else {
        println!("If your browser did not open, navigate to:\n{url}");
    }
}
