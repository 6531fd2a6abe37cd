use std::cell::{Cell, RefCell};

use chrono::{Duration, Utc};
use mailmark::errors::{AppError, AppResult};
use mailmark::oauth::{
    obtain_access_token, read_token_file, write_token_file, ClientSecrets, CredentialProvider,
    StoredToken, GMAIL_SCOPE,
};

fn token(access: &str, expires_in_secs: i64, refresh: Option<&str>) -> StoredToken {
    StoredToken {
        token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scopes: vec![GMAIL_SCOPE.to_string()],
        expiry: Some(Utc::now() + Duration::seconds(expires_in_secs)),
    }
}

struct ScriptedProvider {
    scopes: Vec<String>,
    stored: Option<StoredToken>,
    refresh_result: Option<StoredToken>,
    consent_fails: bool,
    refreshes: Cell<usize>,
    consents: Cell<usize>,
    persisted: RefCell<Vec<StoredToken>>,
}

impl ScriptedProvider {
    fn new(stored: Option<StoredToken>) -> Self {
        Self {
            scopes: vec![GMAIL_SCOPE.to_string()],
            stored,
            refresh_result: None,
            consent_fails: false,
            refreshes: Cell::new(0),
            consents: Cell::new(0),
            persisted: RefCell::new(Vec::new()),
        }
    }
}

impl CredentialProvider for ScriptedProvider {
    fn scopes(&self) -> &[String] {
        &self.scopes
    }

    async fn load(&self) -> AppResult<Option<StoredToken>> {
        Ok(self.stored.clone())
    }

    async fn refresh(&self, _token: &StoredToken) -> AppResult<Option<StoredToken>> {
        self.refreshes.set(self.refreshes.get() + 1);
        Ok(self.refresh_result.clone())
    }

    async fn authorize(&self) -> AppResult<StoredToken> {
        self.consents.set(self.consents.get() + 1);
        if self.consent_fails {
            return Err(AppError::Auth("consent denied: access_denied".into()));
        }
        Ok(token("from-consent", 3600, Some("new-refresh")))
    }

    async fn persist(&self, token: &StoredToken) -> AppResult<()> {
        self.persisted.borrow_mut().push(token.clone());
        Ok(())
    }
}

#[tokio::test]
async fn valid_stored_token_is_used_as_is() {
    let provider = ScriptedProvider::new(Some(token("still-good", 3600, Some("r"))));

    let access = obtain_access_token(&provider).await.unwrap();

    assert_eq!(access, "still-good");
    assert_eq!(provider.refreshes.get(), 0);
    assert!(provider.persisted.borrow().is_empty());
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let mut provider = ScriptedProvider::new(Some(token("stale", -10, Some("r"))));
    provider.refresh_result = Some(token("fresh", 3600, Some("r")));

    let access = obtain_access_token(&provider).await.unwrap();

    assert_eq!(access, "fresh");
    assert_eq!(provider.consents.get(), 0);
    assert_eq!(provider.persisted.borrow()[0].token, "fresh");
}

#[tokio::test]
async fn rejected_refresh_falls_back_to_consent() {
    let provider = ScriptedProvider::new(Some(token("stale", -10, Some("revoked"))));

    let access = obtain_access_token(&provider).await.unwrap();

    assert_eq!(access, "from-consent");
    assert_eq!(provider.refreshes.get(), 1);
    assert_eq!(provider.consents.get(), 1);
}

#[tokio::test]
async fn missing_token_runs_consent() {
    let provider = ScriptedProvider::new(None);

    obtain_access_token(&provider).await.unwrap();

    assert_eq!(provider.refreshes.get(), 0);
    assert_eq!(provider.persisted.borrow().len(), 1);
}

#[tokio::test]
async fn token_for_other_scopes_requires_consent() {
    let mut stored = token("storage-only", 3600, Some("r"));
    stored.scopes = vec!["https://www.googleapis.com/auth/devstorage.read_write".into()];
    let provider = ScriptedProvider::new(Some(stored));

    let access = obtain_access_token(&provider).await.unwrap();

    assert_eq!(access, "from-consent");
    assert_eq!(provider.refreshes.get(), 0);
}

#[tokio::test]
async fn consent_failure_is_an_auth_error() {
    let mut provider = ScriptedProvider::new(None);
    provider.consent_fails = true;

    let err = obtain_access_token(&provider).await.unwrap_err();

    assert!(err.is_auth());
    assert!(provider.persisted.borrow().is_empty());
}

#[test]
fn token_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    let original = token("abc", 3600, Some("refresh"));

    write_token_file(&path, &original).unwrap();
    let loaded = read_token_file(&path).unwrap().unwrap();

    assert_eq!(loaded.token, original.token);
    assert_eq!(loaded.refresh_token, original.refresh_token);
    assert_eq!(loaded.scopes, original.scopes);
}

#[test]
fn reads_token_written_by_google_client_libraries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(
        &path,
        r#"{"token": "ya29.a0", "refresh_token": "1//0g", "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "123.apps.googleusercontent.com", "client_secret": "GOCSPX",
            "scopes": ["https://mail.google.com/"], "universe_domain": "googleapis.com",
            "account": "", "expiry": "2024-05-01T12:34:56.789012Z"}"#,
    )
    .unwrap();

    let loaded = read_token_file(&path).unwrap().unwrap();

    assert_eq!(loaded.token, "ya29.a0");
    assert!(loaded.is_expired_at(Utc::now()));
    assert!(loaded.covers(&[GMAIL_SCOPE.to_string()]));
}

#[test]
fn missing_token_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_token_file(&dir.path().join("absent.json")).unwrap().is_none());
}

#[test]
fn client_secrets_accept_installed_layout() {
    let secrets = ClientSecrets::from_json(
        r#"{"installed": {"client_id": "123.apps.googleusercontent.com", "project_id": "p",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_secret": "GOCSPX", "redirect_uris": ["http://localhost"]}}"#,
    )
    .unwrap();

    assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
    assert_eq!(secrets.token_uri, "https://oauth2.googleapis.com/token");
}

#[test]
fn client_secrets_without_section_fail_as_auth() {
    let err = ClientSecrets::from_json(r#"{"other": {}}"#).unwrap_err();
    assert!(err.is_auth());
}
