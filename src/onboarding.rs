use crate::config::Settings;
use crate::gmail::GmailClient;
use crate::oauth::{obtain_access_token, InstalledAppProvider, GMAIL_SCOPE};
use anyhow::Result;
use tracing::info;

pub fn gmail_provider(settings: &Settings) -> InstalledAppProvider {
    InstalledAppProvider::new(
        &settings.credentials_path,
        &settings.token_path,
        &[GMAIL_SCOPE],
    )
}

/// Authenticated Gmail session built from the configured credential files.
pub async fn open_session(settings: &Settings) -> Result<GmailClient> {
    let provider = gmail_provider(settings);
    let token = obtain_access_token(&provider).await?;
    info!(token_path = %provider.token_path().display(), "Gmail service authenticated");
    Ok(GmailClient::new(token, &settings.api_base))
}

/// Run the consent flow if needed and return the account address.
pub async fn authorize_account(settings: &Settings) -> Result<String> {
    let session = open_session(settings).await?;
    let email = session.profile_email().await?;
    info!(account = %email, "Account authorized");
    Ok(email)
}
