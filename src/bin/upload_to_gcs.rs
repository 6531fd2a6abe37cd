use anyhow::{Context, Result};
use clap::Parser;
use mailmark::cli::UploadCli;
use mailmark::config::Settings;
use mailmark::oauth::{obtain_access_token, InstalledAppProvider, STORAGE_SCOPE};
use mailmark::storage::ObjectUploader;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    mailmark::init_tracing();

    let cli = UploadCli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let upload = &settings.upload;
    let bucket = cli.bucket.unwrap_or_else(|| upload.bucket.clone());
    let local_path = cli.file.unwrap_or_else(|| upload.local_path.clone());
    let destination = cli.destination.unwrap_or_else(|| upload.destination.clone());

    let provider = InstalledAppProvider::new(
        &settings.credentials_path,
        &upload.token_path,
        &[STORAGE_SCOPE],
    );
    let token = obtain_access_token(&provider)
        .await
        .context("authenticating storage client")?;

    let uri = ObjectUploader::new(token, &upload.api_base)
        .upload(&bucket, &local_path, &destination)
        .await?;
    println!("File {} uploaded to {uri}", local_path.display());
    Ok(())
}
