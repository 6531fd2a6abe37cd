use clap::Parser;
use std::path::PathBuf;

/// Replies to matching inbox mail and labels it as processed.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// TOML settings file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only run the OAuth flow and report the authenticated account.
    #[arg(long)]
    pub authorize: bool,

    /// Follow continuation tokens instead of stopping after the first page.
    #[arg(long)]
    pub all_pages: bool,

    /// Compose replies but send nothing and apply no labels.
    #[arg(long)]
    pub safe_mode: bool,
}

/// Uploads one local file to a Cloud Storage bucket.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct UploadCli {
    /// TOML settings file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Destination bucket.
    #[arg(long)]
    pub bucket: Option<String>,

    /// File to upload.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Object name inside the bucket.
    #[arg(long)]
    pub destination: Option<String>,
}
