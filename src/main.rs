use anyhow::Result;
use clap::Parser;
use mailmark::app;
use mailmark::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();
    mailmark::init_tracing();

    let cli = Cli::parse();
    app::run(cli).await
}
