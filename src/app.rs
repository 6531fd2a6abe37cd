use crate::cli::Cli;
use crate::config::Settings;
use crate::onboarding;
use crate::reply::ReplyTemplate;
use crate::workflow::{Workflow, WorkflowOptions};
use anyhow::{bail, Context, Result};
use tracing::{info, warn};

pub async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if cli.all_pages {
        settings.follow_pages = true;
    }
    if cli.safe_mode {
        settings.safe_mode = true;
    }

    if cli.authorize {
        let email = onboarding::authorize_account(&settings).await?;
        println!("Authorized {email}");
        return Ok(());
    }

    let session = onboarding::open_session(&settings)
        .await
        .context("authenticating Gmail session")?;

    if settings.safe_mode {
        info!("Safe mode enabled; no replies or labels will be written");
    }

    let mut workflow = Workflow::new(
        &session,
        WorkflowOptions::from_settings(&settings),
        ReplyTemplate::from_settings(&settings),
    );
    let report = workflow.run().await?;

    if !report.is_clean() {
        for (id, err) in &report.failed {
            warn!(message_id = %id, error = %err, "Email left unprocessed");
        }
        bail!("{} email(s) failed processing", report.failed.len());
    }
    Ok(())
}
