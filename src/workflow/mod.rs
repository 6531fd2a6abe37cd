//! One processing pass: list unprocessed inbox items, reply to eligible ones,
//! and mark replied items with the processed label.
use crate::config::Settings;
use crate::errors::AppResult;
use crate::gmail::MailStore;
use crate::reply::ReplyTemplate;
use crate::types::{NewLabel, ReplyDraft};
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    pub label_name: String,
    pub inbox_label: String,
    pub query: String,
    pub recipient_prefix: String,
    pub follow_pages: bool,
    pub safe_mode: bool,
}

impl WorkflowOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            label_name: settings.label_name.clone(),
            inbox_label: settings.inbox_label.clone(),
            query: settings.unprocessed_query(),
            recipient_prefix: settings.recipient_prefix.clone(),
            follow_pages: settings.follow_pages,
            safe_mode: settings.safe_mode,
        }
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Recipient did not match; the item stays unprocessed.
    Skipped,
    Replied { sent_id: String },
    /// Safe mode: the reply that would have been sent.
    Dry(ReplyDraft),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub listed: usize,
    pub skipped: usize,
    pub replied: usize,
    pub dry: usize,
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Case-sensitive prefix match on the original recipient.
pub fn is_eligible(to_address: &str, prefix: &str) -> bool {
    to_address.starts_with(prefix)
}

pub struct Workflow<'s, S: MailStore> {
    store: &'s S,
    options: WorkflowOptions,
    template: ReplyTemplate,
    marker_id: Option<String>,
}

impl<'s, S: MailStore> Workflow<'s, S> {
    pub fn new(store: &'s S, options: WorkflowOptions, template: ReplyTemplate) -> Self {
        Self {
            store,
            options,
            template,
            marker_id: None,
        }
    }

    /// Processes every listed item in order. Listing failures and credential
    /// failures end the pass; any other item failure is recorded and the pass
    /// moves on to the next item.
    pub async fn run(&mut self) -> AppResult<RunReport> {
        let started = Instant::now();
        let ids = self.list_unprocessed().await?;
        let mut report = RunReport {
            listed: ids.len(),
            ..RunReport::default()
        };

        for id in &ids {
            match self.process_item(id).await {
                Ok(ItemOutcome::Skipped) => report.skipped += 1,
                Ok(ItemOutcome::Replied { .. }) => report.replied += 1,
                Ok(ItemOutcome::Dry(_)) => report.dry += 1,
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    warn!(message_id = %id, error = %e, "Processing email failed");
                    report.failed.push((id.clone(), e.to_string()));
                }
            }
        }

        info!(
            listed = report.listed,
            replied = report.replied,
            skipped = report.skipped,
            dry = report.dry,
            failed = report.failed.len(),
            elapsed_ms = ?started.elapsed().as_millis(),
            "Processing complete"
        );
        Ok(report)
    }

    pub async fn list_unprocessed(&self) -> AppResult<Vec<String>> {
        let labels = [self.options.inbox_label.clone()];
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .store
                .list_messages(&self.options.query, &labels, page_token.as_deref())
                .await?;
            ids.extend(page.ids);

            match page.next_page_token {
                Some(next) if self.options.follow_pages => page_token = Some(next),
                Some(_) => {
                    debug!("More results available; only the first page is processed");
                    break;
                }
                None => break,
            }
        }

        info!(count = ids.len(), "Found unprocessed emails");
        Ok(ids)
    }

    pub async fn process_item(&mut self, id: &str) -> AppResult<ItemOutcome> {
        debug!(message_id = %id, "Processing email");
        let item = self.store.get_message(id).await?;

        let return_path = item.return_path();
        let to_address = item.to_address();
        debug!(message_id = %id, return_path = %return_path, to = %to_address, "Envelope headers");

        if !is_eligible(to_address, &self.options.recipient_prefix) {
            debug!(
                message_id = %id,
                prefix = %self.options.recipient_prefix,
                "Recipient does not match prefix, skipping"
            );
            return Ok(ItemOutcome::Skipped);
        }

        debug!(
            message_id = %id,
            has_attachment = item.has_attachment(),
            attachments = %item.attachment_summary(),
            "Email eligible for reply"
        );
        let draft = self.template.draft_for(&item);

        if self.options.safe_mode {
            info!(
                message_id = %id,
                to = %draft.to,
                subject = %draft.subject,
                "Safe mode: not sending reply or applying label"
            );
            return Ok(ItemOutcome::Dry(draft));
        }

        let sent_id = self.send_reply(&draft).await?;

        if let Err(e) = self.mark_processed(id).await {
            error!(
                message_id = %id,
                sent_id = %sent_id,
                error = %e,
                "Reply sent but email not marked; it will be answered again next pass"
            );
            return Err(e);
        }

        Ok(ItemOutcome::Replied { sent_id })
    }

    pub async fn send_reply(&self, draft: &ReplyDraft) -> AppResult<String> {
        debug!(to = %draft.to, subject = %draft.subject, body = %draft.body, "Sending reply");
        let sent_id = self.store.send_raw(&draft.to_raw()).await?;
        info!(to = %draft.to, sent_id = %sent_id, "Reply sent");
        Ok(sent_id)
    }

    /// Id of the processed label, creating it on first use.
    pub async fn ensure_marker(&mut self) -> AppResult<String> {
        if let Some(id) = &self.marker_id {
            return Ok(id.clone());
        }

        let existing = self
            .store
            .list_labels()
            .await?
            .into_iter()
            .find(|l| l.name == self.options.label_name);

        let id = match existing {
            Some(label) => label.id,
            None => {
                info!(label = %self.options.label_name, "Creating label");
                self.store
                    .create_label(&NewLabel::visible(self.options.label_name.clone()))
                    .await?
                    .id
            }
        };
        self.marker_id = Some(id.clone());
        Ok(id)
    }

    pub async fn mark_processed(&mut self, id: &str) -> AppResult<()> {
        let label_id = self.ensure_marker().await?;
        self.store.add_labels(id, &[label_id]).await?;
        info!(message_id = %id, "Marked email as processed");
        Ok(())
    }
}
