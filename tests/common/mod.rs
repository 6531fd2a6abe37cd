#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use mailparse::{parse_mail, MailHeaderMap};

use mailmark::errors::{AppError, AppResult};
use mailmark::gmail::MailStore;
use mailmark::types::{ContentPart, Header, ItemPage, Label, MailboxItem, NewLabel};

struct StoredMessage {
    item: MailboxItem,
    labels: Vec<String>,
}

/// In-memory mailbox honouring `-label:NAME` queries and additive labelling.
#[derive(Default)]
pub struct FakeStore {
    messages: RefCell<Vec<StoredMessage>>,
    labels: RefCell<Vec<Label>>,
    pub sent: RefCell<Vec<String>>,
    pub created_labels: Cell<usize>,
    pub modify_calls: Cell<usize>,
    pub fail_send: Cell<bool>,
    pub fail_modify: Cell<bool>,
    pub reject_credentials: Cell<bool>,
    pub page_size: Option<usize>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn add_message(&self, item: MailboxItem) {
        self.messages.borrow_mut().push(StoredMessage {
            item,
            labels: vec!["INBOX".to_string()],
        });
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.labels.borrow_mut().push(Label {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn label_names_of(&self, message_id: &str) -> Vec<String> {
        let labels = self.labels.borrow();
        self.messages
            .borrow()
            .iter()
            .find(|m| m.item.id == message_id)
            .map(|m| {
                m.labels
                    .iter()
                    .map(|id| {
                        labels
                            .iter()
                            .find(|l| &l.id == id)
                            .map(|l| l.name.clone())
                            .unwrap_or_else(|| id.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn labels_named(&self, name: &str) -> usize {
        self.labels.borrow().iter().filter(|l| l.name == name).count()
    }

    fn excluded_label_id(&self, query: &str) -> Option<String> {
        let name = query.strip_prefix("-label:")?.trim_matches('"');
        self.labels
            .borrow()
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.id.clone())
    }
}

impl MailStore for FakeStore {
    async fn list_messages(
        &self,
        query: &str,
        label_ids: &[String],
        page_token: Option<&str>,
    ) -> AppResult<ItemPage> {
        let excluded = self.excluded_label_id(query);
        let ids: Vec<String> = self
            .messages
            .borrow()
            .iter()
            .filter(|m| label_ids.iter().all(|l| m.labels.contains(l)))
            .filter(|m| excluded.as_ref().map_or(true, |ex| !m.labels.contains(ex)))
            .map(|m| m.item.id.clone())
            .collect();

        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let Some(size) = self.page_size else {
            return Ok(ItemPage {
                ids,
                next_page_token: None,
            });
        };
        let end = (start + size).min(ids.len());
        Ok(ItemPage {
            ids: ids[start..end].to_vec(),
            next_page_token: (end < ids.len()).then(|| end.to_string()),
        })
    }

    async fn get_message(&self, id: &str) -> AppResult<MailboxItem> {
        if self.reject_credentials.get() {
            return Err(AppError::Auth("token revoked".into()));
        }
        self.messages
            .borrow()
            .iter()
            .find(|m| m.item.id == id)
            .map(|m| m.item.clone())
            .ok_or_else(|| AppError::Api {
                operation: "messages.get",
                status: 404,
                body: "Requested entity was not found.".into(),
            })
    }

    async fn send_raw(&self, raw: &str) -> AppResult<String> {
        if self.fail_send.get() {
            return Err(AppError::Network("connection reset".into()));
        }
        let mut sent = self.sent.borrow_mut();
        sent.push(raw.to_string());
        Ok(format!("sent-{}", sent.len()))
    }

    async fn list_labels(&self) -> AppResult<Vec<Label>> {
        Ok(self.labels.borrow().clone())
    }

    async fn create_label(&self, label: &NewLabel) -> AppResult<Label> {
        let mut labels = self.labels.borrow_mut();
        if labels.iter().any(|l| l.name == label.name) {
            return Err(AppError::Api {
                operation: "labels.create",
                status: 409,
                body: "Label name exists or conflicts".into(),
            });
        }
        let created = Label {
            id: format!("Label_{}", labels.len() + 1),
            name: label.name.clone(),
        };
        labels.push(created.clone());
        self.created_labels.set(self.created_labels.get() + 1);
        Ok(created)
    }

    async fn add_labels(&self, message_id: &str, label_ids: &[String]) -> AppResult<()> {
        self.modify_calls.set(self.modify_calls.get() + 1);
        if self.fail_modify.get() {
            return Err(AppError::Api {
                operation: "messages.modify",
                status: 500,
                body: "backend error".into(),
            });
        }
        let mut messages = self.messages.borrow_mut();
        let msg = messages
            .iter_mut()
            .find(|m| m.item.id == message_id)
            .ok_or_else(|| AppError::Unexpected("no such message".into()))?;
        for id in label_ids {
            if !msg.labels.contains(id) {
                msg.labels.push(id.clone());
            }
        }
        Ok(())
    }
}

pub fn item(id: &str, headers: &[(&str, &str)], filenames: &[&str]) -> MailboxItem {
    MailboxItem {
        id: id.to_string(),
        headers: headers.iter().map(|(n, v)| Header::new(*n, *v)).collect(),
        parts: filenames
            .iter()
            .map(|f| ContentPart::attachment(*f))
            .collect(),
    }
}

/// Recipient, subject and body of a sent raw payload.
pub struct SentReply {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn decode_sent(raw: &str) -> SentReply {
    let bytes = URL_SAFE.decode(raw).expect("url-safe base64");
    let parsed = parse_mail(&bytes).expect("parse sent message");
    SentReply {
        to: parsed.headers.get_first_value("To").unwrap_or_default(),
        subject: parsed.headers.get_first_value("Subject").unwrap_or_default(),
        body: parsed.get_body().expect("body").trim_end().to_string(),
    }
}
