//! Gmail REST v1 mail store.
use crate::errors::{AppError, AppResult};
use crate::types::{ContentPart, Header, ItemPage, Label, MailboxItem, NewLabel};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The remote operations the workflow relies on. Query filtering and additive
/// label modification happen store-side.
#[allow(async_fn_in_trait)]
pub trait MailStore {
    async fn list_messages(
        &self,
        query: &str,
        label_ids: &[String],
        page_token: Option<&str>,
    ) -> AppResult<ItemPage>;
    async fn get_message(&self, id: &str) -> AppResult<MailboxItem>;
    /// `raw` is the base64url RFC 822 payload. Returns the sent message id.
    async fn send_raw(&self, raw: &str) -> AppResult<String>;
    async fn list_labels(&self) -> AppResult<Vec<Label>>;
    async fn create_label(&self, label: &NewLabel) -> AppResult<Label>;
    async fn add_labels(&self, message_id: &str, label_ids: &[String]) -> AppResult<()>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LabelsResponse {
    #[serde(default)]
    labels: Vec<LabelResponse>,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    email_address: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    add_label_ids: &'a [String],
}

impl From<MessageResponse> for MailboxItem {
    fn from(raw: MessageResponse) -> Self {
        let payload = raw.payload.unwrap_or_default();
        MailboxItem {
            id: raw.id,
            headers: payload.headers,
            parts: payload
                .parts
                .into_iter()
                .map(|p| ContentPart {
                    filename: p.filename,
                    mime_type: p.mime_type,
                })
                .collect(),
        }
    }
}

impl From<ListMessagesResponse> for ItemPage {
    fn from(raw: ListMessagesResponse) -> Self {
        ItemPage {
            ids: raw.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: raw.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Authenticated session against one Gmail account.
#[derive(Clone)]
pub struct GmailClient {
    http: Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>, base_url: &str) -> Self {
        Self {
            http: Client::new(),
            access_token: access_token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Address of the authenticated account.
    pub async fn profile_email(&self) -> AppResult<String> {
        let url = format!("{}/profile", self.base_url);
        let profile: Profile = self.call("getProfile", self.http.get(&url)).await?;
        Ok(profile.email_address)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        req: RequestBuilder,
    ) -> AppResult<T> {
        let res = self.execute(operation, req).await?;
        res.json()
            .await
            .map_err(|e| AppError::Unexpected(format!("decoding {operation} response: {e}")))
    }

    async fn execute(&self, operation: &'static str, req: RequestBuilder) -> AppResult<Response> {
        let res = req
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("{operation} request failed: {e}")))?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::Auth(format!("{operation} rejected credentials: {body}")));
        }
        Err(AppError::Api {
            operation,
            status: status.as_u16(),
            body,
        })
    }
}

fn validate_id(id: &str) -> AppResult<()> {
    if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(AppError::Unexpected(format!("invalid message ID: {id:?}")));
    }
    Ok(())
}

impl MailStore for GmailClient {
    async fn list_messages(
        &self,
        query: &str,
        label_ids: &[String],
        page_token: Option<&str>,
    ) -> AppResult<ItemPage> {
        let url = format!("{}/messages", self.base_url);
        let mut params: Vec<(&str, &str)> = vec![("q", query)];
        params.extend(label_ids.iter().map(|l| ("labelIds", l.as_str())));
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let raw: ListMessagesResponse = self
            .call("messages.list", self.http.get(&url).query(&params))
            .await?;
        Ok(raw.into())
    }

    async fn get_message(&self, id: &str) -> AppResult<MailboxItem> {
        validate_id(id)?;
        let url = format!("{}/messages/{}", self.base_url, id);
        let raw: MessageResponse = self
            .call(
                "messages.get",
                self.http.get(&url).query(&[("format", "full")]),
            )
            .await?;
        Ok(raw.into())
    }

    async fn send_raw(&self, raw: &str) -> AppResult<String> {
        let url = format!("{}/messages/send", self.base_url);
        let res: SendResponse = self
            .call(
                "messages.send",
                self.http.post(&url).json(&SendRequest { raw }),
            )
            .await?;
        debug!(sent_id = %res.id, "Gmail accepted message");
        Ok(res.id)
    }

    async fn list_labels(&self) -> AppResult<Vec<Label>> {
        let url = format!("{}/labels", self.base_url);
        let raw: LabelsResponse = self.call("labels.list", self.http.get(&url)).await?;
        Ok(raw
            .labels
            .into_iter()
            .map(|l| Label {
                id: l.id,
                name: l.name,
            })
            .collect())
    }

    async fn create_label(&self, label: &NewLabel) -> AppResult<Label> {
        let url = format!("{}/labels", self.base_url);
        let raw: LabelResponse = self
            .call("labels.create", self.http.post(&url).json(label))
            .await?;
        Ok(Label {
            id: raw.id,
            name: raw.name,
        })
    }

    async fn add_labels(&self, message_id: &str, label_ids: &[String]) -> AppResult<()> {
        validate_id(message_id)?;
        let url = format!("{}/messages/{}/modify", self.base_url, message_id);
        self.execute(
            "messages.modify",
            self.http.post(&url).json(&ModifyRequest {
                add_label_ids: label_ids,
            }),
        )
        .await?;
        Ok(())
    }
}
