use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentPart {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

impl ContentPart {
    pub fn attachment(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            mime_type: None,
        }
    }

    pub fn has_filename(&self) -> bool {
        self.filename.as_deref().is_some_and(|f| !f.is_empty())
    }
}

/// A message as fetched from the store in full format.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailboxItem {
    pub id: String,
    pub headers: Vec<Header>,
    pub parts: Vec<ContentPart>,
}

impl MailboxItem {
    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn return_path(&self) -> &str {
        self.header("Return-Path").unwrap_or_default()
    }

    pub fn to_address(&self) -> &str {
        self.header("To").unwrap_or_default()
    }

    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    pub fn has_attachment(&self) -> bool {
        self.parts.iter().any(ContentPart::has_filename)
    }

    /// Named parts as `file (mime/type)`, comma separated, for traces.
    pub fn attachment_summary(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.has_filename())
            .map(|p| {
                let name = p.filename.as_deref().unwrap_or_default();
                match p.mime_type.as_deref() {
                    Some(mime) if !mime.is_empty() => format!("{name} ({mime})"),
                    _ => name.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelListVisibility {
    #[serde(rename = "labelShow")]
    Show,
    #[serde(rename = "labelShowIfUnread")]
    ShowIfUnread,
    #[serde(rename = "labelHide")]
    Hide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageListVisibility {
    Show,
    Hide,
}

/// Label creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabel {
    pub name: String,
    pub label_list_visibility: LabelListVisibility,
    pub message_list_visibility: MessageListVisibility,
}

impl NewLabel {
    /// Visible both in the label list and on messages.
    pub fn visible(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label_list_visibility: LabelListVisibility::Show,
            message_list_visibility: MessageListVisibility::Show,
        }
    }
}

/// One page of message ids returned by a list query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemPage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}
