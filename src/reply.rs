//! Reply composition and the raw RFC 822 encoding Gmail's send call expects.
use crate::config::Settings;
use crate::types::{MailboxItem, ReplyDraft};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

const SUBJECT_PREFIX: &str = "Re: ";
const BODY_LINE_LIMIT: usize = 76;
const HEADER_LINE_LIMIT: usize = 78;
const HEADER_LINE_HARD_LIMIT: usize = 998;
// 39 bytes give a 64-char encoded-word, so "Subject: " plus one word stays
// under the 76-char line cap for encoded-words.
const ENCODED_WORD_BYTES: usize = 39;

/// Fixed reply wording: a greeting followed by one of two outcome lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTemplate {
    pub greeting: String,
    pub attachment_text: String,
    pub no_attachment_text: String,
}

impl ReplyTemplate {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            greeting: settings.greeting.clone(),
            attachment_text: settings.attachment_text.clone(),
            no_attachment_text: settings.no_attachment_text.clone(),
        }
    }

    pub fn body(&self, has_attachment: bool) -> String {
        let tail = if has_attachment {
            &self.attachment_text
        } else {
            &self.no_attachment_text
        };
        format!("{}{}", self.greeting, tail)
    }

    pub fn draft_for(&self, item: &MailboxItem) -> ReplyDraft {
        ReplyDraft {
            to: item.return_path().to_string(),
            subject: reply_subject(item.subject()),
            body: self.body(item.has_attachment()),
        }
    }
}

impl Default for ReplyTemplate {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub fn reply_subject(original: &str) -> String {
    format!("{SUBJECT_PREFIX}{original}")
}

impl ReplyDraft {
    /// Single text/plain part with To and Subject headers. From is filled in
    /// by the store.
    pub fn to_rfc822(&self) -> String {
        let to = header_value(&self.to);
        let body = self.body.replace("\r\n", "\n").replace('\n', "\r\n");

        let mut out = format!("To: {to}\r\n");
        out.push_str(&folded_header("Subject", &self.subject));
        out.push_str("MIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"utf-8\"\r\n");
        if body.is_ascii() {
            out.push_str("Content-Transfer-Encoding: 7bit\r\n\r\n");
            out.push_str(&body);
            out.push_str("\r\n");
        } else {
            out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            let encoded = STANDARD.encode(body.as_bytes());
            for chunk in encoded.as_bytes().chunks(BODY_LINE_LIMIT) {
                out.push_str(&String::from_utf8_lossy(chunk));
                out.push_str("\r\n");
            }
        }
        out
    }

    /// URL-safe base64 with padding kept.
    pub fn to_raw(&self) -> String {
        URL_SAFE.encode(self.to_rfc822().as_bytes())
    }
}

fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Unstructured header line, folded so no line runs past the RFC 5322 limits.
/// Non-ASCII text, and ASCII text that cannot be folded at spaces, goes out as
/// RFC 2047 encoded-words.
fn folded_header(name: &str, value: &str) -> String {
    let value = header_value(value);
    let folded = if value.is_ascii() {
        fold_at_spaces(name.len() + 2, &value)
    } else {
        None
    };
    let folded = folded.unwrap_or_else(|| encode_words(&value));
    format!("{name}: {folded}\r\n")
}

/// Breaks before a space once a line would pass 78 chars. `None` when a run
/// without spaces would still push a line past 998.
fn fold_at_spaces(offset: usize, value: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len() + 8);
    let mut line_len = offset;
    let mut line_has_text = true;
    for (i, word) in value.split(' ').enumerate() {
        if i > 0 {
            if line_has_text && line_len + 1 + word.len() > HEADER_LINE_LIMIT {
                out.push_str("\r\n");
                line_len = 0;
                line_has_text = false;
            }
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += word.len();
        line_has_text |= !word.is_empty();
        if line_len > HEADER_LINE_HARD_LIMIT {
            return None;
        }
    }
    Some(out)
}

/// RFC 2047 encoded-words, split on char boundaries and folded one per line.
fn encode_words(value: &str) -> String {
    let mut words = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        let mut end = rest.len().min(ENCODED_WORD_BYTES);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        words.push(format!("=?utf-8?b?{}?=", STANDARD.encode(chunk.as_bytes())));
        rest = tail;
    }
    words.join("\r\n ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_prefix_applies_to_empty_subject() {
        assert_eq!(reply_subject(""), "Re: ");
        assert_eq!(reply_subject("Hi"), "Re: Hi");
    }

    #[test]
    fn header_values_cannot_inject_lines() {
        let draft = ReplyDraft {
            to: "a@b.com\r\nBcc: evil@x.com".into(),
            subject: "Re: x".into(),
            body: "hello".into(),
        };
        let msg = draft.to_rfc822();
        assert!(!msg.contains("\r\nBcc:"));
    }

    #[test]
    fn non_ascii_subject_is_encoded_word() {
        assert_eq!(encode_words("Re: Grüße"), "=?utf-8?b?UmU6IEdyw7zDn2U=?=");
    }

    #[test]
    fn encoded_words_never_split_a_char() {
        let words = encode_words(&"ü".repeat(40));
        let parts: Vec<&str> = words.split("\r\n ").collect();
        assert_eq!(parts.len(), 3);
        for part in parts {
            let payload = part
                .strip_prefix("=?utf-8?b?")
                .and_then(|p| p.strip_suffix("?="))
                .unwrap();
            let bytes = STANDARD.decode(payload).unwrap();
            assert!(String::from_utf8(bytes).is_ok());
            assert!(part.len() <= 75);
        }
    }

    #[test]
    fn short_ascii_subject_is_not_folded() {
        assert_eq!(folded_header("Subject", "Re: Hi"), "Subject: Re: Hi\r\n");
        assert_eq!(folded_header("Subject", "Re: "), "Subject: Re: \r\n");
    }

    #[test]
    fn ascii_run_too_long_to_fold_falls_back_to_encoded_words() {
        assert!(fold_at_spaces(9, &"x".repeat(1200)).is_none());
        let header = folded_header("Subject", &format!("Re: {}", "x".repeat(1200)));
        assert!(header.starts_with("Subject: =?utf-8?b?"));
        assert!(header.split("\r\n").all(|line| line.len() <= 76));
    }
}
