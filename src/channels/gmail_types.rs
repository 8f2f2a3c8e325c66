//! Gmail REST wire types and body extraction.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

// ── Responses ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListDraftsResponse {
    #[serde(default)]
    pub drafts: Vec<DraftRef>,
}

#[derive(Debug, Deserialize)]
pub struct DraftRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct GmailDraft {
    pub id: String,
    #[serde(default)]
    pub message: Option<GmailMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
}

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub raw: String,
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateDraftRequest {
    pub message: OutgoingMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMessageRequest {
    pub remove_label_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SendDraftRequest {
    pub id: String,
}

// ── Payload helpers ─────────────────────────────────────────────────

impl MessagePart {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Readable text of the payload.
    ///
    /// The first `text/plain` part anywhere in the tree wins; otherwise the
    /// first `text/html` part with tags stripped. Result is trimmed.
    pub fn extract_text(&self) -> String {
        let mut text = None;
        let mut html = None;
        self.find_bodies(&mut text, &mut html);

        match (text, html) {
            (Some(text), _) => text.trim().to_string(),
            (None, Some(html)) => strip_html(&html),
            (None, None) => String::new(),
        }
    }

    fn find_bodies(&self, text: &mut Option<String>, html: &mut Option<String>) {
        match self.mime_type.as_deref() {
            Some("text/plain") if text.is_none() => *text = self.decode_data(),
            Some("text/html") if html.is_none() => *html = self.decode_data(),
            _ => {}
        }
        for part in &self.parts {
            if text.is_some() {
                return;
            }
            part.find_bodies(text, html);
        }
    }

    fn decode_data(&self) -> Option<String> {
        let data = self.body.as_ref()?.data.as_ref()?;
        let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Block elements whose end starts a new line.
const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "li", "tr", "ul", "ol", "table", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Strip HTML tags and common entities.
///
/// `<br>` and the end of block elements become line breaks. Runs of spaces
/// within a line collapse to one, and at most one blank line is kept
/// between paragraphs.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut tag: Option<String> = None;
    for ch in html.chars() {
        if let Some(name) = tag.as_mut() {
            if ch == '>' {
                result.push(if breaks_line(name) { '\n' } else { ' ' });
                tag = None;
            } else {
                name.push(ch);
            }
        } else if ch == '<' {
            tag = Some(String::new());
        } else {
            result.push(ch);
        }
    }
    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let mut lines: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() || lines.last().is_some_and(|prev| !prev.is_empty()) {
            lines.push(line);
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn breaks_line(tag: &str) -> bool {
    let tag = tag.trim();
    let (closing, rest) = match tag.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, tag),
    };
    let name = rest
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    name == "br" || (closing && BLOCK_TAGS.contains(&name.as_str()))
}
