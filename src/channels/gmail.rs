//! Gmail REST gateway.
//!
//! Talks to `users/me/*` with a bearer token from [`TokenSource`]. Replies
//! are built as RFC 5322 messages with lettre and attached to the original
//! thread through `threadId`.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use lettre::Message;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::channels::gateway::{Draft, MailGateway, MailMessage, reply_subject};
use crate::channels::gmail_types::{
    CreateDraftRequest, GmailDraft, GmailMessage, ListDraftsResponse, ListMessagesResponse,
    ModifyMessageRequest, OutgoingMessage, Profile, SendDraftRequest,
};
use crate::channels::oauth::TokenSource;
use crate::config::env_opt;
use crate::error::MailError;

const DEFAULT_API_URL: &str = "https://gmail.googleapis.com/gmail/v1";
const DEFAULT_TOKEN_PATH: &str = "config/token.json";

/// Gmail connection settings.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// Authorized-user token file with the refresh token.
    pub token_path: PathBuf,
    pub api_url: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl GmailConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_path: env_opt("GMAIL_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.token_path),
            api_url: env_opt("GMAIL_API_URL").unwrap_or(defaults.api_url),
        }
    }
}

/// [`MailGateway`] over the Gmail REST API.
pub struct GmailGateway {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenSource,
    /// Address of the authenticated mailbox, used as the reply sender.
    mailbox: String,
}

impl GmailGateway {
    /// Load the token file and resolve the mailbox address.
    pub async fn connect(config: &GmailConfig) -> Result<Self, MailError> {
        let tokens = TokenSource::from_file(&config.token_path).await?;
        Self::with_token_source(&config.api_url, tokens).await
    }

    pub async fn with_token_source(base_url: &str, tokens: TokenSource) -> Result<Self, MailError> {
        let mut gateway = Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            mailbox: String::new(),
        };

        let profile: Profile = gateway.get_json("users/me/profile", &[]).await?;
        tracing::info!(mailbox = %profile.email_address, "Connected to Gmail");
        gateway.mailbox = profile.email_address;
        Ok(gateway)
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn check(
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, MailError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(MailError::Api {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, MailError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(self.url(endpoint))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        Ok(Self::check(endpoint, resp).await?.json().await?)
    }

    async fn post_json<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<(), MailError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(self.url(endpoint))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::check(endpoint, resp).await?;
        Ok(())
    }

    async fn delete(&self, endpoint: &str) -> Result<(), MailError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .delete(self.url(endpoint))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(endpoint, resp).await?;
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<GmailMessage, MailError> {
        self.get_json(
            &format!("users/me/messages/{id}"),
            &[("format", "full".to_string())],
        )
        .await
    }

    /// Base64url-encoded RFC 5322 reply from this mailbox to `to`.
    fn build_raw(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError> {
        let from: Mailbox = self
            .mailbox
            .parse()
            .map_err(|e| MailError::InvalidMessage(format!("Invalid from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| MailError::InvalidMessage(format!("Invalid to address: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(reply_subject(subject))
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::InvalidMessage(format!("Failed to build email: {e}")))?;

        Ok(URL_SAFE_NO_PAD.encode(email.formatted()))
    }
}

fn to_mail_message(message: GmailMessage) -> MailMessage {
    let payload = message.payload.unwrap_or_default();
    MailMessage {
        sender: payload.header("From").unwrap_or("Unknown Sender").to_string(),
        subject: payload.header("Subject").unwrap_or("No Subject").to_string(),
        body: payload.extract_text(),
        thread_id: message.thread_id.unwrap_or_else(|| message.id.clone()),
        id: message.id,
    }
}

fn to_draft(draft: GmailDraft) -> Draft {
    let (message_id, thread_id, payload) = match draft.message {
        Some(m) => (Some(m.id), m.thread_id, m.payload.unwrap_or_default()),
        None => (None, None, Default::default()),
    };
    Draft {
        draft_id: draft.id,
        message_id,
        to: payload.header("To").unwrap_or_default().to_string(),
        subject: payload.header("Subject").unwrap_or("No Subject").to_string(),
        body: payload.extract_text(),
        thread_id,
    }
}

#[async_trait]
impl MailGateway for GmailGateway {
    async fn list_unread(
        &self,
        max_count: u32,
        since: DateTime<Utc>,
    ) -> Result<Vec<MailMessage>, MailError> {
        let query = format!("is:unread after:{}", since.timestamp());
        let listing: ListMessagesResponse = self
            .get_json(
                "users/me/messages",
                &[("q", query.clone()), ("maxResults", max_count.to_string())],
            )
            .await?;

        let mut messages = Vec::with_capacity(listing.messages.len());
        for reference in listing.messages.into_iter().take(max_count as usize) {
            match self.get_message(&reference.id).await {
                Ok(message) => messages.push(to_mail_message(message)),
                Err(e) => {
                    tracing::warn!(message_id = %reference.id, error = %e, "Skipping message that failed to load");
                }
            }
        }

        tracing::info!(count = messages.len(), query = %query, "Fetched unread messages");
        Ok(messages)
    }

    async fn send_reply(
        &self,
        thread_id: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let message = OutgoingMessage {
            raw: self.build_raw(to, subject, body)?,
            thread_id: thread_id.to_string(),
        };
        self.post_json("users/me/messages/send", &message).await?;
        tracing::info!(to = %to, thread_id = %thread_id, "Reply sent");
        Ok(())
    }

    async fn save_draft(
        &self,
        thread_id: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let request = CreateDraftRequest {
            message: OutgoingMessage {
                raw: self.build_raw(to, subject, body)?,
                thread_id: thread_id.to_string(),
            },
        };
        self.post_json("users/me/drafts", &request).await?;
        tracing::info!(to = %to, thread_id = %thread_id, "Draft saved");
        Ok(())
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), MailError> {
        let request = ModifyMessageRequest {
            remove_label_ids: vec!["UNREAD".to_string()],
        };
        self.post_json(&format!("users/me/messages/{message_id}/modify"), &request)
            .await?;
        tracing::debug!(message_id = %message_id, "Marked as read");
        Ok(())
    }

    async fn list_drafts(&self, max_count: u32) -> Result<Vec<Draft>, MailError> {
        let listing: ListDraftsResponse = self
            .get_json("users/me/drafts", &[("maxResults", max_count.to_string())])
            .await?;

        let mut drafts = Vec::with_capacity(listing.drafts.len());
        for reference in listing.drafts {
            match self
                .get_json::<GmailDraft>(
                    &format!("users/me/drafts/{}", reference.id),
                    &[("format", "full".to_string())],
                )
                .await
            {
                Ok(draft) => drafts.push(to_draft(draft)),
                Err(e) => {
                    tracing::warn!(draft_id = %reference.id, error = %e, "Skipping draft that failed to load");
                }
            }
        }
        Ok(drafts)
    }

    async fn send_draft(&self, draft_id: &str) -> Result<(), MailError> {
        let request = SendDraftRequest {
            id: draft_id.to_string(),
        };
        self.post_json("users/me/drafts/send", &request).await?;
        tracing::info!(draft_id = %draft_id, "Draft sent");
        Ok(())
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<(), MailError> {
        self.delete(&format!("users/me/drafts/{draft_id}")).await?;
        tracing::info!(draft_id = %draft_id, "Draft deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::oauth::AuthorizedUser;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn seeded_tokens() -> TokenSource {
        TokenSource::new(AuthorizedUser {
            client_id: "c".into(),
            client_secret: "s".into(),
            refresh_token: "r".into(),
            token_uri: "http://127.0.0.1:9/token".into(),
            token: Some("ya29.test".into()),
            expiry: Some((Utc::now() + chrono::Duration::hours(1)).to_rfc3339()),
        })
    }

    fn b64(s: &str) -> String {
        URL_SAFE_NO_PAD.encode(s.as_bytes())
    }

    async fn gateway(server: &MockServer) -> GmailGateway {
        Mock::given(method("GET"))
            .and(path("/users/me/profile"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"emailAddress": "me@example.com"})),
            )
            .mount(server)
            .await;
        GmailGateway::with_token_source(&server.uri(), seeded_tokens())
            .await
            .unwrap()
    }

    async fn last_json_body(server: &MockServer) -> serde_json::Value {
        let requests = server.received_requests().await.unwrap();
        requests.last().unwrap().body_json().unwrap()
    }

    fn decode_raw(value: &serde_json::Value) -> String {
        let raw = value.as_str().unwrap();
        String::from_utf8(URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn connect_resolves_mailbox() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        assert_eq!(gateway.mailbox(), "me@example.com");
    }

    #[tokio::test]
    async fn list_unread_queries_since_watermark() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        let since = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/users/me/messages"))
            .and(query_param("q", "is:unread after:1700000000"))
            .and(query_param("maxResults", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "m1", "threadId": "t1"}, {"id": "m2", "threadId": "t2"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/me/messages/m1"))
            .and(query_param("format", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "m1",
                "threadId": "t1",
                "payload": {
                    "mimeType": "multipart/alternative",
                    "headers": [
                        {"name": "From", "value": "Alice <alice@example.com>"},
                        {"name": "Subject", "value": "Lunch?"}
                    ],
                    "parts": [
                        {"mimeType": "text/plain", "body": {"data": b64("Are you free at noon?")}},
                        {"mimeType": "text/html", "body": {"data": b64("<p>Are you free?</p>")}}
                    ]
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/me/messages/m2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;

        let messages = gateway.list_unread(5, since).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            MailMessage {
                id: "m1".into(),
                sender: "Alice <alice@example.com>".into(),
                subject: "Lunch?".into(),
                body: "Are you free at noon?".into(),
                thread_id: "t1".into(),
            }
        );
    }

    #[tokio::test]
    async fn missing_headers_get_placeholders() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;

        Mock::given(method("GET"))
            .and(path("/users/me/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"messages": [{"id": "m9"}]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me/messages/m9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "m9",
                "payload": {"mimeType": "text/plain", "headers": []}
            })))
            .mount(&server)
            .await;

        let messages = gateway.list_unread(10, Utc::now()).await.unwrap();
        assert_eq!(messages[0].sender, "Unknown Sender");
        assert_eq!(messages[0].subject, "No Subject");
        assert_eq!(messages[0].body, "");
        assert_eq!(messages[0].thread_id, "m9");
    }

    #[tokio::test]
    async fn empty_inbox_lists_nothing() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultSizeEstimate": 0
            })))
            .mount(&server)
            .await;

        assert!(gateway.list_unread(10, Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_failure_is_api_error() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/me/messages"))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scope"))
            .mount(&server)
            .await;

        match gateway.list_unread(10, Utc::now()).await {
            Err(MailError::Api { status, body, .. }) => {
                assert_eq!(status, 403);
                assert!(body.contains("insufficient scope"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_reply_posts_threaded_message() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("POST"))
            .and(path("/users/me/messages/send"))
            .and(body_partial_json(serde_json::json!({"threadId": "t1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "sent1"})))
            .expect(1)
            .mount(&server)
            .await;

        gateway
            .send_reply("t1", "alice@example.com", "Lunch?", "Noon works.")
            .await
            .unwrap();

        let body = last_json_body(&server).await;
        let raw = decode_raw(&body["raw"]);
        assert!(raw.contains("From: me@example.com"));
        assert!(raw.contains("To: alice@example.com"));
        assert!(raw.contains("Subject: Re: Lunch?"));
        assert!(raw.contains("Noon works."));
    }

    #[tokio::test]
    async fn save_draft_wraps_message() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("POST"))
            .and(path("/users/me/drafts"))
            .and(body_partial_json(serde_json::json!({"message": {"threadId": "t7"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "d1"})))
            .expect(1)
            .mount(&server)
            .await;

        gateway
            .save_draft("t7", "bob@example.com", "Re: Invoice", "Received, thanks.")
            .await
            .unwrap();

        let body = last_json_body(&server).await;
        let raw = decode_raw(&body["message"]["raw"]);
        assert!(raw.contains("Subject: Re: Invoice"));
        assert!(!raw.contains("Re: Re:"));
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected_before_sending() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;

        let result = gateway.send_reply("t1", "not an address", "s", "b").await;
        assert!(matches!(result, Err(MailError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn mark_read_removes_unread_label() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("POST"))
            .and(path("/users/me/messages/m1/modify"))
            .and(body_partial_json(serde_json::json!({"removeLabelIds": ["UNREAD"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "m1"})))
            .expect(1)
            .mount(&server)
            .await;

        gateway.mark_read("m1").await.unwrap();
    }

    #[tokio::test]
    async fn list_drafts_loads_each_draft() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/me/drafts"))
            .and(query_param("maxResults", "10"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"drafts": [{"id": "d1"}]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me/drafts/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "d1",
                "message": {
                    "id": "dm1",
                    "threadId": "t1",
                    "payload": {
                        "mimeType": "text/plain",
                        "headers": [
                            {"name": "To", "value": "alice@example.com"},
                            {"name": "Subject", "value": "Re: Lunch?"}
                        ],
                        "body": {"data": b64("Noon works.")}
                    }
                }
            })))
            .mount(&server)
            .await;

        let drafts = gateway.list_drafts(10).await.unwrap();
        assert_eq!(
            drafts,
            vec![Draft {
                draft_id: "d1".into(),
                message_id: Some("dm1".into()),
                to: "alice@example.com".into(),
                subject: "Re: Lunch?".into(),
                body: "Noon works.".into(),
                thread_id: Some("t1".into()),
            }]
        );
    }

    #[tokio::test]
    async fn send_and_delete_draft() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("POST"))
            .and(path("/users/me/drafts/send"))
            .and(body_partial_json(serde_json::json!({"id": "d1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "m5"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/users/me/drafts/d2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        gateway.send_draft("d1").await.unwrap();
        gateway.delete_draft("d2").await.unwrap();
    }

    #[tokio::test]
    async fn deleting_unknown_draft_is_api_error() {
        let server = MockServer::start().await;
        let gateway = gateway(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/users/me/drafts/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        assert!(matches!(
            gateway.delete_draft("missing").await,
            Err(MailError::Api { status: 404, .. })
        ));
    }
}
