//! Mailbox access: the gateway seam and its Gmail implementation.

pub mod gateway;
pub mod gmail;
pub mod gmail_types;
pub mod oauth;

pub use gateway::{Draft, MailGateway, MailMessage, extract_address, reply_subject};
pub use gmail::{GmailConfig, GmailGateway};
pub use oauth::{AuthorizedUser, TokenSource};
