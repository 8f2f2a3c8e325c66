//! Mail Responder: classifies unread Gmail and drafts or sends LLM replies.

pub mod agent;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;
