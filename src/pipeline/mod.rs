//! Message understanding: intent classification and reply generation.
//!
//! The agent loop only sees the [`ReplyEngine`] trait; [`EmailAssistant`]
//! implements it over whichever `LlmProvider` was configured.

pub mod assistant;
pub mod intent;

pub use assistant::{EmailAssistant, ReplyEngine};
pub use intent::Intent;
