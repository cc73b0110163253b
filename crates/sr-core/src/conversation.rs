//! Conversation context forwarded to the generation provider

use serde::{Deserialize, Serialize};

/// Which language the caller's question is written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageFlag {
    /// Same language as the indexed corpus
    #[default]
    Native,
    /// Question must be translated in, and the answer translated back out
    Bridged,
}

impl LanguageFlag {
    pub fn is_bridged(&self) -> bool {
        matches!(self, LanguageFlag::Bridged)
    }
}

/// Identifier and language of one logical conversation.
///
/// Nothing here is persisted: the provider owns the turn history and
/// `conversation_id` is only ever forwarded, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub language: LanguageFlag,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>, language: LanguageFlag) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            language,
        }
    }
}
