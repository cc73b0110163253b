//! Interactive chat session over the RAG engine

use colored::*;
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use sr_core::{ConversationContext, LanguageFlag, Result};
use sr_rag::RagEngine;

use crate::ui::{handle_input_with_history, print_help};

/// What a line typed at the prompt asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Ask(String),
    NewConversation,
    ToggleLanguage,
    Help,
    Exit,
    Empty,
}

impl SessionCommand {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "" => SessionCommand::Empty,
            "exit" | "quit" => SessionCommand::Exit,
            "help" => SessionCommand::Help,
            "new" => SessionCommand::NewConversation,
            "lang" => SessionCommand::ToggleLanguage,
            _ => SessionCommand::Ask(trimmed.to_string()),
        }
    }
}

/// Text streamed for one question
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// The answer ended with an error payload
    pub failed: bool,
}

/// One logical conversation: a fixed conversation id reused on every turn
/// until the user starts a new one.
pub struct ChatSession {
    engine: Arc<RagEngine>,
    context: ConversationContext,
    k: usize,
    history: Vec<String>,
}

impl ChatSession {
    pub fn new(engine: Arc<RagEngine>, language: LanguageFlag, k: usize) -> Self {
        Self {
            engine,
            context: ConversationContext::new(Uuid::new_v4().to_string(), language),
            k,
            history: Vec::new(),
        }
    }

    /// Continue an existing conversation
    pub fn resume(mut self, conversation_id: impl Into<String>) -> Self {
        self.context.conversation_id = conversation_id.into();
        self
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Drop the current conversation id; earlier turns are no longer in scope
    pub fn reset(&mut self) {
        self.context.conversation_id = Uuid::new_v4().to_string();
        info!(conversation_id = %self.context.conversation_id, "started new conversation");
    }

    pub fn toggle_language(&mut self) {
        self.context.language = match self.context.language {
            LanguageFlag::Native => LanguageFlag::Bridged,
            LanguageFlag::Bridged => LanguageFlag::Native,
        };
    }

    /// Stream one answer into `out` as fragments arrive
    pub async fn ask<W: Write>(&self, question: &str, out: &mut W) -> Result<Reply> {
        let mut fragments = self.engine.stream_text(question, &self.context, self.k).await;
        let mut reply = Reply::default();

        while let Some(fragment) = fragments.next().await {
            write!(out, "{}", fragment)?;
            out.flush()?;
            // an error payload is always the final fragment
            reply.failed = fragment.starts_with(sr_rag::ERROR_PREFIX);
            reply.text.push_str(&fragment);
        }
        writeln!(out)?;

        Ok(reply)
    }

    /// Read questions until the user exits
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let input = handle_input_with_history(&mut self.history).await?;

            match SessionCommand::parse(&input) {
                SessionCommand::Empty => continue,
                SessionCommand::Exit => {
                    println!("{}", "Goodbye!".green());
                    return Ok(());
                }
                SessionCommand::Help => print_help(),
                SessionCommand::NewConversation => {
                    self.reset();
                    println!("{}", "Started a new conversation.".cyan());
                }
                SessionCommand::ToggleLanguage => {
                    self.toggle_language();
                    let label = if self.context.language.is_bridged() {
                        "bridged"
                    } else {
                        "native"
                    };
                    println!("{} {}", "Language:".cyan(), label);
                }
                SessionCommand::Ask(question) => {
                    let reply = self.ask(&question, &mut std::io::stdout()).await?;
                    if reply.failed {
                        println!("{}", "The assistant could not answer this question.".red());
                    }
                    println!();
                }
            }
        }
    }
}
