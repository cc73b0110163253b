//! RAG engine implementation

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use sr_core::{
    ChatRequest, ConversationContext, Error, LLMProvider, PropertyMap, Result, TextStream,
    VectorStore,
};

use crate::config::RagConfig;
use crate::template::PromptTemplate;

/// Prefix of the textual error payload returned by the text adapters
pub const ERROR_PREFIX: &str = "Error generating response: ";

const ANSWER_TEMPERATURE: f32 = 0.3;
const TRANSLATION_TEMPERATURE: f32 = 0.0;

/// Text fragments with failures already folded into an error payload
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Stage a single query is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryState {
    Idle,
    Translating,
    Embedding,
    Retrieving,
    Prompting,
    Generating,
    Completed,
    Errored,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryState::Idle => "idle",
            QueryState::Translating => "translating",
            QueryState::Embedding => "embedding",
            QueryState::Retrieving => "retrieving",
            QueryState::Prompting => "prompting",
            QueryState::Generating => "generating",
            QueryState::Completed => "completed",
            QueryState::Errored => "errored",
        };
        f.write_str(name)
    }
}

struct QueryTrace {
    conversation_id: String,
    state: QueryState,
}

impl QueryTrace {
    fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            state: QueryState::Idle,
        }
    }

    fn enter(&mut self, next: QueryState) {
        debug!(conversation_id = %self.conversation_id, from = %self.state, to = %next, "query state");
        self.state = next;
    }

    fn fail(&mut self, error: &Error) {
        warn!(conversation_id = %self.conversation_id, state = %self.state, error = %error, "query failed");
        self.state = QueryState::Errored;
    }
}

/// A generated answer together with the documents it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub conversation_id: String,
    /// Retrieved property maps, nearest first
    pub documents: Vec<PropertyMap>,
}

/// Format an error the way the text adapters report it
pub fn error_payload(error: &Error) -> String {
    format!("{}{}", ERROR_PREFIX, error)
}

/// Render retrieved documents as a JSON object keyed `doc_0`, `doc_1`, ...
/// in rank order.
pub fn render_context(documents: &[PropertyMap]) -> Result<String> {
    let mut context = String::from("{");
    for (i, document) in documents.iter().enumerate() {
        if i > 0 {
            context.push_str(", ");
        }
        context.push_str(&format!("\"doc_{}\": {}", i, serde_json::to_string(document)?));
    }
    context.push('}');
    Ok(context)
}

fn translation_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following text into {}. Reply with the translation only, without notes or explanations.\n\n{}",
        target_language, text
    )
}

/// Retrieval-augmented answering over a vector store and a chat model.
///
/// Holds no per-conversation state: the conversation id is forwarded to the
/// provider on every answer request and the provider keeps the history.
pub struct RagEngine {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LLMProvider>,
    template: PromptTemplate,
    config: RagConfig,
}

impl RagEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LLMProvider>,
        template: PromptTemplate,
        config: RagConfig,
    ) -> Self {
        Self {
            store,
            llm,
            template,
            config,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Assemble the prompt for `question` from documents in rank order
    pub fn build_prompt(&self, documents: &[PropertyMap], question: &str) -> Result<String> {
        let context = render_context(documents)?;
        Ok(self.template.render(&context, question))
    }

    fn translation_request(&self, text: &str, target_language: &str) -> ChatRequest {
        ChatRequest::new(translation_prompt(text, target_language))
            .with_temperature(TRANSLATION_TEMPERATURE)
            .with_max_tokens(self.config.max_tokens)
    }

    /// Translate `text` with a single-shot generation request.
    ///
    /// Never carries a conversation id, so translations stay out of the
    /// dialogue history.
    pub async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let translated = self
            .llm
            .chat(&self.translation_request(text, target_language))
            .await?;
        Ok(translated.trim().to_string())
    }

    /// Embed and search, returning the nearest `k` property maps
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<PropertyMap>> {
        let vector = self.store.embed(question).await?;
        self.search(&vector, k).await
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<PropertyMap>> {
        let result = self.store.search(vector, k, None).await?;
        Ok(result
            .documents
            .into_iter()
            .map(|document| document.properties)
            .collect())
    }

    /// Everything up to the generation call: bridge, embed, retrieve, prompt
    async fn prepare(
        &self,
        question: &str,
        conversation: &ConversationContext,
        k: usize,
        trace: &mut QueryTrace,
    ) -> Result<(ChatRequest, Vec<PropertyMap>)> {
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }
        if k == 0 {
            return Err(Error::InvalidInput("k must be at least 1".to_string()));
        }

        let question = if conversation.language.is_bridged() {
            trace.enter(QueryState::Translating);
            self.translate(question, &self.config.native_language).await?
        } else {
            question.to_string()
        };

        trace.enter(QueryState::Embedding);
        let vector = self.store.embed(&question).await?;

        trace.enter(QueryState::Retrieving);
        let documents = self.search(&vector, k).await?;
        info!(conversation_id = %conversation.conversation_id, k, retrieved = documents.len(), "retrieved documents");

        trace.enter(QueryState::Prompting);
        let prompt = self.build_prompt(&documents, &question)?;
        let request = ChatRequest::new(prompt)
            .with_preamble(self.config.preamble.clone())
            .with_conversation(conversation.conversation_id.clone())
            .with_temperature(ANSWER_TEMPERATURE)
            .with_max_tokens(self.config.max_tokens);

        Ok((request, documents))
    }

    async fn run_answer(
        &self,
        question: &str,
        conversation: &ConversationContext,
        k: usize,
        trace: &mut QueryTrace,
    ) -> Result<Answer> {
        let (request, documents) = self.prepare(question, conversation, k, trace).await?;

        trace.enter(QueryState::Generating);
        let mut text = self.llm.chat(&request).await?;

        if conversation.language.is_bridged() {
            trace.enter(QueryState::Translating);
            text = self.translate(&text, &self.config.bridged_language).await?;
        }

        Ok(Answer {
            text,
            conversation_id: conversation.conversation_id.clone(),
            documents,
        })
    }

    /// Answer `question` using the `k` nearest documents
    pub async fn answer(
        &self,
        question: &str,
        conversation: &ConversationContext,
        k: usize,
    ) -> Result<Answer> {
        let mut trace = QueryTrace::new(&conversation.conversation_id);
        match self.run_answer(question, conversation, k, &mut trace).await {
            Ok(answer) => {
                trace.enter(QueryState::Completed);
                Ok(answer)
            }
            Err(e) => {
                trace.fail(&e);
                Err(e)
            }
        }
    }

    async fn open_stream(
        &self,
        question: &str,
        conversation: &ConversationContext,
        k: usize,
        trace: &mut QueryTrace,
    ) -> Result<TextStream> {
        let (request, _) = self.prepare(question, conversation, k, trace).await?;
        trace.enter(QueryState::Generating);

        if !conversation.language.is_bridged() {
            return self.llm.chat_stream(&request).await;
        }

        // a partial sentence cannot be translated safely: generate in full,
        // then stream the translation
        let full = self.llm.chat(&request).await?;
        trace.enter(QueryState::Translating);
        self.llm
            .chat_stream(&self.translation_request(&full, &self.config.bridged_language))
            .await
    }

    /// Stream the answer fragment by fragment.
    ///
    /// Retrieval and prompt failures are returned before any fragment. A
    /// provider failure mid-stream ends the stream after one `Err` item.
    /// Dropping the stream stops forwarding.
    pub async fn stream(
        &self,
        question: &str,
        conversation: &ConversationContext,
        k: usize,
    ) -> Result<TextStream> {
        let mut trace = QueryTrace::new(&conversation.conversation_id);
        let mut upstream = match self.open_stream(question, conversation, k, &mut trace).await {
            Ok(upstream) => upstream,
            Err(e) => {
                trace.fail(&e);
                return Err(e);
            }
        };

        Ok(Box::pin(async_stream::stream! {
            let mut fragments = 0usize;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(fragment) => {
                        fragments += 1;
                        yield Ok(fragment);
                    }
                    Err(e) => {
                        trace.fail(&e);
                        yield Err(e);
                        break;
                    }
                }
            }
            if trace.state != QueryState::Errored {
                trace.enter(QueryState::Completed);
                debug!(conversation_id = %trace.conversation_id, fragments, "stream finished");
            }
        }))
    }

    /// Text adapter over [`RagEngine::answer`]: failures come back as an
    /// error payload starting with [`ERROR_PREFIX`].
    pub async fn answer_text(
        &self,
        question: &str,
        conversation: &ConversationContext,
        k: usize,
    ) -> String {
        match self.answer(question, conversation, k).await {
            Ok(answer) => answer.text,
            Err(e) => error_payload(&e),
        }
    }

    /// Text adapter over [`RagEngine::stream`]: a failure becomes one final
    /// error payload fragment, after which the stream ends.
    pub async fn stream_text(
        &self,
        question: &str,
        conversation: &ConversationContext,
        k: usize,
    ) -> FragmentStream {
        let mut upstream = match self.stream(question, conversation, k).await {
            Ok(upstream) => upstream,
            Err(e) => return Box::pin(futures::stream::iter([error_payload(&e)])),
        };

        Box::pin(async_stream::stream! {
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(fragment) => yield fragment,
                    Err(e) => {
                        yield error_payload(&e);
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(name: &str, text: &str) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.insert("name".to_string(), json!(name));
        map.insert("text".to_string(), json!(text));
        map
    }

    #[test]
    fn test_render_context_keeps_rank_order_past_ten() {
        let documents: Vec<PropertyMap> = (0..12).map(|i| props("faq", &format!("t{}", i))).collect();
        let context = render_context(&documents).unwrap();

        let pos = |key: &str| context.find(key).unwrap();
        assert!(pos("\"doc_1\"") < pos("\"doc_2\""));
        assert!(pos("\"doc_9\"") < pos("\"doc_10\""));
        assert!(pos("\"doc_10\"") < pos("\"doc_11\""));

        let parsed: serde_json::Value = serde_json::from_str(&context).unwrap();
        assert_eq!(parsed["doc_11"]["text"], "t11");
    }

    #[test]
    fn test_render_empty_context() {
        assert_eq!(render_context(&[]).unwrap(), "{}");
    }

    #[test]
    fn test_error_payload_prefix() {
        let payload = error_payload(&Error::Provider("rate limited".to_string()));
        assert_eq!(payload, "Error generating response: Provider error: rate limited");
    }

    #[test]
    fn test_translation_prompt_names_language() {
        let prompt = translation_prompt("مرحبا", "English");
        assert!(prompt.contains("into English"));
        assert!(prompt.ends_with("مرحبا"));
    }

    #[test]
    fn test_query_state_display() {
        assert_eq!(QueryState::Retrieving.to_string(), "retrieving");
        assert_eq!(QueryState::Errored.to_string(), "errored");
    }
}
