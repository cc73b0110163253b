//! Session tests against an echoing chat stub

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use sr_core::{ChatRequest, Error, LLMProvider, LanguageFlag, Result, TextStream};
use sr_rag::{PromptTemplate, RagConfig, RagEngine};
use sr_vector::{HashEmbedder, LocalVectorStore};

use crate::ChatSession;

#[derive(Default)]
struct EchoLLM {
    conversation_ids: Mutex<Vec<Option<String>>>,
    drop_connection: bool,
}

#[async_trait]
impl LLMProvider for EchoLLM {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.conversation_ids
            .lock()
            .unwrap()
            .push(request.conversation_id.clone());
        Ok("full".to_string())
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        self.conversation_ids
            .lock()
            .unwrap()
            .push(request.conversation_id.clone());
        let mut fragments = vec![Ok("Our ".to_string()), Ok("offers".to_string())];
        if self.drop_connection {
            fragments.push(Err(Error::Provider("connection reset".to_string())));
        }
        Ok(Box::pin(futures::stream::iter(fragments)))
    }

    fn model_id(&self) -> &str {
        "echo"
    }
}

fn session(llm: Arc<EchoLLM>) -> ChatSession {
    let store = Arc::new(LocalVectorStore::new(Arc::new(HashEmbedder::new(32))));
    let engine = RagEngine::new(store, llm, PromptTemplate::default(), RagConfig::default());
    ChatSession::new(Arc::new(engine), LanguageFlag::Native, 5)
}

#[tokio::test]
async fn test_ask_streams_fragments_to_output() {
    let session = session(Arc::new(EchoLLM::default()));
    let mut out = Vec::<u8>::new();

    let reply = session.ask("what offers exist?", &mut out).await.unwrap();

    assert_eq!(reply.text, "Our offers");
    assert!(!reply.failed);
    assert_eq!(String::from_utf8(out).unwrap(), "Our offers\n");
}

#[tokio::test]
async fn test_error_after_partial_answer_marks_reply_failed() {
    let session = session(Arc::new(EchoLLM {
        drop_connection: true,
        ..Default::default()
    }));
    let mut out = Vec::<u8>::new();

    let reply = session.ask("what offers exist?", &mut out).await.unwrap();

    assert!(reply.failed);
    assert!(reply.text.starts_with("Our offers"));
    assert!(reply.text.ends_with("Provider error: connection reset"));
}

#[tokio::test]
async fn test_turns_share_conversation_until_reset() {
    let llm = Arc::new(EchoLLM::default());
    let mut session = session(llm.clone());
    let first_id = session.context().conversation_id.clone();

    session.ask("one", &mut Vec::<u8>::new()).await.unwrap();
    session.ask("two", &mut Vec::<u8>::new()).await.unwrap();
    session.reset();
    session.ask("three", &mut Vec::<u8>::new()).await.unwrap();

    let ids = llm.conversation_ids.lock().unwrap().clone();
    assert_eq!(ids[0].as_deref(), Some(first_id.as_str()));
    assert_eq!(ids[1].as_deref(), Some(first_id.as_str()));
    assert_ne!(ids[2].as_deref(), Some(first_id.as_str()));
    assert_eq!(ids[2].as_deref(), Some(session.context().conversation_id.as_str()));
}

#[tokio::test]
async fn test_resume_and_toggle_language() {
    let mut session = session(Arc::new(EchoLLM::default())).resume("existing-id");
    assert_eq!(session.context().conversation_id, "existing-id");

    session.toggle_language();
    assert_eq!(session.context().language, LanguageFlag::Bridged);
    session.toggle_language();
    assert_eq!(session.context().language, LanguageFlag::Native);
}
