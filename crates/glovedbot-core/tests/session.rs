//! Chat session integration tests.

use async_trait::async_trait;
use autoagents_llm::LLMProvider;
use glovedbot_config::{BotConfig, ChatConfig, ExampleConversation, ExampleMessage, GlovedConfig};
use glovedbot_core::session::INVALID_REQUEST_NOTICE;
use glovedbot_core::{BufferedSink, ChatSession, LlmProviders, MemoryEngine, MentionResolver};
use glovedbot_memory::{FileMemoryStore, MemoryStore};
use glovedbot_test_utils::{FailingLLM, RecordingChatLLM, StreamingLLM};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

struct Roster;

#[async_trait]
impl MentionResolver for Roster {
    async fn display_name(&self, user_id: &str) -> Option<String> {
        (user_id == "1001").then(|| "alice".to_string())
    }
}

fn config(chat: ChatConfig) -> GlovedConfig {
    GlovedConfig::builder()
        .bot(BotConfig {
            name: "Gloved".to_string(),
            instructions: "Answer briefly.".to_string(),
            example_conversations: vec![ExampleConversation {
                messages: vec![
                    ExampleMessage {
                        user: "bob".to_string(),
                        text: "hi".to_string(),
                    },
                    ExampleMessage {
                        user: "Gloved".to_string(),
                        text: "hello bob".to_string(),
                    },
                ],
            }],
        })
        .chat(chat)
        .build()
}

fn build_session(
    config: &GlovedConfig,
    memory: Arc<dyn LLMProvider>,
    replies: Arc<dyn LLMProvider>,
    store: Arc<dyn MemoryStore>,
) -> ChatSession {
    let providers = LlmProviders {
        chat: replies,
        summary: memory.clone(),
        embedding: memory,
    };
    let engine = Arc::new(MemoryEngine::from_config(config, &providers, store));
    ChatSession::from_config(config, &providers, engine)
}

/// Streamed replies roll over into new messages at the segment limit.
#[tokio::test]
async fn long_stream_is_split_across_messages() {
    let temp = tempdir().expect("tempdir");
    let config = config(ChatConfig {
        stream_segment_chars: 10,
        ..ChatConfig::default()
    });
    let chunks = vec![
        "The quick ".to_string(),
        "brown fox ".to_string(),
        "jumps".to_string(),
    ];
    let mut session = build_session(
        &config,
        Arc::new(RecordingChatLLM::new("notes")),
        Arc::new(StreamingLLM::new(chunks)),
        Arc::new(FileMemoryStore::new(temp.path())),
    );
    let mut sink = BufferedSink::new();
    let reply = session
        .handle_message("alice", "tell me a sentence", &mut sink)
        .await
        .expect("reply");
    assert_eq!(reply, "The quick brown fox jumps");
    assert_eq!(sink.messages, vec!["The quick ", "brown fox ", "jumps"]);
}

/// The rendered prompt carries persona, examples, notes and mentions.
#[tokio::test]
async fn prompt_is_one_system_message_with_resolved_mentions() {
    let temp = tempdir().expect("tempdir");
    let config = config(ChatConfig::default());
    let replies = RecordingChatLLM::new("Sure.");
    let mut session = build_session(
        &config,
        Arc::new(RecordingChatLLM::new("alice asked about bob")),
        Arc::new(replies.clone()),
        Arc::new(FileMemoryStore::new(temp.path())),
    )
    .with_mentions(Arc::new(Roster));
    let mut sink = BufferedSink::new();
    session
        .handle_message("alice", "ping <@1001> and <@2002>", &mut sink)
        .await
        .expect("reply");

    let sent = replies.last_messages();
    assert_eq!(sent.len(), 1);
    let prompt = &sent[0].content;
    assert!(prompt.starts_with("System: Instructions for Gloved: Answer briefly."));
    assert!(prompt.contains("bob: hi\n<|endoftext|>Gloved: hello bob"));
    assert!(prompt.contains("memories: alice asked about bob"));
    assert!(prompt.contains("alice: ping alice and <@2002>"));
    assert!(prompt.ends_with(" Gloved:"));
}

/// Earlier exchanges show up in the next prompt.
#[tokio::test]
async fn later_prompts_include_recent_lines_and_context() {
    let temp = tempdir().expect("tempdir");
    let config = config(ChatConfig::default());
    let replies = RecordingChatLLM::new("Noted.");
    let mut session = build_session(
        &config,
        Arc::new(RecordingChatLLM::new("notes so far")),
        Arc::new(replies.clone()),
        Arc::new(FileMemoryStore::new(temp.path())),
    );
    let mut sink = BufferedSink::new();
    session
        .handle_message("alice", "my name is alice", &mut sink)
        .await
        .expect("reply");
    session
        .handle_message("alice", "what is my name?", &mut sink)
        .await
        .expect("reply");

    let prompt = replies.last_messages()[0].content.clone();
    assert!(prompt.contains("context: notes so far"));
    assert!(prompt.contains("alice: my name is alice\n<|endoftext|>Gloved: Noted."));
    assert!(prompt.contains("alice: what is my name?"));
}

/// A failed reply posts one notice and keeps the record it already stored.
#[tokio::test]
async fn failed_reply_posts_notice() {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(FileMemoryStore::new(temp.path()));
    let config = config(ChatConfig::default());
    let mut session = build_session(
        &config,
        Arc::new(RecordingChatLLM::new("notes")),
        Arc::new(FailingLLM::chat_only("Invalid request: unsupported role")),
        store.clone(),
    );
    let mut sink = BufferedSink::new();
    session
        .handle_message("alice", "hello", &mut sink)
        .await
        .unwrap_err();
    assert_eq!(sink.notices, vec![INVALID_REQUEST_NOTICE]);
    assert!(sink.messages.is_empty());
    assert_eq!(store.load_all().await.expect("load").len(), 1);
}
