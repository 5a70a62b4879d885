//! One chat channel: recent message window, memory turn and reply.

use crate::completion::{CompletionClient, text_message};
use crate::engine::MemoryEngine;
use crate::error::{CompletionStatus, GlovedBotError};
use crate::llm::LlmProviders;
use crate::prompt::{ChatLine, MentionResolver, TurnPrompt, resolve_mentions};
use crate::reply::{ReplySink, send_reply, stream_reply};
use crate::retry::RetryPolicy;
use autoagents_llm::chat::ChatRole;
use glovedbot_config::{BotConfig, ChatConfig, GlovedConfig};
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Notice shown when the prompt no longer fits the model.
pub const TOO_LONG_NOTICE: &str =
    "Error: this conversation is too long for the model. Please start a new one.";
/// Notice shown when the provider rejects the request.
pub const INVALID_REQUEST_NOTICE: &str =
    "Error: the request was rejected by the model provider. Please try rephrasing.";
/// Notice shown for any other failure.
pub const OTHER_ERROR_NOTICE: &str = "Error: something went wrong. Please try again later.";

/// User-visible notice for a failed turn.
pub fn error_notice(err: &GlovedBotError) -> &'static str {
    match err.status() {
        CompletionStatus::TooLong => TOO_LONG_NOTICE,
        CompletionStatus::InvalidRequest => INVALID_REQUEST_NOTICE,
        CompletionStatus::Ok | CompletionStatus::OtherError => OTHER_ERROR_NOTICE,
    }
}

/// One chat channel and its window of recent lines.
pub struct ChatSession {
    engine: Arc<MemoryEngine>,
    completion: CompletionClient,
    bot: BotConfig,
    chat: ChatConfig,
    recent: VecDeque<ChatLine>,
    mentions: Option<Arc<dyn MentionResolver>>,
}

impl ChatSession {
    /// Session with an empty recent window and no mention resolver.
    pub fn new(
        engine: Arc<MemoryEngine>,
        completion: CompletionClient,
        bot: BotConfig,
        chat: ChatConfig,
    ) -> Self {
        Self {
            engine,
            completion,
            bot,
            chat,
            recent: VecDeque::new(),
            mentions: None,
        }
    }

    /// Session whose replies use the configured chat model.
    pub fn from_config(
        config: &GlovedConfig,
        providers: &LlmProviders,
        engine: Arc<MemoryEngine>,
    ) -> Self {
        let completion =
            CompletionClient::new(providers.chat.clone(), RetryPolicy::from(&config.retry));
        Self::new(engine, completion, config.bot.clone(), config.chat.clone())
    }

    /// Resolve `<@id>` mentions in replies before they are sent.
    pub fn with_mentions(mut self, resolver: Arc<dyn MentionResolver>) -> Self {
        self.mentions = Some(resolver);
        self
    }

    /// Lines the next prompt starts from, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &ChatLine> {
        self.recent.iter()
    }

    /// Engine shared with other sessions.
    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    /// Handle one inbound message and deliver the reply to `sink`.
    ///
    /// On failure a single notice is posted to `sink` and the error is
    /// returned; the recent window is left as it was.
    pub async fn handle_message(
        &mut self,
        speaker: &str,
        content: &str,
        sink: &mut dyn ReplySink,
    ) -> Result<String, GlovedBotError> {
        match self.respond(speaker, content, sink).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                warn!(
                    "turn failed (speaker={}, status={:?}, error={})",
                    speaker,
                    err.status(),
                    err
                );
                if let Err(notice_err) = sink.notice(error_notice(&err)).await {
                    warn!("failed to post error notice (error={})", notice_err);
                }
                Err(err)
            }
        }
    }

    async fn respond(
        &mut self,
        speaker: &str,
        content: &str,
        sink: &mut dyn ReplySink,
    ) -> Result<String, GlovedBotError> {
        if self.chat.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.chat.response_delay_ms)).await;
        }

        let turn = self.engine.remember_and_recall(speaker, content).await?;
        let inbound = ChatLine::new(speaker, content);
        let keep = self.chat.max_message_history.saturating_sub(1);
        let skip = self.recent.len().saturating_sub(keep);
        let lines = self
            .recent
            .iter()
            .skip(skip)
            .cloned()
            .chain(std::iter::once(inbound.clone()))
            .collect::<Vec<_>>();

        let prompt = TurnPrompt::new(&self.bot)
            .context(turn.context.clone())
            .memories(turn.notes.clone())
            .lines(lines)
            .build(&turn.record.timestring);
        let mut rendered = prompt.render();
        if let Some(resolver) = &self.mentions {
            rendered = resolve_mentions(&rendered, resolver.as_ref()).await;
        }
        let messages = vec![text_message(ChatRole::System, rendered)];

        let reply = if self.chat.stream_replies {
            let stream = self.completion.stream(&messages).await?;
            stream_reply(stream, sink, self.chat.stream_segment_chars).await?
        } else {
            let reply = self.completion.complete(&messages).await?;
            send_reply(&reply, sink, self.chat.max_chars_per_reply).await?;
            reply
        };
        let reply = reply.trim().to_string();

        self.remember_line(inbound);
        self.remember_line(ChatLine::new(self.bot.name.clone(), reply.clone()));
        info!(
            "replied (speaker={}, reply_chars={}, recalled={}, window={})",
            speaker,
            reply.chars().count(),
            turn.recalled.len(),
            self.recent.len()
        );
        Ok(reply)
    }

    fn remember_line(&mut self, line: ChatLine) {
        self.recent.push_back(line);
        while self.recent.len() > self.chat.max_message_history {
            self.recent.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatSession, OTHER_ERROR_NOTICE, TOO_LONG_NOTICE};
    use crate::completion::CompletionClient;
    use crate::embedder::LlmEmbedder;
    use crate::engine::MemoryEngine;
    use crate::reply::BufferedSink;
    use crate::retry::RetryPolicy;
    use crate::summarizer::Summarizer;
    use autoagents_llm::LLMProvider;
    use glovedbot_config::{BotConfig, ChatConfig};
    use glovedbot_memory::{InMemoryStore, NotesHistory, RecallOptions, Retriever};
    use glovedbot_test_utils::{FailingLLM, RecordingChatLLM};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn session(
        memory_llm: Arc<dyn LLMProvider>,
        reply_llm: Arc<dyn LLMProvider>,
        chat: ChatConfig,
    ) -> ChatSession {
        let embedder = Arc::new(LlmEmbedder::new(memory_llm.clone(), RetryPolicy::default()));
        let summarizer = Summarizer::new(
            CompletionClient::new(memory_llm, RetryPolicy::default()),
            embedder.clone(),
            NotesHistory::default(),
        );
        let engine = MemoryEngine::new(
            Arc::new(InMemoryStore::new()),
            embedder,
            Retriever::new(RecallOptions::default()),
            summarizer,
        );
        let bot = BotConfig {
            name: "Gloved".to_string(),
            instructions: "Be kind.".to_string(),
            example_conversations: Vec::new(),
        };
        ChatSession::new(
            Arc::new(engine),
            CompletionClient::new(reply_llm, RetryPolicy::default()),
            bot,
            chat,
        )
    }

    #[tokio::test]
    async fn reply_is_streamed_and_window_updated() {
        let memory = Arc::new(RecordingChatLLM::new("alice said hi"));
        let replies = RecordingChatLLM::new("Hello alice!");
        let mut session = session(memory, Arc::new(replies.clone()), ChatConfig::default());
        let mut sink = BufferedSink::new();
        let reply = session
            .handle_message("alice", "hi", &mut sink)
            .await
            .expect("reply");
        assert_eq!(reply, "Hello alice!");
        assert_eq!(sink.messages, vec!["Hello alice!"]);
        let window = session
            .recent()
            .map(|line| line.render())
            .collect::<Vec<_>>();
        assert_eq!(window, vec!["alice: hi", "Gloved: Hello alice!"]);

        let sent = replies.last_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.contains("memories: alice said hi"));
        assert!(sent[0].content.ends_with(" Gloved:"));
    }

    #[tokio::test]
    async fn whole_replies_are_split_when_not_streaming() {
        let memory = Arc::new(RecordingChatLLM::new("notes"));
        let replies = Arc::new(RecordingChatLLM::new("abcdefgh"));
        let chat = ChatConfig {
            stream_replies: false,
            max_chars_per_reply: 3,
            ..ChatConfig::default()
        };
        let mut session = session(memory, replies, chat);
        let mut sink = BufferedSink::new();
        session
            .handle_message("bob", "hey", &mut sink)
            .await
            .expect("reply");
        assert_eq!(sink.messages, vec!["abc", "def", "gh"]);
    }

    #[tokio::test]
    async fn window_is_bounded() {
        let memory = Arc::new(RecordingChatLLM::new("notes"));
        let replies = Arc::new(RecordingChatLLM::new("ok"));
        let chat = ChatConfig {
            max_message_history: 3,
            ..ChatConfig::default()
        };
        let mut session = session(memory, replies, chat);
        let mut sink = BufferedSink::new();
        for text in ["one", "two", "three"] {
            session
                .handle_message("carol", text, &mut sink)
                .await
                .expect("reply");
        }
        let window = session
            .recent()
            .map(|line| line.render())
            .collect::<Vec<_>>();
        assert_eq!(window, vec!["Gloved: ok", "carol: three", "Gloved: ok"]);
    }

    #[tokio::test]
    async fn failure_posts_one_notice() {
        let memory = Arc::new(RecordingChatLLM::new("notes"));
        let replies = Arc::new(FailingLLM::chat_only(
            "This model's maximum context length is 4097 tokens",
        ));
        let mut session = session(memory, replies, ChatConfig::default());
        let mut sink = BufferedSink::new();
        session
            .handle_message("dave", "tell me everything", &mut sink)
            .await
            .unwrap_err();
        assert_eq!(sink.notices, vec![TOO_LONG_NOTICE]);
        assert!(sink.messages.is_empty());
        assert_eq!(session.recent().count(), 0);
    }

    #[tokio::test]
    async fn memory_failure_uses_generic_notice() {
        let memory = Arc::new(FailingLLM::new("401 Unauthorized"));
        let replies = Arc::new(RecordingChatLLM::new("unused"));
        let mut session = session(memory, replies.clone(), ChatConfig::default());
        let mut sink = BufferedSink::new();
        session
            .handle_message("erin", "hello", &mut sink)
            .await
            .unwrap_err();
        assert_eq!(sink.notices, vec![OTHER_ERROR_NOTICE]);
        assert_eq!(replies.call_count(), 0);
    }
}
