//! Delivering reply text to a chat surface.

use crate::completion::ReplyStream;
use crate::error::{GlovedBotError, RemoteServiceError};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::debug;

/// Surface that shows bot messages, e.g. a chat channel or a terminal.
#[async_trait]
pub trait ReplySink: Send {
    /// Post a new message.
    async fn begin(&mut self, text: &str) -> Result<(), GlovedBotError>;
    /// Replace the text of the message posted last.
    async fn edit(&mut self, text: &str) -> Result<(), GlovedBotError>;
    /// Post a user-visible error notice.
    async fn notice(&mut self, text: &str) -> Result<(), GlovedBotError>;
}

/// Sink that keeps everything in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedSink {
    pub messages: Vec<String>,
    pub notices: Vec<String>,
    pub edits: usize,
}

impl BufferedSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReplySink for BufferedSink {
    async fn begin(&mut self, text: &str) -> Result<(), GlovedBotError> {
        self.messages.push(text.to_string());
        Ok(())
    }

    async fn edit(&mut self, text: &str) -> Result<(), GlovedBotError> {
        match self.messages.last_mut() {
            Some(last) => *last = text.to_string(),
            None => self.messages.push(text.to_string()),
        }
        self.edits += 1;
        Ok(())
    }

    async fn notice(&mut self, text: &str) -> Result<(), GlovedBotError> {
        self.notices.push(text.to_string());
        Ok(())
    }
}

/// Split `text` into pieces of at most `max_chars` characters.
pub fn split_into_shorter_messages(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars = text.chars().collect::<Vec<_>>();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Post `text` as one or more whole messages.
pub async fn send_reply(
    text: &str,
    sink: &mut dyn ReplySink,
    max_chars: usize,
) -> Result<(), GlovedBotError> {
    for piece in split_into_shorter_messages(text, max_chars) {
        sink.begin(&piece).await?;
    }
    Ok(())
}

fn split_at_char(text: &str, count: usize) -> (&str, &str) {
    match text.char_indices().nth(count) {
        Some((index, _)) => text.split_at(index),
        None => (text, ""),
    }
}

/// Stream a reply into `sink`, editing the current message as chunks arrive.
///
/// A message never holds more than `segment_limit` characters; the overflow
/// starts a new message. Leading whitespace-only output is held back until
/// visible text arrives. Returns the whole reply.
pub async fn stream_reply(
    mut stream: ReplyStream,
    sink: &mut dyn ReplySink,
    segment_limit: usize,
) -> Result<String, GlovedBotError> {
    let segment_limit = segment_limit.max(1);
    let mut reply = String::new();
    let mut segment = String::new();
    let mut segment_chars = 0usize;
    let mut posted = false;
    let mut messages = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        reply.push_str(&chunk);
        let mut rest = chunk.as_str();
        while !rest.is_empty() {
            if segment_chars == segment_limit {
                segment.clear();
                segment_chars = 0;
                posted = false;
            }
            let (head, tail) = split_at_char(rest, segment_limit - segment_chars);
            segment.push_str(head);
            segment_chars += head.chars().count();
            rest = tail;
            if posted {
                sink.edit(&segment).await?;
            } else if !segment.trim().is_empty() {
                sink.begin(&segment).await?;
                posted = true;
                messages += 1;
            }
        }
    }

    if reply.trim().is_empty() {
        return Err(RemoteServiceError::EmptyResponse("completion".to_string()).into());
    }
    debug!(
        "reply streamed (chars={}, messages={})",
        reply.chars().count(),
        messages
    );
    Ok(reply)
}
