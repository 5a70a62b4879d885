//! Text prompt rendering for reply completions.
//!
//! A prompt is a header line, the configured example conversations and the
//! live conversation, every line rendered as `user: text` and separated by
//! the end-of-text token.

use async_trait::async_trait;
use glovedbot_config::{BotConfig, ExampleConversation};
use regex::Regex;
use std::sync::LazyLock;

/// Token placed between rendered lines.
pub const SEPARATOR_TOKEN: &str = "<|endoftext|>";

static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@(\d+)>").expect("hardcoded mention regex"));

/// One line of a conversation. A line without text renders as a speaker cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub user: String,
    pub text: Option<String>,
}

impl ChatLine {
    /// Line spoken by `user`.
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: Some(text.into()),
        }
    }

    /// Line that invites `user` to speak next.
    pub fn cue(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: None,
        }
    }

    /// `user: text`, or `user:` for a cue.
    pub fn render(&self) -> String {
        match &self.text {
            Some(text) => format!("{}: {}", self.user, text),
            None => format!("{}:", self.user),
        }
    }
}

/// Ordered lines of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    pub lines: Vec<ChatLine>,
}

impl Conversation {
    pub fn new(lines: Vec<ChatLine>) -> Self {
        Self { lines }
    }

    /// Lines joined by a newline and the separator token.
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(ChatLine::render)
            .collect::<Vec<_>>()
            .join(&format!("\n{SEPARATOR_TOKEN}"))
    }
}

impl From<&ExampleConversation> for Conversation {
    fn from(example: &ExampleConversation) -> Self {
        Self::new(
            example
                .messages
                .iter()
                .map(|message| ChatLine::new(message.user.clone(), message.text.clone()))
                .collect(),
        )
    }
}

/// Reply prompt built around one live conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub header: ChatLine,
    pub examples: Vec<Conversation>,
    pub convo: Conversation,
}

impl Prompt {
    /// Header, examples and conversation joined by the separator token.
    pub fn render(&self) -> String {
        let mut parts = vec![self.header.render()];
        if !self.examples.is_empty() {
            parts.push(ChatLine::new("System", "Example conversations:").render());
            parts.extend(self.examples.iter().map(Conversation::render));
            parts.push(
                ChatLine::new(
                    "System",
                    "Now, you will work with the actual current conversation.",
                )
                .render(),
            );
        }
        parts.push(self.convo.render());
        parts.join(&format!("\n{SEPARATOR_TOKEN}"))
    }
}

/// Assembles the prompt for one reply.
///
/// Order of the live conversation: context note, memories note, recent
/// channel lines, then the `"{timestring} {bot}"` cue.
#[derive(Debug, Clone)]
pub struct TurnPrompt<'a> {
    bot: &'a BotConfig,
    memories: Option<String>,
    context: Option<String>,
    lines: Vec<ChatLine>,
}

impl<'a> TurnPrompt<'a> {
    pub fn new(bot: &'a BotConfig) -> Self {
        Self {
            bot,
            memories: None,
            context: None,
            lines: Vec::new(),
        }
    }

    /// Notes written for this turn.
    pub fn memories(mut self, notes: impl Into<String>) -> Self {
        self.memories = Some(notes.into());
        self
    }

    /// Previous turn's notes, if any.
    pub fn context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Recent channel lines, oldest first.
    pub fn lines(mut self, lines: impl IntoIterator<Item = ChatLine>) -> Self {
        self.lines.extend(lines);
        self
    }

    /// Finish the prompt with a cue stamped with `timestring`.
    pub fn build(self, timestring: &str) -> Prompt {
        let mut convo = Vec::with_capacity(self.lines.len() + 3);
        if let Some(context) = self.context {
            convo.push(ChatLine::new("context", context));
        }
        if let Some(memories) = self.memories {
            convo.push(ChatLine::new("memories", memories));
        }
        convo.extend(self.lines);
        convo.push(ChatLine::cue(format!("{timestring} {}", self.bot.name)));
        Prompt {
            header: ChatLine::new(
                "System",
                format!("Instructions for {}: {}", self.bot.name, self.bot.instructions),
            ),
            examples: self
                .bot
                .example_conversations
                .iter()
                .map(Conversation::from)
                .collect(),
            convo: Conversation::new(convo),
        }
    }
}

/// Looks up display names for `<@id>` mentions.
#[async_trait]
pub trait MentionResolver: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Option<String>;
}

/// Replace every `<@id>` the resolver knows; unknown ids stay as they are.
pub async fn resolve_mentions(rendered: &str, resolver: &dyn MentionResolver) -> String {
    let mut ids = MENTION_PATTERN
        .captures_iter(rendered)
        .filter_map(|captures| captures.get(1).map(|id| id.as_str().to_string()))
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    let mut resolved = rendered.to_string();
    for id in ids {
        if let Some(name) = resolver.display_name(&id).await {
            resolved = resolved.replace(&format!("<@{id}>"), &name);
        }
    }
    resolved
}
