//! Terminal reply surface.

use async_trait::async_trait;
use glovedbot_core::{GlovedBotError, ReplySink};
use std::io::Write;

/// Prints replies as they stream; edits only append the new suffix.
pub struct ConsoleSink<W: Write + Send> {
    out: W,
    speaker: String,
    printed: usize,
    open: bool,
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Sink that prefixes each message with `speaker`.
    pub fn new(out: W, speaker: impl Into<String>) -> Self {
        Self {
            out,
            speaker: speaker.into(),
            printed: 0,
            open: false,
        }
    }

    /// End the current message line.
    pub fn finish(&mut self) -> Result<(), GlovedBotError> {
        if self.open {
            writeln!(self.out)?;
            self.out.flush()?;
            self.open = false;
        }
        Ok(())
    }

    /// Writer back, for inspecting output in tests.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> ReplySink for ConsoleSink<W> {
    async fn begin(&mut self, text: &str) -> Result<(), GlovedBotError> {
        self.finish()?;
        write!(self.out, "{}: {}", self.speaker, text)?;
        self.out.flush()?;
        self.printed = text.len();
        self.open = true;
        Ok(())
    }

    async fn edit(&mut self, text: &str) -> Result<(), GlovedBotError> {
        // Streaming edits only ever extend the message.
        match text.get(self.printed..) {
            Some(suffix) if self.open => write!(self.out, "{suffix}")?,
            _ => {
                return self.begin(text).await;
            }
        }
        self.out.flush()?;
        self.printed = text.len();
        Ok(())
    }

    async fn notice(&mut self, text: &str) -> Result<(), GlovedBotError> {
        self.finish()?;
        writeln!(self.out, "[{text}]")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ConsoleSink;
    use glovedbot_core::ReplySink;
    use pretty_assertions::assert_eq;

    fn output(sink: ConsoleSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).expect("utf8")
    }

    #[tokio::test]
    async fn edits_print_only_new_text() {
        let mut sink = ConsoleSink::new(Vec::new(), "Gloved");
        sink.begin("Hel").await.expect("begin");
        sink.edit("Hello").await.expect("edit");
        sink.edit("Hello!").await.expect("edit");
        sink.finish().expect("finish");
        assert_eq!(output(sink), "Gloved: Hello!\n");
    }

    #[tokio::test]
    async fn new_messages_start_on_new_lines() {
        let mut sink = ConsoleSink::new(Vec::new(), "Gloved");
        sink.begin("first").await.expect("begin");
        sink.begin("second").await.expect("begin");
        sink.notice("Error: oops").await.expect("notice");
        assert_eq!(
            output(sink),
            "Gloved: first\nGloved: second\n[Error: oops]\n"
        );
    }
}
