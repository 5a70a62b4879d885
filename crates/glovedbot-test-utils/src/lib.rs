//! Test helpers shared across GlovedBot crates.

pub mod llm;
pub mod memory;

pub use llm::{
    FailingLLM, FixedChatResponse, FixedLLM, FlakyLLM, RecordingChatLLM, StallingLLM,
    StreamingLLM,
};
pub use memory::{FailingStore, record_at};
