//! Memory record model used by stores and the retriever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format used for the human-readable `timestring`.
const TIMESTRING_FORMAT: &str = "%A, %B %d, %Y at %I:%M%p UTC";

/// Persisted memory record, one per inbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Display name of the message author.
    pub speaker: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Record identifier.
    #[serde(rename = "uuid")]
    pub id: Uuid,
    /// Embedding of the message content.
    pub vector: Vec<f32>,
    /// Formatted `"{speaker}: {timestring} - {content}"` line.
    pub message: String,
    /// Human-readable form of `timestamp`.
    pub timestring: String,
}

impl MemoryRecord {
    /// Create a record stamped with the current time.
    pub fn new(speaker: impl Into<String>, content: &str, vector: Vec<f32>) -> Self {
        Self::at(speaker, content, vector, now_timestamp())
    }

    /// Create a record for an explicit timestamp.
    pub fn at(speaker: impl Into<String>, content: &str, vector: Vec<f32>, timestamp: f64) -> Self {
        let speaker = speaker.into();
        let timestring = timestamp_to_timestring(timestamp);
        let message = format!("{speaker}: {timestring} - {content}");
        Self {
            speaker,
            timestamp,
            id: Uuid::new_v4(),
            vector,
            message,
            timestring,
        }
    }

    /// Vector dimensionality.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Current time as fractional seconds since the epoch.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Render a fractional epoch timestamp for prompts and record messages.
pub fn timestamp_to_timestring(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1_000_000_000.0) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos.min(999_999_999))
        .map(|time| time.format(TIMESTRING_FORMAT).to_string())
        .unwrap_or_else(|| format!("{timestamp}"))
}
