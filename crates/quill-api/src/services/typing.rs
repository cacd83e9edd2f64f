//! "Typing" playback of a stored document over Server-Sent Events.
//!
//! The body is cut into fixed-size character pieces and emitted one per tick
//! as `event: chunk`, then a single `event: done`. Dropping the response
//! stream drops the interval with it.

use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::IntervalStream;
use uuid::Uuid;

use quill_core::{defaults, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingParams {
    pub chunk_chars: usize,
    pub interval: Duration,
}

impl TypingParams {
    /// Resolve query overrides against configured defaults.
    pub fn resolve(
        chunk_chars: Option<usize>,
        interval_ms: Option<u64>,
        default_chunk_chars: usize,
        default_interval_ms: u64,
    ) -> Result<Self> {
        let chunk_chars = chunk_chars.unwrap_or(default_chunk_chars);
        if chunk_chars == 0 || chunk_chars > defaults::STREAM_CHUNK_CHARS_MAX {
            return Err(Error::InvalidInput(format!(
                "chunk_chars must be between 1 and {}",
                defaults::STREAM_CHUNK_CHARS_MAX
            )));
        }
        let interval_ms = interval_ms.unwrap_or(default_interval_ms);
        if interval_ms > defaults::STREAM_INTERVAL_MS_MAX {
            return Err(Error::InvalidInput(format!(
                "interval_ms must be at most {}",
                defaults::STREAM_INTERVAL_MS_MAX
            )));
        }
        Ok(Self {
            chunk_chars,
            interval: Duration::from_millis(interval_ms),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkEvent {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoneEvent {
    pub document_id: Uuid,
    pub chunks: usize,
}

/// Split text into pieces of at most `chunk_chars` characters.
pub fn split_chars(text: &str, chunk_chars: usize) -> Vec<String> {
    let chunk_chars = chunk_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_chars {
            pieces.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn chunk_event(index: usize, text: String) -> std::result::Result<Event, axum::Error> {
    Event::default()
        .event("chunk")
        .json_data(ChunkEvent { index, text })
}

/// SSE events for a document body, paced by `params.interval`.
pub fn typing_events(
    document_id: Uuid,
    body: &str,
    params: TypingParams,
) -> BoxStream<'static, std::result::Result<Event, axum::Error>> {
    let pieces = split_chars(body, params.chunk_chars);
    let total = pieces.len();
    let done = Event::default().event("done").json_data(DoneEvent {
        document_id,
        chunks: total,
    });

    let events = stream::iter(
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| chunk_event(index, text))
            .chain(std::iter::once(done)),
    );

    if params.interval.is_zero() {
        return events.boxed();
    }
    let ticks = IntervalStream::new(tokio::time::interval(params.interval));
    events.zip(ticks).map(|(event, _)| event).boxed()
}
