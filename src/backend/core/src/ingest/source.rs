//! Where stream messages come from.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::message::StreamMessage;
use crate::error::{ErrorCode, ErrorContext, Result};
use crate::telemetry::metrics::EventMetrics;

/// A source of stream messages, consumed in delivery order.
#[async_trait]
pub trait EventSource: Send {
    /// The next message, or `None` once the stream has ended.
    async fn next_message(&mut self) -> Result<Option<StreamMessage>>;
}

/// Newline-delimited JSON frames from any async reader.
///
/// Blank lines are skipped. A frame that does not decode is logged, counted
/// and skipped; only I/O failures end the stream with an error.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: u64,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl JsonLinesSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .with_error_code(ErrorCode::IngestIoError)?;
        debug!(path = %path.display(), "Opened event source");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl JsonLinesSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> EventSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<StreamMessage>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number += 1;
            let frame = line.trim();
            if frame.is_empty() {
                continue;
            }
            match StreamMessage::decode(frame) {
                Ok(message) => return Ok(Some(message)),
                Err(err) => {
                    warn!(
                        line = self.line_number,
                        error = err.internal_message().unwrap_or_default(),
                        "Skipping undecodable stream frame"
                    );
                    EventMetrics::record_dropped("decode_error");
                }
            }
        }
        Ok(None)
    }
}

/// Messages pushed in-process through a channel.
pub struct ChannelSource {
    receiver: mpsc::Receiver<StreamMessage>,
}

impl ChannelSource {
    /// A source plus the sender feeding it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<StreamMessage>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>> {
        Ok(self.receiver.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_lines_skips_blank_and_bad_frames() {
        let input = concat!(
            "\n",
            r#"{"type": "scheduler_event", "data": {"event_name": "scheduler_paused", "event_ts": "2024-03-01 10:00:00"}}"#,
            "\n",
            "not json\n",
            r#"{"type": "scheduler_event", "data": {"event_name": "scheduler_resumed", "event_ts": "2024-03-01 10:01:00"}}"#,
            "\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()));

        let first = source.next_message().await.unwrap().unwrap();
        assert_eq!(first.event().unwrap().kind, "scheduler_paused");
        let second = source.next_message().await.unwrap().unwrap();
        assert_eq!(second.event().unwrap().kind, "scheduler_resumed");
        assert!(source.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_sender_dropped() {
        let (sender, mut source) = ChannelSource::channel(4);
        drop(sender);
        assert!(source.next_message().await.unwrap().is_none());
    }
}
