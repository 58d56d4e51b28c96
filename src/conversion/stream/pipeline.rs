use std::fmt::Display;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::conversion::stream::state::StreamTranslator;
use crate::errors::BridgeError;
use crate::models::StreamEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, BridgeError>> + Send>>;

type ByteStream<B, E> = Pin<Box<dyn Stream<Item = Result<B, E>> + Send>>;

/// Turns an SSE response body into a lazy sequence of stream events.
///
/// The body is only polled when no translated event is waiting, and it is
/// dropped as soon as the session ends, errors, or is cancelled.
pub fn translate_event_stream<S, B, E>(
    byte_stream: S,
    cancellation: Option<CancellationToken>,
) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let session = StreamSession {
        byte_stream: Some(Box::pin(byte_stream)),
        translator: StreamTranslator::new(),
        cancellation,
    };

    Box::pin(futures_util::stream::unfold(
        session,
        |mut session| async move {
            let item = session.next_item().await?;
            Some((item, session))
        },
    ))
}

struct StreamSession<B, E> {
    byte_stream: Option<ByteStream<B, E>>,
    translator: StreamTranslator,
    cancellation: Option<CancellationToken>,
}

enum BodyRead<T> {
    Cancelled,
    Next(Option<T>),
}

impl<B, E> StreamSession<B, E>
where
    B: AsRef<[u8]>,
    E: Display,
{
    async fn next_item(&mut self) -> Option<Result<StreamEvent, BridgeError>> {
        loop {
            if let Some(event) = self.translator.pop_event() {
                return Some(Ok(event));
            }
            if self.translator.is_terminal() {
                self.byte_stream = None;
                return None;
            }

            let byte_stream = self.byte_stream.as_mut()?;
            let read = match self.cancellation.as_ref() {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => BodyRead::Cancelled,
                    next = byte_stream.next() => BodyRead::Next(next),
                },
                None => BodyRead::Next(byte_stream.next().await),
            };

            match read {
                BodyRead::Cancelled => {
                    debug!(phase = "stream_cancelled", "Caller cancelled the event stream");
                    self.byte_stream = None;
                    return Some(Err(BridgeError::Cancelled));
                }
                BodyRead::Next(Some(Ok(chunk))) => self.translator.feed(chunk.as_ref()),
                BodyRead::Next(Some(Err(read_error))) => {
                    error!(
                        phase = "upstream_stream_error",
                        "Streaming interrupted while reading upstream body: {read_error}"
                    );
                    self.byte_stream = None;
                    return Some(Err(BridgeError::Stream(read_error.to_string())));
                }
                BodyRead::Next(None) => {
                    self.byte_stream = None;
                    self.translator.finish();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::stream;
    use serde_json::json;

    use super::*;
    use crate::models::{BlockDelta, StopReason};

    fn sse(chunk: serde_json::Value) -> Vec<u8> {
        format!("data: {chunk}\n\n").into_bytes()
    }

    fn body(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, io::Error>> + Send + 'static {
        stream::iter(parts.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn yields_full_event_sequence() {
        let events: Vec<_> = translate_event_stream(
            body(vec![
                sse(json!({"choices": [{"delta": {"content": "Hello"}}]})),
                sse(json!({"choices": [{"delta": {}, "finish_reason": "stop"}]})),
            ]),
            None,
        )
        .collect()
        .await;

        let events: Vec<StreamEvent> = events
            .into_iter()
            .map(|event| event.expect("no error expected"))
            .collect();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[2],
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::Text("Hello".to_string())
            }
        );
        assert_eq!(
            events[4],
            StreamEvent::MessageStop {
                stop_reason: StopReason::EndTurn
            }
        );
    }

    #[tokio::test]
    async fn reads_body_only_when_queue_is_empty() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let upstream = body(vec![
            sse(json!({"choices": [{"delta": {"content": "a"}}]})),
            sse(json!({"choices": [{"delta": {"content": "b"}}]})),
        ])
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut events = translate_event_stream(upstream, None);

        // first chunk yields MessageStart, block start and a delta
        for _ in 0..3 {
            events.next().await.expect("event").expect("ok");
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        events.next().await.expect("event").expect("ok");
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stops_reading_after_finish_reason() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let upstream = body(vec![
            sse(json!({"choices": [{"delta": {"content": "a"}, "finish_reason": "stop"}]})),
            sse(json!({"choices": [{"delta": {"content": "ignored"}}]})),
        ])
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let events: Vec<_> = translate_event_stream(upstream, None).collect().await;
        assert_eq!(events.len(), 6);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_error_is_surfaced_once_and_ends_sequence() {
        let upstream = stream::iter(vec![
            Ok(sse(json!({"choices": [{"delta": {"content": "a"}}]}))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
            Ok(sse(json!({"choices": [{"delta": {"content": "never"}}]}))),
        ]);

        let events: Vec<_> = translate_event_stream(upstream, None).collect().await;
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events.last(),
            Some(Err(BridgeError::Stream(message))) if message.contains("reset by peer")
        ));
    }

    #[tokio::test]
    async fn cancellation_ends_sequence_with_error() {
        let token = CancellationToken::new();
        token.cancel();

        let events: Vec<_> = translate_event_stream(
            body(vec![sse(json!({"choices": [{"delta": {"content": "a"}}]}))]),
            Some(token),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(BridgeError::Cancelled)));
    }

    #[tokio::test]
    async fn pending_stream_is_released_on_cancel() {
        let token = CancellationToken::new();
        let mut events = translate_event_stream(
            stream::pending::<Result<Vec<u8>, io::Error>>(),
            Some(token.clone()),
        );

        let canceller = tokio::spawn(async move {
            tokio::task::yield_now().await;
            token.cancel();
        });

        let first = events.next().await.expect("cancel error");
        assert!(matches!(first, Err(BridgeError::Cancelled)));
        assert!(events.next().await.is_none());
        canceller.await.expect("join");
    }
}
