pub mod lines;
pub mod splice;
pub mod translator;

pub use lines::LineBuffer;
pub use splice::{ReasoningDelimiters, ReasoningSplicer, SpliceState, TranslationOptions};
pub use translator::StreamTranslator;

use std::time::Instant;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use smallvec::SmallVec;

use crate::error::{classify, GatewayError};
use crate::observability::log_stream_complete;

/// FIFO of translated frames produced by one chunk, drained one per poll.
struct PendingFrames {
    frames: SmallVec<[Bytes; 8]>,
    head: usize,
}

impl PendingFrames {
    #[inline]
    fn new() -> Self {
        Self {
            frames: SmallVec::new(),
            head: 0,
        }
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.frames.len() {
            return None;
        }
        let frame = std::mem::take(&mut self.frames[self.head]);
        self.head += 1;
        if self.head == self.frames.len() {
            self.frames.clear();
            self.head = 0;
        }
        Some(frame)
    }
}

impl Extend<Bytes> for PendingFrames {
    fn extend<I: IntoIterator<Item = Bytes>>(&mut self, iter: I) {
        self.frames.extend(iter);
    }
}

struct TranslateState<S> {
    upstream: std::pin::Pin<Box<S>>,
    translator: StreamTranslator,
    pending: PendingFrames,
    finished: bool,
    client_model: String,
    started: Instant,
    frames_out: u64,
}

/// Translate a backend byte stream into client SSE frames.
///
/// Each upstream chunk is fully translated before the next one is polled. An
/// upstream error is passed through once and ends the stream; frames already
/// yielded stand.
pub fn translate_stream<S>(
    upstream: S,
    translator: StreamTranslator,
    client_model: String,
) -> impl Stream<Item = Result<Bytes, GatewayError>> + Send
where
    S: Stream<Item = Result<Bytes, GatewayError>> + Send + 'static,
{
    let state = TranslateState {
        upstream: Box::pin(upstream),
        translator,
        pending: PendingFrames::new(),
        finished: false,
        client_model,
        started: Instant::now(),
        frames_out: 0,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                state.frames_out += 1;
                return Some((Ok(frame), state));
            }
            if state.finished {
                return None;
            }

            match state.upstream.as_mut().next().await {
                Some(Ok(chunk)) => state.translator.feed(&chunk, &mut state.pending),
                Some(Err(err)) => {
                    state.finished = true;
                    let normalized = classify(&err);
                    tracing::warn!(
                        model = %state.client_model,
                        kind = normalized.kind.as_str(),
                        frames = state.frames_out,
                        error = %err,
                        "backend stream aborted"
                    );
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    state.translator.finish();
                    log_stream_complete(
                        &state.client_model,
                        state.frames_out,
                        state.translator.malformed_lines(),
                        state.started,
                    );
                }
            }
        }
    })
}
