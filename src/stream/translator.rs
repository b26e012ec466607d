use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;

use crate::protocol::backend::{BackendChunk, ChunkDelta};

use super::lines::LineBuffer;
use super::splice::{ReasoningSplicer, SpliceState, TranslationOptions};

const DATA_PREFIX: &[u8] = b"data:";
const DONE_PAYLOAD: &[u8] = b"[DONE]";
pub(crate) const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Re-frames and splices one backend event stream.
///
/// Owns the partial-line buffer and the splice state for exactly one streamed
/// response; never shared or reused.
#[derive(Debug)]
pub struct StreamTranslator {
    lines: LineBuffer,
    splicer: ReasoningSplicer,
    line_scratch: SmallVec<[Bytes; 8]>,
    malformed_lines: u64,
}

impl StreamTranslator {
    #[must_use]
    pub fn new(options: TranslationOptions) -> Self {
        Self {
            lines: LineBuffer::new(),
            splicer: ReasoningSplicer::new(options),
            line_scratch: SmallVec::new(),
            malformed_lines: 0,
        }
    }

    #[must_use]
    pub fn splice_state(&self) -> SpliceState {
        self.splicer.state()
    }

    #[must_use]
    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }

    /// Feed one backend chunk; complete client frames are appended to `out`.
    ///
    /// The whole chunk is processed before returning.
    pub fn feed<E>(&mut self, chunk: &[u8], out: &mut E)
    where
        E: Extend<Bytes>,
    {
        let mut lines = std::mem::take(&mut self.line_scratch);
        self.lines.push(chunk, &mut lines);
        for line in lines.drain(..) {
            if let Some(frame) = self.translate_line(&line) {
                out.extend(std::iter::once(frame));
            }
        }
        self.line_scratch = lines;
    }

    /// End of the backend stream. An unterminated tail cannot be a complete
    /// event and is dropped; returns the number of bytes discarded.
    pub fn finish(&mut self) -> usize {
        let discarded = self.lines.discard();
        if discarded > 0 {
            tracing::debug!(discarded, "dropping incomplete trailing stream line");
        }
        discarded
    }

    /// Translate one logical line (terminator already removed).
    ///
    /// Returns `None` for lines that are not `data:` events.
    pub fn translate_line(&mut self, line: &[u8]) -> Option<Bytes> {
        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(b" ").unwrap_or(payload);

        if payload.trim_ascii() == DONE_PAYLOAD {
            return Some(Bytes::from_static(DONE_FRAME));
        }

        match serde_json::from_slice::<BackendChunk>(payload) {
            Ok(mut chunk) => {
                self.splice_chunk(&mut chunk);
                match serde_json::to_vec(&chunk) {
                    Ok(json) => Some(data_frame(&json)),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to re-serialize stream event, forwarding original");
                        Some(verbatim_frame(line))
                    }
                }
            }
            Err(err) => {
                self.malformed_lines += 1;
                tracing::warn!(
                    error = %err,
                    line = %String::from_utf8_lossy(line),
                    "malformed stream event, forwarding verbatim"
                );
                Some(verbatim_frame(line))
            }
        }
    }

    fn splice_chunk(&mut self, chunk: &mut BackendChunk) {
        let mut first = true;
        for choice in &mut chunk.choices {
            // Missing and null deltas both come out as `{"content": ""}`.
            let delta = choice.delta.get_or_insert_with(ChunkDelta::default);
            let reasoning = delta.reasoning_content.take();
            let content = delta.content.take();
            let combined = if first {
                first = false;
                self.splicer.splice(reasoning.as_deref(), content.as_deref())
            } else {
                content.unwrap_or_default()
            };
            delta.content = Some(combined);
        }
    }
}

fn data_frame(json: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(json.len() + 8);
    frame.put_slice(b"data: ");
    frame.put_slice(json);
    frame.put_slice(b"\n\n");
    frame.freeze()
}

fn verbatim_frame(line: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(line.len() + 2);
    frame.put_slice(line);
    frame.put_slice(b"\n\n");
    frame.freeze()
}
