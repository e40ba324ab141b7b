use futures::stream::{Stream, StreamExt};
use tracing::debug;

use crate::providers::{ProviderError, TextStream};

#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    Data(String),
    Done,
}

/// Splits a byte stream into `data:` payloads. Partial lines are held until
/// the rest arrives, so multi-byte characters split across network chunks
/// decode correctly.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(frame) = parse_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.pending);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<SseFrame> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseFrame::Done);
    }
    if data.is_empty() {
        return None;
    }
    Some(SseFrame::Data(data.to_string()))
}

fn frames(
    response: reqwest::Response,
    provider: String,
) -> impl Stream<Item = Result<String, ProviderError>> + Send {
    async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer = SseLineBuffer::default();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for frame in buffer.push(&chunk) {
                        match frame {
                            SseFrame::Data(data) => yield Ok(data),
                            SseFrame::Done => return,
                        }
                    }
                }
                Err(e) => {
                    yield Err(ProviderError::request(&provider, format!("stream error: {}", e)));
                    return;
                }
            }
        }

        if let Some(SseFrame::Data(data)) = buffer.finish() {
            yield Ok(data);
        }
    }
}

/// Text stream from an SSE response. `extract` pulls the text delta out of
/// one JSON payload; payloads without text are skipped.
pub fn text_stream<F>(response: reqwest::Response, provider: &str, extract: F) -> TextStream
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    let provider = provider.to_string();
    let stream = frames(response, provider.clone()).filter_map(move |item| {
        let out = match item {
            Ok(data) => match extract(&data) {
                Some(text) if !text.is_empty() => Some(Ok(text)),
                Some(_) => None,
                None => {
                    debug!("{}: skipping SSE payload without text", provider);
                    None
                }
            },
            Err(e) => Some(Err(e)),
        };
        futures::future::ready(out)
    });
    Box::pin(stream)
}
