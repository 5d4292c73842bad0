//! Server-sent event decoding for streamed completions.

use crate::error::ChatError;
use crate::types::ChatChunk;
use async_stream::try_stream;
use futures::StreamExt;
use tokio_stream::Stream;
use tracing::debug;

/// What a single SSE line contributes to the token stream.
#[derive(Debug, PartialEq)]
enum SseLine {
    Token(String),
    Done,
    Skip,
}

fn parse_line(line: &str) -> Result<SseLine, ChatError> {
    let Some(data) = line.strip_prefix("data:") else {
        // Blank separators, comments and non-data fields.
        return Ok(SseLine::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| ChatError::Stream(format!("malformed chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|content| !content.is_empty())
        .map(SseLine::Token)
        .unwrap_or(SseLine::Skip))
}

/// Decode an SSE byte stream into content tokens.
///
/// Lines may be split across network chunks, so bytes are buffered until a
/// newline arrives. The stream ends at `data: [DONE]` or when the body ends.
pub fn decode_sse<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, ChatError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    ChatError: From<E>,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(ChatError::from)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                match parse_line(line.trim_end_matches(['\r', '\n']))? {
                    SseLine::Token(token) => yield token,
                    SseLine::Done => {
                        done = true;
                        break;
                    }
                    SseLine::Skip => {}
                }
            }

            if done {
                break;
            }
        }

        if !done && !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            if let SseLine::Token(token) = parse_line(line.trim_end())? {
                yield token;
            }
        }
        debug!(completed = done, "Completion stream ended");
    }
}
