//! Server-sent event framing for streamed responses

use log::{error, trace};

use crate::error::Error;

/// Payload that ends an OpenAI stream
pub const DONE: &str = "[DONE]";

/// Splits a byte stream into `data:` payloads
#[derive(Debug, Default)]
pub struct SseDecoder
{   buffer: Vec<u8>
}

impl SseDecoder
{   pub fn new() -> Self
    {   SseDecoder::default()
    }

    /// Payloads of every complete line in `bytes` plus what was buffered
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String>
    {   self.buffer.extend_from_slice(bytes);
        let mut payloads = vec![];
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n')
        {   let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line)
            {   payloads.push(payload);
            }
        }
        payloads
    }

    /// Payload of a trailing line that had no newline
    pub fn finish(&mut self) -> Option<String>
    {   let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String>
{   let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty()
    {   None
    } else
    {   Some(payload.to_string())
    }
}

/// Feed every `data:` payload of `response` to `on_data` until the body
/// ends or `on_data` returns `false`.
pub(crate) async fn for_each_data<F>(
  mut response: reqwest::Response
, mut on_data: F
) -> Result<(), Error>
where F: FnMut(&str) -> Result<bool, Error> + Send
{   let mut decoder = SseDecoder::new();
    loop
    {   let bytes = response.chunk().await.map_err(|e| {
          error!("Stream read error: {}", e);
          Error::HttpError(e.to_string())
        })?;
        let (payloads, ended) = match bytes
        {   Some(bytes) => (decoder.feed(&bytes), false)
          , None => (decoder.finish().into_iter().collect(), true)
        };
        for payload in payloads
        {   if !on_data(&payload)?
            {   return Ok(());
            }
        }
        if ended
        {   trace!("Stream ended");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn test_payloads_split_across_reads()
    {   let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"a\":").is_empty());
        assert_eq!(
          decoder.feed(b" 1}\r\n\ndata:{\"b\":2}\n"),
          vec!["{\"a\": 1}".to_string(), "{\"b\":2}".to_string()]
        );
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_non_data_lines_are_skipped()
    {   let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(
          b": keep-alive\nevent: message\ndata: [DONE]\n\n"
        );
        assert_eq!(payloads, vec![DONE.to_string()]);
    }

    #[test]
    fn test_trailing_line_without_newline()
    {   let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: last").is_empty());
        assert_eq!(decoder.finish(), Some("last".to_string()));
    }
}
