//! Incremental UTF-8 decoding for streamed response bodies
//!
//! Network chunk boundaries do not respect character boundaries, so a
//! multi-byte character may arrive split across two fragments. The decoder
//! holds back an incomplete trailing sequence until the rest arrives.

use crate::error::{DuelError, Result};

/// Stateful UTF-8 decoder for a single stream
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::Decode`] when the bytes are not valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use device_duel::chat::Utf8StreamDecoder;
    ///
    /// let mut decoder = Utf8StreamDecoder::new();
    /// let euro = "€".as_bytes();
    /// assert_eq!(decoder.decode(&euro[..1]).unwrap(), "");
    /// assert_eq!(decoder.decode(&euro[1..]).unwrap(), "€");
    /// ```
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(chunk);

        let decoded = std::str::from_utf8(&self.pending).map(str::to_string);
        match decoded {
            Ok(text) => {
                self.pending.clear();
                Ok(text)
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the end: emit the valid prefix, keep the tail.
                let valid = e.valid_up_to();
                let tail = self.pending.split_off(valid);
                let text = String::from_utf8(std::mem::replace(&mut self.pending, tail))
                    .map_err(|e| DuelError::Decode(e.to_string()))?;
                Ok(text)
            }
            Err(e) => {
                self.pending.clear();
                Err(DuelError::Decode(format!("invalid UTF-8 in response stream: {}", e)).into())
            }
        }
    }

    /// Signal end of stream
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::Decode`] if the stream ended mid-character.
    pub fn finish(self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(DuelError::Decode(format!(
                "response stream ended inside a character ({} dangling bytes)",
                self.pending.len()
            ))
            .into())
        }
    }
}
