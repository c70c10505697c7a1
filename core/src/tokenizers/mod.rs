mod simple;
mod vendor;

pub use simple::SimpleTokenizer;
pub use vendor::VendorTokenizer;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_MAX_INPUT_TOKENS: usize = 4096;
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 1000;

/// Largest number of bytes packed into one token.
pub const MAX_BYTES_PER_TOKEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizerError {
    #[error("bytes_per_token must be between 1 and {MAX_BYTES_PER_TOKEN}, got {0}")]
    InvalidBytesPerToken(usize),
}

/// Encoder/decoder pair sized against a model's context window.
pub trait Tokenizer: Send + Sync {
    fn model(&self) -> &str;
    fn max_input_tokens(&self) -> usize;
    fn max_output_tokens(&self) -> usize;

    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> String;

    fn count_tokens(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// `max_input_tokens - count_tokens(text)`, negative when over budget.
    fn count_input_tokens_left(&self, text: &str) -> i64 {
        to_i64(self.max_input_tokens()) - to_i64(self.count_tokens(text))
    }

    fn count_output_tokens_left(&self, text: &str) -> i64 {
        to_i64(self.max_output_tokens()) - to_i64(self.count_tokens(text))
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Byte-level codec: every token packs up to `bytes_per_token` bytes plus
/// their count, so any UTF-8 input decodes back to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ByteChunkCodec {
    bytes_per_token: usize,
}

impl ByteChunkCodec {
    pub(crate) fn new(bytes_per_token: usize) -> Result<Self, TokenizerError> {
        if bytes_per_token == 0 || bytes_per_token > MAX_BYTES_PER_TOKEN {
            return Err(TokenizerError::InvalidBytesPerToken(bytes_per_token));
        }
        Ok(Self { bytes_per_token })
    }

    pub(crate) fn encode(self, text: &str) -> Vec<u32> {
        text.as_bytes()
            .chunks(self.bytes_per_token)
            .map(|chunk| {
                let mut packed = [0u8; 4];
                packed[0] = chunk.len() as u8;
                packed[1..=chunk.len()].copy_from_slice(chunk);
                u32::from_be_bytes(packed)
            })
            .collect()
    }

    pub(crate) fn decode(self, tokens: &[u32]) -> String {
        let mut bytes = Vec::with_capacity(tokens.len() * self.bytes_per_token);
        for token in tokens {
            let len = ((token >> 24) as usize).min(MAX_BYTES_PER_TOKEN);
            let packed = token.to_be_bytes();
            bytes.extend_from_slice(&packed[1..=len]);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub(crate) fn count(self, text: &str) -> usize {
        text.len().div_ceil(self.bytes_per_token)
    }
}

/// Looks `model` up in a prefix table, falling back to the documented
/// defaults with a warning when nothing matches.
pub(crate) fn resolve_limit(model: &str, table: &[(&str, usize)], default: usize) -> usize {
    table
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map_or_else(
            || {
                warn!(
                    "{model} not found in known model prefixes, using default value of {default}"
                );
                default
            },
            |(_, limit)| *limit,
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_round_trip() {
        for width in 1..=MAX_BYTES_PER_TOKEN {
            let codec = ByteChunkCodec::new(width).unwrap();
            for text in ["", "a", "hello world", "héllo wörld ✓", "\u{0}\u{1}\n\t"] {
                let tokens = codec.encode(text);
                assert_eq!(tokens.len(), codec.count(text));
                assert_eq!(codec.decode(&tokens), text);
            }
        }
    }

    #[test]
    fn test_codec_rejects_width() {
        assert_eq!(
            ByteChunkCodec::new(0).unwrap_err(),
            TokenizerError::InvalidBytesPerToken(0)
        );
        assert_eq!(
            ByteChunkCodec::new(4).unwrap_err(),
            TokenizerError::InvalidBytesPerToken(4)
        );
    }

    #[test]
    fn test_resolve_prefers_longest_prefix() {
        let table = [("gpt-4", 8192), ("gpt-4o", 128_000)];
        assert_eq!(resolve_limit("gpt-4o-mini", &table, 1), 128_000);
        assert_eq!(resolve_limit("gpt-4-0613", &table, 1), 8192);
        assert_eq!(resolve_limit("unknown", &table, 1), 1);
    }
}
