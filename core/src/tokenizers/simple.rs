use super::{
    ByteChunkCodec, Tokenizer, TokenizerError, DEFAULT_MAX_INPUT_TOKENS, DEFAULT_MAX_OUTPUT_TOKENS,
    MAX_BYTES_PER_TOKEN,
};

/// Tokenizer with explicitly configured limits, for models no vendor table
/// knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTokenizer {
    model: String,
    codec: ByteChunkCodec,
    max_input_tokens: usize,
    max_output_tokens: usize,
}

impl SimpleTokenizer {
    pub fn new(
        model: impl Into<String>,
        bytes_per_token: usize,
        max_input_tokens: usize,
        max_output_tokens: usize,
    ) -> Result<Self, TokenizerError> {
        Ok(Self {
            model: model.into(),
            codec: ByteChunkCodec::new(bytes_per_token)?,
            max_input_tokens,
            max_output_tokens,
        })
    }
}

impl Default for SimpleTokenizer {
    fn default() -> Self {
        Self {
            model: "simple".to_string(),
            codec: ByteChunkCodec {
                bytes_per_token: MAX_BYTES_PER_TOKEN,
            },
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

impl Tokenizer for SimpleTokenizer {
    fn model(&self) -> &str {
        &self.model
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    fn max_output_tokens(&self) -> usize {
        self.max_output_tokens
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.codec.encode(text)
    }

    fn decode(&self, tokens: &[u32]) -> String {
        self.codec.decode(tokens)
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.codec.count(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_left() {
        let tokenizer = SimpleTokenizer::new("local", 2, 10, 4).unwrap();
        assert_eq!(tokenizer.count_tokens("abcde"), 3);
        assert_eq!(tokenizer.count_input_tokens_left("abcde"), 7);
        assert_eq!(tokenizer.count_output_tokens_left("abcde"), 1);
        assert_eq!(tokenizer.count_output_tokens_left("abcdefghij"), -1);
    }

    #[test]
    fn test_round_trip() {
        let tokenizer = SimpleTokenizer::new("local", 3, 10, 4).unwrap();
        let text = "foo bar ✓";
        assert_eq!(tokenizer.decode(&tokenizer.encode(text)), text);
    }
}
