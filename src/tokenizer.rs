//! Tokenizer abstraction used for prompt length accounting

/// Translates between text and tokens
pub trait Tokenizer
{   type Token;

    fn encode(&self, text: &str) -> Vec<Self::Token>;
    fn decode(&self, tokens: &[Self::Token]) -> String;
}

/// Splits on whitespace; decoding joins with single spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer
{   type Token = String;

    fn encode(&self, text: &str) -> Vec<String>
    {   text.split_whitespace().map(str::to_string).collect()
    }

    fn decode(&self, tokens: &[String]) -> String
    {   tokens.join(" ")
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn test_whitespace_tokenizer()
    {   let tokens = WhitespaceTokenizer.encode("  This is\n a test. ");
        assert_eq!(tokens, vec!["This", "is", "a", "test."]);
        assert_eq!(WhitespaceTokenizer.decode(&tokens[..2]), "This is");
    }
}
