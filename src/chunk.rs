//! Sentence-boundary text chunker.
//!
//! Splits contract text into token-bounded chunks without splitting a
//! sentence across chunks. Token counts come from the `cl100k_base`
//! subword encoding, so chunk budgets line up with what the completion
//! endpoint actually meters.
//!
//! # Algorithm
//!
//! 1. Subtract the prompt reserve from `max_tokens` to get the real budget
//!    (room for the wrapping extraction prompt).
//! 2. Split text on the sentence delimiter `". "`, reattaching the period
//!    to every sentence except the last.
//! 3. Greedily accumulate sentences while the running token count stays
//!    within budget; when the next sentence would exceed it, seal the
//!    current chunk (joined with single spaces) and start a new one.
//! 4. A sentence that alone exceeds the budget still lands whole in its
//!    own chunk rather than being truncated.
//!
//! The function is pure: the same input always produces the same chunks,
//! and joining the chunks with spaces reconstructs the text up to
//! delimiter normalization.

use crate::error::{Error, Result};
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Sentence-aligned chunker with a shared `cl100k_base` encoder.
pub struct Chunker {
    bpe: CoreBPE,
    prompt_reserve: usize,
}

impl Chunker {
    /// Build a chunker. Fails only if the embedded encoding cannot load.
    pub fn new(prompt_reserve: usize) -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| Error::Tokenizer(e.to_string()))?;
        Ok(Self {
            bpe,
            prompt_reserve,
        })
    }

    /// Count `cl100k_base` tokens in `text`.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into sentence-aligned chunks of at most
    /// `max_tokens - prompt_reserve` tokens each.
    ///
    /// Returns an empty vector only for empty input.
    pub fn chunk(&self, text: &str, max_tokens: usize) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let budget = max_tokens.saturating_sub(self.prompt_reserve);

        let sentences: Vec<&str> = text.split(". ").collect();
        let last_index = sentences.len() - 1;

        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for (i, raw) in sentences.into_iter().enumerate() {
            // The split consumed ". "; restore the period on all but the
            // final sentence. Joining with a space restores the delimiter.
            let sentence = if i != last_index {
                format!("{raw}.")
            } else {
                raw.to_string()
            };

            let sentence_tokens = self.count_tokens(&sentence);

            if current_tokens + sentence_tokens > budget && !current.is_empty() {
                chunks.push(current.join(" "));
                current.clear();
                current_tokens = 0;
            }

            current.push(sentence);
            current_tokens += sentence_tokens;
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> Chunker {
        Chunker::new(0).unwrap()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunker().chunk("", 100).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunker().chunk("The term is two years.", 100);
        assert_eq!(chunks, vec!["The term is two years.".to_string()]);
    }

    #[test]
    fn joined_chunks_reconstruct_text() {
        let text = "Clause one applies. Clause two applies. Clause three applies here";
        let chunks = chunker().chunk(text, 8);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn no_sentence_is_split() {
        let text = "Alpha beta gamma delta. Epsilon zeta. Eta theta iota kappa.";
        for chunk in chunker().chunk(text, 6) {
            // Every chunk boundary falls on a sentence boundary.
            assert!(chunk.ends_with('.'), "chunk {chunk:?} split a sentence");
        }
    }

    #[test]
    fn chunks_respect_budget_when_sentences_fit() {
        let c = chunker();
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        let budget = 10;
        let longest = text
            .split(". ")
            .map(|s| c.count_tokens(s) + 1)
            .max()
            .unwrap();
        assert!(longest <= budget);
        for chunk in c.chunk(text, budget) {
            assert!(c.count_tokens(&chunk) <= budget);
        }
    }

    #[test]
    fn oversized_sentence_lands_whole_in_own_chunk() {
        let long = "word ".repeat(50).trim_end().to_string();
        let text = format!("Short start. {long}. Short end.");
        let chunks = chunker().chunk(&text, 10);
        assert!(chunks.iter().any(|c| c.contains("word word")));
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn prompt_reserve_shrinks_budget() {
        let text = "One two three four. Five six seven eight. Nine ten eleven twelve.";
        let plain = Chunker::new(0).unwrap().chunk(text, 20);
        let reserved = Chunker::new(14).unwrap().chunk(text, 20);
        assert!(reserved.len() >= plain.len());
    }

    #[test]
    fn deterministic() {
        let c = chunker();
        let text = "A first clause. A second clause. A third clause.";
        assert_eq!(c.chunk(text, 8), c.chunk(text, 8));
    }
}
