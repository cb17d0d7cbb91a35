//! Fixed-length encoding of token streams.

use std::sync::Arc;

use crate::config::CorpusPair;
use crate::constants::{EMPTY_SOURCE_PLACEHOLDER, PROGRESS_INTERVAL};
use crate::error::{PrepError, Result};
use crate::vocabulary::Vocabulary;

/// Token ids padded to a fixed length, plus the true length.
///
/// `len` counts the real tokens and the end marker, never padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence {
    pub ids: Vec<u32>,
    pub len: usize,
}

/// Encode a token stream into exactly `max_len` ids.
///
/// Every token is looked up first; a token missing from the vocabulary is an
/// error even if it would have been truncated away. The id list is cut to
/// `max_len - 1` entries, the end marker appended, and the rest right-padded.
pub fn encode_tokens<S: AsRef<str>>(
    tokens: &[S],
    vocab: &Vocabulary,
    max_len: usize,
) -> Result<EncodedSequence> {
    let mut ids = tokens
        .iter()
        .map(|t| {
            let t = t.as_ref();
            vocab.id(t).ok_or_else(|| PrepError::UnknownToken(t.to_string()))
        })
        .collect::<Result<Vec<u32>>>()?;

    ids.truncate(max_len.saturating_sub(1));
    ids.push(vocab.eos_id());
    let len = ids.len();
    ids.resize(max_len.max(len), vocab.pad_id());

    Ok(EncodedSequence { ids, len })
}

/// Encoded source and target of one corpus line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePair {
    pub src: EncodedSequence,
    pub tgt: EncodedSequence,
}

/// Everything an encoding task needs, built once per step and shared by
/// reference with every worker.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub vocab: Arc<Vocabulary>,
    pub pair: CorpusPair,
    pub max_src_len: usize,
    pub max_tgt_len: usize,
}

impl WorkerContext {
    /// Encode line `index` of a tokenized corpus pair.
    ///
    /// A source line without tokens is replaced by a two-atom placeholder.
    pub fn encode_pair(&self, index: usize, src_line: &str, tgt_line: &str) -> Result<SequencePair> {
        let mut src_tokens: Vec<&str> = src_line.split_whitespace().collect();
        if src_tokens.is_empty() {
            src_tokens.extend(EMPTY_SOURCE_PLACEHOLDER);
        }
        let tgt_tokens: Vec<&str> = tgt_line.split_whitespace().collect();

        let src = encode_tokens(&src_tokens, &self.vocab, self.max_src_len)
            .map_err(|e| e.at_line(&self.pair.src, index))?;
        let tgt = encode_tokens(&tgt_tokens, &self.vocab, self.max_tgt_len)
            .map_err(|e| e.at_line(&self.pair.tgt, index))?;

        if index > 0 && index % PROGRESS_INTERVAL == 0 {
            log::info!("Encoded {} lines", index);
        }
        Ok(SequencePair { src, tgt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::from_tokens(["C", "O", "_EOS", "_PAD"]).unwrap()
    }

    fn context(max_src_len: usize, max_tgt_len: usize) -> WorkerContext {
        WorkerContext {
            vocab: Arc::new(vocab()),
            pair: CorpusPair::new("src.txt", "tgt.txt"),
            max_src_len,
            max_tgt_len,
        }
    }

    #[test]
    fn test_encode_pads_short_stream() {
        let enc = encode_tokens(&["C", "C", "O"], &vocab(), 6).unwrap();
        assert_eq!(enc.ids, vec![0, 0, 1, 2, 3, 3]);
        assert_eq!(enc.len, 4);
    }

    #[test]
    fn test_encode_truncates_long_stream() {
        let tokens = ["C"; 10];
        for max_len in 1..=10 {
            let enc = encode_tokens(&tokens, &vocab(), max_len).unwrap();
            assert_eq!(enc.ids.len(), max_len);
            assert_eq!(enc.len, max_len);
            assert_eq!(*enc.ids.last().unwrap(), 2);
            assert!(enc.ids[..max_len - 1].iter().all(|&id| id == 0));
        }
    }

    #[test]
    fn test_encode_exact_fit() {
        let enc = encode_tokens(&["C", "O"], &vocab(), 3).unwrap();
        assert_eq!(enc.ids, vec![0, 1, 2]);
        assert_eq!(enc.len, 3);
    }

    #[test]
    fn test_encode_empty_stream() {
        let enc = encode_tokens::<&str>(&[], &vocab(), 4).unwrap();
        assert_eq!(enc.ids, vec![2, 3, 3, 3]);
        assert_eq!(enc.len, 1);
    }

    #[test]
    fn test_encode_unknown_token_fails() {
        let err = encode_tokens(&["C", "N"], &vocab(), 8).unwrap_err();
        assert!(matches!(err, PrepError::UnknownToken(t) if t == "N"));
    }

    #[test]
    fn test_unknown_token_beyond_truncation_still_fails() {
        let err = encode_tokens(&["C", "C", "C", "N"], &vocab(), 2).unwrap_err();
        assert!(matches!(err, PrepError::UnknownToken(_)));
    }

    #[test]
    fn test_empty_source_uses_placeholder() {
        let ctx = context(5, 5);
        let lines = ["C C", "", "C C O"];
        let rows: Vec<SequencePair> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| ctx.encode_pair(i, line, "O").unwrap())
            .collect();
        assert_eq!(rows[1].src.ids, vec![0, 0, 2, 3, 3]);
        assert_eq!(rows[1].src.len, 3);
        assert_eq!(rows[2].src.ids, vec![0, 0, 1, 2, 3]);
        assert_eq!(rows[2].src.len, 4);
    }

    #[test]
    fn test_empty_target_is_not_replaced() {
        let ctx = context(4, 4);
        let pair = ctx.encode_pair(0, "C", "").unwrap();
        assert_eq!(pair.tgt.ids, vec![2, 3, 3, 3]);
        assert_eq!(pair.tgt.len, 1);
    }

    #[test]
    fn test_encode_pair_reports_file_and_line() {
        let ctx = context(8, 8);
        let err = ctx.encode_pair(3, "C", "C N").unwrap_err();
        match err {
            PrepError::AtLine { path, line, source } => {
                assert_eq!(path, std::path::PathBuf::from("tgt.txt"));
                assert_eq!(line, 3);
                assert!(matches!(*source, PrepError::UnknownToken(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
