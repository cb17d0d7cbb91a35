//! Vocabulary construction, saving and loading.
//!
//! File format: the reserved symbols `_PAD`, `_UNK`, `_SOS`, `_EOS` on the
//! first four lines, then one `token\tcount` line per observed token in
//! first-seen order. A token's id is its line index.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use ahash::AHashMap;
use compact_str::CompactString;

use crate::constants::{EOS_TOKEN, PAD_TOKEN, RESERVED_TOKENS};
use crate::error::{PrepError, Result};
use crate::utils::write_atomically;

/// Immutable symbol table shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: AHashMap<CompactString, u32>,
    id_to_token: Vec<CompactString>,
    pad_id: u32,
    eos_id: u32,
}

impl Vocabulary {
    /// Build a vocabulary where each token's id is its position.
    ///
    /// A repeated token keeps its last position. Returns `None` when the
    /// padding or end-of-sequence symbol is missing.
    pub fn from_tokens<I, S>(tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id_to_token: Vec<CompactString> = tokens
            .into_iter()
            .map(|t| CompactString::from(t.as_ref()))
            .collect();
        let mut token_to_id = AHashMap::with_capacity(id_to_token.len());
        for (id, token) in id_to_token.iter().enumerate() {
            token_to_id.insert(token.clone(), id as u32);
        }
        let pad_id = *token_to_id.get(PAD_TOKEN)?;
        let eos_id = *token_to_id.get(EOS_TOKEN)?;
        Some(Self {
            token_to_id,
            id_to_token,
            pad_id,
            eos_id,
        })
    }

    /// Load a vocabulary file; the token is the first tab-separated field of each line.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        let mut tokens = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| PrepError::io(path, e))?;
            let token = line.trim().split('\t').next().unwrap_or_default();
            tokens.push(token.to_string());
        }

        let vocab = Self::from_tokens(&tokens).ok_or_else(|| PrepError::InvalidVocabulary {
            path: path.to_path_buf(),
            token: if tokens.iter().any(|t| t == PAD_TOKEN) {
                EOS_TOKEN
            } else {
                PAD_TOKEN
            },
        })?;
        log::info!("Loaded vocabulary {} with {} tokens", path.display(), vocab.len());
        Ok(vocab)
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(|t| t.as_str())
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }
}

/// Token frequencies in first-seen order.
#[derive(Debug, Default)]
pub struct TokenCounts {
    index: AHashMap<CompactString, usize>,
    counts: Vec<(CompactString, u64)>,
}

impl TokenCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, token: &str) {
        if RESERVED_TOKENS.contains(&token) {
            return;
        }
        match self.index.get(token) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                let token = CompactString::from(token);
                self.index.insert(token.clone(), self.counts.len());
                self.counts.push((token, 1));
            }
        }
    }

    /// Count every whitespace-separated token of a tokenized corpus.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| PrepError::io(path, e))?;
            for token in line.split_whitespace() {
                self.add(token);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(t, c)| (t.as_str(), *c))
    }

    /// Write the vocabulary file: reserved symbols, then `token\tcount` lines.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, |w| {
            for token in RESERVED_TOKENS {
                writeln!(w, "{}", token).map_err(|e| PrepError::io(path, e))?;
            }
            for (token, count) in self.iter() {
                writeln!(w, "{}\t{}", token, count).map_err(|e| PrepError::io(path, e))?;
            }
            Ok(())
        })
    }
}

/// Scan tokenized corpora and write a vocabulary file.
pub fn make_vocab(files: &[&Path], vocab_file: &Path) -> Result<()> {
    let mut counts = TokenCounts::new();
    for file in files {
        log::info!("Counting tokens in {}", file.display());
        counts.add_file(file)?;
    }
    counts.save(vocab_file)?;
    log::info!(
        "Saved vocabulary with {} observed tokens to {}",
        counts.len(),
        vocab_file.display()
    );
    Ok(())
}

/// Build the vocabulary file unless it already exists, then load it.
pub fn ensure_vocab(files: &[&Path], vocab_file: &Path) -> Result<Vocabulary> {
    if vocab_file.exists() {
        log::info!("Found {}, skipping vocabulary construction.", vocab_file.display());
    } else {
        make_vocab(files, vocab_file)?;
    }
    Vocabulary::load(vocab_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_from_tokens() {
        let vocab = Vocabulary::from_tokens(["C", "O", "_EOS", "_PAD"]).unwrap();
        assert_eq!(vocab.id("C"), Some(0));
        assert_eq!(vocab.id("O"), Some(1));
        assert_eq!(vocab.eos_id(), 2);
        assert_eq!(vocab.pad_id(), 3);
        assert_eq!(vocab.token(1), Some("O"));
        assert_eq!(vocab.id("N"), None);
    }

    #[test]
    fn test_from_tokens_requires_reserved() {
        assert!(Vocabulary::from_tokens(["C", "O", "_PAD"]).is_none());
    }

    #[test]
    fn test_token_counts_first_seen_order() {
        let mut counts = TokenCounts::new();
        for token in ["O", "C", "C", "N", "O", "C", "_PAD"] {
            counts.add(token);
        }
        let seen: Vec<(&str, u64)> = counts.iter().collect();
        assert_eq!(seen, vec![("O", 2), ("C", 3), ("N", 1)]);
    }

    #[test]
    fn test_make_and_load_vocab() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let tgt = dir.path().join("tgt.txt");
        fs::write(&src, "C C O\nC N\n").unwrap();
        fs::write(&tgt, "O = C\n").unwrap();
        let vocab_file = dir.path().join("vocab_smiles.txt");

        make_vocab(&[src.as_path(), tgt.as_path()], &vocab_file).unwrap();
        let text = fs::read_to_string(&vocab_file).unwrap();
        assert_eq!(text, "_PAD\n_UNK\n_SOS\n_EOS\nC\t4\nO\t2\nN\t1\n=\t1\n");

        let vocab = Vocabulary::load(&vocab_file).unwrap();
        assert_eq!(vocab.len(), 8);
        assert_eq!(vocab.pad_id(), 0);
        assert_eq!(vocab.eos_id(), 3);
        assert_eq!(vocab.id("C"), Some(4));
        assert_eq!(vocab.id("="), Some(7));
    }

    #[test]
    fn test_ensure_vocab_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, "C O\n").unwrap();
        let vocab_file = dir.path().join("vocab_smiles.txt");

        ensure_vocab(&[src.as_path()], &vocab_file).unwrap();
        let first = fs::read(&vocab_file).unwrap();

        // A changed corpus must not affect an existing vocabulary file.
        fs::write(&src, "N N\n").unwrap();
        let vocab = ensure_vocab(&[src.as_path()], &vocab_file).unwrap();
        assert_eq!(fs::read(&vocab_file).unwrap(), first);
        assert_eq!(vocab.id("N"), None);
    }

    #[test]
    fn test_load_rejects_missing_reserved() {
        let dir = tempfile::tempdir().unwrap();
        let vocab_file = dir.path().join("vocab.txt");
        fs::write(&vocab_file, "_PAD\nC\t3\n").unwrap();
        assert!(matches!(
            Vocabulary::load(&vocab_file),
            Err(PrepError::InvalidVocabulary { token: "_EOS", .. })
        ));
    }
}
