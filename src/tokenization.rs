//! Line tokenization into the output representation.

use std::io::Write;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use fancy_regex::Regex;

use crate::config::{CorpusPair, Representation, SplitCorpora};
use crate::constants::SMILES_ATOM_PATTERN;
use crate::error::{PrepError, Result};
use crate::pool::WorkerPool;
use crate::selfies::{smiles_to_selfies, split_selfies};
use crate::utils::{atomwise_tokenize, base_name, read_lines, strip_whitespace, write_atomically};

/// Rewrites a SMILES line into the tokens of one representation.
#[derive(Debug, Clone)]
pub enum Tokenizer {
    Smiles { pattern: Regex },
    Selfies,
}

impl Tokenizer {
    pub fn new(representation: Representation) -> Self {
        match representation {
            Representation::Smiles => Tokenizer::Smiles {
                pattern: Regex::new(SMILES_ATOM_PATTERN).expect("Invalid SMILES pattern"),
            },
            Representation::Selfies => Tokenizer::Selfies,
        }
    }

    /// Tokenize one line after removing all whitespace.
    pub fn tokenize_line(&self, line: &str) -> Result<Vec<CompactString>> {
        let smiles = strip_whitespace(line);
        match self {
            Tokenizer::Smiles { pattern } => {
                let tokens = atomwise_tokenize(&smiles, pattern);
                let joined: String = tokens.iter().map(|t| t.as_str()).collect();
                if joined != smiles {
                    return Err(PrepError::TokenizationMismatch { smiles, joined });
                }
                Ok(tokens)
            }
            Tokenizer::Selfies => {
                let selfies = smiles_to_selfies(&smiles)?;
                Ok(split_selfies(&selfies)
                    .into_iter()
                    .map(CompactString::from)
                    .collect())
            }
        }
    }

    /// Tokenize one line into a space-joined token stream.
    pub fn tokenize_to_string(&self, line: &str) -> Result<String> {
        Ok(self.tokenize_line(line)?.join(" "))
    }
}

/// Output path of the tokenized copy of `input`.
pub fn tokenized_path(output_dir: &Path, representation: Representation, input: &Path) -> PathBuf {
    output_dir.join(format!("{}_tokenized_{}", representation, base_name(input)))
}

/// Tokenize `input` line by line into `output`, unless `output` already exists.
///
/// Returns the number of lines written, or `None` when the file was skipped.
pub fn tokenize_file(
    tokenizer: &Tokenizer,
    input: &Path,
    output: &Path,
    pool: &WorkerPool,
) -> Result<Option<usize>> {
    if output.exists() {
        log::info!("Found {}, skipping tokenization.", output.display());
        return Ok(None);
    }

    log::info!("Tokenizing {} into {}", input.display(), output.display());
    let lines = read_lines(input)?;
    let tokenized = pool.try_map(&lines, |i, line| {
        tokenizer
            .tokenize_to_string(line)
            .map_err(|e| e.at_line(input, i))
    })?;

    write_atomically(output, |w| {
        for line in &tokenized {
            writeln!(w, "{}", line).map_err(|e| PrepError::io(output, e))?;
        }
        Ok(())
    })?;
    log::info!("Done, total lines: {}", tokenized.len());
    Ok(Some(tokenized.len()))
}

/// Tokenize every corpus file and return the corpora pointing at the tokenized copies.
pub fn tokenize_corpora(
    corpora: &SplitCorpora,
    output_dir: &Path,
    representation: Representation,
    pool: &WorkerPool,
) -> Result<SplitCorpora> {
    let tokenizer = Tokenizer::new(representation);
    let mut tokenized = SplitCorpora::default();
    for (split, _, pair) in corpora.iter() {
        let src = tokenized_path(output_dir, representation, &pair.src);
        let tgt = tokenized_path(output_dir, representation, &pair.tgt);
        tokenize_file(&tokenizer, &pair.src, &src, pool)?;
        tokenize_file(&tokenizer, &pair.tgt, &tgt, pool)?;
        tokenized.get_mut(split).push(CorpusPair::new(src, tgt));
    }
    Ok(tokenized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_smiles_tokenize_line() {
        let tok = Tokenizer::new(Representation::Smiles);
        assert_eq!(
            tok.tokenize_to_string(" CC(=O)O ").unwrap(),
            "C C ( = O ) O"
        );
        assert_eq!(
            tok.tokenize_to_string("c1ccccc1Br").unwrap(),
            "c 1 c c c c c 1 Br"
        );
        assert_eq!(tok.tokenize_to_string("").unwrap(), "");
    }

    #[test]
    fn test_smiles_tokenize_mismatch() {
        let tok = Tokenizer::new(Representation::Smiles);
        assert!(matches!(
            tok.tokenize_line("CC&O"),
            Err(PrepError::TokenizationMismatch { .. })
        ));
    }

    #[test]
    fn test_already_tokenized_line_is_normalized() {
        let tok = Tokenizer::new(Representation::Smiles);
        assert_eq!(tok.tokenize_to_string("C C O").unwrap(), "C C O");
    }

    #[test]
    fn test_selfies_tokenize_line() {
        let tok = Tokenizer::new(Representation::Selfies);
        assert_eq!(
            tok.tokenize_to_string("CC(=O)O").unwrap(),
            "[C] [C] [=Branch1] [C] [=O] [O]"
        );
        assert_eq!(tok.tokenize_to_string("[Na+].[Cl-]").unwrap(), "[Na+1] . [Cl-1]");
    }

    #[test]
    fn test_tokenized_path() {
        let path = tokenized_path(
            Path::new("out"),
            Representation::Selfies,
            Path::new("data/train_src.txt"),
        );
        assert_eq!(path, PathBuf::from("out/selfies_tokenized_train_src.txt"));
    }

    #[test]
    fn test_tokenize_file_and_skip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("src.txt");
        let output = dir.path().join("smiles_tokenized_src.txt");
        fs::write(&input, "CCO\n\nC=O\n").unwrap();
        let pool = WorkerPool::new(2).unwrap();
        let tok = Tokenizer::new(Representation::Smiles);

        assert_eq!(tokenize_file(&tok, &input, &output, &pool).unwrap(), Some(3));
        assert_eq!(fs::read_to_string(&output).unwrap(), "C C O\n\nC = O\n");

        fs::write(&input, "N\n").unwrap();
        assert_eq!(tokenize_file(&tok, &input, &output, &pool).unwrap(), None);
        assert_eq!(fs::read_to_string(&output).unwrap(), "C C O\n\nC = O\n");
    }

    #[test]
    fn test_tokenize_file_error_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("src.txt");
        let output = dir.path().join("selfies_tokenized_src.txt");
        fs::write(&input, "CCO\nc1cccc1\n").unwrap();
        let pool = WorkerPool::new(2).unwrap();
        let tok = Tokenizer::new(Representation::Selfies);

        let err = tokenize_file(&tok, &input, &output, &pool).unwrap_err();
        assert!(matches!(err, PrepError::AtLine { line: 1, .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_selfies_tokenize_long_molecules() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("src.txt");
        let output = dir.path().join("selfies_tokenized_src.txt");
        let chain = "C".repeat(20_000);
        let polyphenylene = "c1ccc(cc1)".repeat(3000);
        fs::write(&input, format!("{}\n{}\n", chain, polyphenylene)).unwrap();
        let pool = WorkerPool::new(2).unwrap();
        let tok = Tokenizer::new(Representation::Selfies);

        assert_eq!(tokenize_file(&tok, &input, &output, &pool).unwrap(), Some(2));
        let written = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let chain_tokens: Vec<&str> = lines[0].split(' ').collect();
        assert_eq!(chain_tokens.len(), 20_000);
        assert!(chain_tokens.iter().all(|t| *t == "[C]"));
        assert!(lines[1].starts_with("[C]"));
        assert!(lines[1].contains("Branch"));
    }
}
