//! Error types for the preprocessing pipeline.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for the preprocessing pipeline.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Input representation other than SMILES requested for tokenization
    #[error("{0} input provided. Only smiles inputs are supported!")]
    UnsupportedInput(String),

    /// Output representation that no tokenizer exists for
    #[error("{0} output required. Only smiles and selfies outputs are supported!")]
    UnsupportedOutput(String),

    /// Model family other than `s2s` or `g2s*`
    #[error("Model {0} not supported!")]
    UnsupportedModel(String),

    /// Representations differ but tokenization is disabled
    #[error("Different representations, start: {start}, end: {end}. Please set 'do_tokenize'")]
    RepresentationMismatch { start: String, end: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Source and target corpora are not line-aligned
    #[error("Line count mismatch: {src} has {src_lines} lines but {tgt} has {tgt_lines}")]
    LineCountMismatch {
        src: PathBuf,
        src_lines: usize,
        tgt: PathBuf,
        tgt_lines: usize,
    },

    /// Raw source used for graphs and its tokenized copy are not line-aligned
    #[error(
        "Graph source {raw} has {raw_lines} lines but tokenized source {tokenized} has {tokenized_lines}"
    )]
    SourceLineMismatch {
        raw: PathBuf,
        raw_lines: usize,
        tokenized: PathBuf,
        tokenized_lines: usize,
    },

    /// Token missing from the vocabulary
    #[error("Unknown token: {0}")]
    UnknownToken(String),

    /// Vocabulary file lacks a reserved symbol
    #[error("Invalid vocabulary {path}: missing reserved token {token}")]
    InvalidVocabulary { path: PathBuf, token: &'static str },

    /// Regex tokens do not reassemble the input line
    #[error("Tokenization mismatch. smi: {smiles}, tokens: {joined}")]
    TokenizationMismatch { smiles: String, joined: String },

    /// Malformed SMILES
    #[error("Invalid SMILES '{smiles}' at position {position}: {reason}")]
    Smiles {
        smiles: String,
        position: usize,
        reason: String,
    },

    /// No alternating single/double bond assignment for an aromatic system
    #[error("Failed to kekulize '{0}'")]
    Kekulization(String),

    /// SELFIES index overflow
    #[error("Cannot encode '{smiles}' as SELFIES: {reason}")]
    Selfies { smiles: String, reason: String },

    /// Graph and sequence collections of different lengths
    #[error("Cannot align {graphs} graph records with {sequences} sequence records")]
    AlignmentLength { graphs: usize, sequences: usize },

    /// Error attributed to one line of one file (`line` is 0-based)
    #[error("{path}, line {line}: {source}")]
    AtLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<PrepError>,
    },

    /// I/O error with file context
    #[error("I/O error for {path}: {err}")]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Array assembly error
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Npz archive error
    #[error("Failed to write npz {path}: {err}")]
    Npz {
        path: PathBuf,
        #[source]
        err: ndarray_npy::WriteNpzError,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be started
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PrepError {
    pub(crate) fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            err,
        }
    }

    pub(crate) fn at_line(self, path: impl AsRef<Path>, line: usize) -> Self {
        Self::AtLine {
            path: path.as_ref().to_path_buf(),
            line,
            source: Box::new(self),
        }
    }

    /// True for errors raised while validating configuration, before any work.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedInput(_)
                | Self::UnsupportedOutput(_)
                | Self::UnsupportedModel(_)
                | Self::RepresentationMismatch { .. }
                | Self::InvalidConfig(_)
        )
    }
}

/// Result type alias for preprocessing operations.
pub type Result<T> = std::result::Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_line_message() {
        let err = PrepError::UnknownToken("Xe".to_string()).at_line("data/src.txt", 7);
        let msg = err.to_string();
        assert!(msg.contains("data/src.txt"));
        assert!(msg.contains("line 7"));
        assert!(msg.contains("Unknown token: Xe"));
    }

    #[test]
    fn test_is_config_error() {
        assert!(PrepError::UnsupportedModel("rnn".into()).is_config_error());
        assert!(!PrepError::UnknownToken("C".into()).is_config_error());
    }
}
