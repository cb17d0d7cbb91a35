//! Preprocessing configuration and its validation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Molecular string representation of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Smiles,
    Selfies,
}

impl Representation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Smiles => "smiles",
            Representation::Selfies => "selfies",
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Representation {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "smiles" => Ok(Representation::Smiles),
            "selfies" => Ok(Representation::Selfies),
            other => Err(PrepError::UnsupportedOutput(other.to_string())),
        }
    }
}

/// Model family the artifacts are produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    /// `s2s`: sequence arrays only
    SequenceOnly,
    /// `g2s*`: sequence arrays plus index-aligned graph records
    GraphAugmented,
}

impl FromStr for ModelFamily {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "s2s" {
            Ok(ModelFamily::SequenceOnly)
        } else if s.starts_with("g2s") {
            Ok(ModelFamily::GraphAugmented)
        } else {
            Err(PrepError::UnsupportedModel(s.to_string()))
        }
    }
}

/// Data split a corpus pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two line-aligned files: line `i` of `src` corresponds to line `i` of `tgt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusPair {
    pub src: PathBuf,
    pub tgt: PathBuf,
}

impl CorpusPair {
    pub fn new(src: impl Into<PathBuf>, tgt: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            tgt: tgt.into(),
        }
    }
}

/// Corpus pairs for every split, in `train`, `val`, `test` order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCorpora {
    #[serde(default)]
    pub train: Vec<CorpusPair>,
    #[serde(default)]
    pub val: Vec<CorpusPair>,
    #[serde(default)]
    pub test: Vec<CorpusPair>,
}

impl SplitCorpora {
    pub fn get(&self, split: Split) -> &[CorpusPair] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    pub fn get_mut(&mut self, split: Split) -> &mut Vec<CorpusPair> {
        match split {
            Split::Train => &mut self.train,
            Split::Val => &mut self.val,
            Split::Test => &mut self.test,
        }
    }

    /// Iterate `(split, pair index, pair)` in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (Split, usize, &CorpusPair)> + '_ {
        Split::ALL.into_iter().flat_map(move |split| {
            self.get(split)
                .iter()
                .enumerate()
                .map(move |(i, pair)| (split, i, pair))
        })
    }

    /// Every file in vocabulary scan order: per pair, source then target.
    pub fn files(&self) -> Vec<&Path> {
        self.iter()
            .flat_map(|(_, _, pair)| [pair.src.as_path(), pair.tgt.as_path()])
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.val.is_empty() && self.test.is_empty()
    }
}

fn default_max_len() -> usize {
    1024
}

fn default_model() -> String {
    "g2s_series_rel".to_string()
}

fn default_repr() -> String {
    "smiles".to_string()
}

fn default_num_workers() -> usize {
    1
}

/// Full configuration surface of a preprocessing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub output_dir: PathBuf,
    pub corpora: SplitCorpora,
    #[serde(default = "default_repr")]
    pub representation_start: String,
    #[serde(default = "default_repr")]
    pub representation_end: String,
    #[serde(default)]
    pub do_tokenize: bool,
    #[serde(default = "default_max_len")]
    pub max_src_len: usize,
    #[serde(default = "default_max_len")]
    pub max_tgt_len: usize,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default)]
    pub make_vocab_only: bool,
}

/// Configuration after every check has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub representation_end: Representation,
    pub model: ModelFamily,
}

impl PreprocessConfig {
    pub fn new(output_dir: impl Into<PathBuf>, corpora: SplitCorpora) -> Self {
        Self {
            output_dir: output_dir.into(),
            corpora,
            representation_start: default_repr(),
            representation_end: default_repr(),
            do_tokenize: false,
            max_src_len: default_max_len(),
            max_tgt_len: default_max_len(),
            model: default_model(),
            num_workers: default_num_workers(),
            make_vocab_only: false,
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Run every configuration check; nothing on disk is touched.
    pub fn validate(&self) -> Result<ResolvedConfig> {
        if self.representation_start != self.representation_end && !self.do_tokenize {
            return Err(PrepError::RepresentationMismatch {
                start: self.representation_start.clone(),
                end: self.representation_end.clone(),
            });
        }
        if self.do_tokenize && self.representation_start != Representation::Smiles.as_str() {
            return Err(PrepError::UnsupportedInput(
                self.representation_start.clone(),
            ));
        }
        let representation_end: Representation = self.representation_end.parse()?;
        let model: ModelFamily = self.model.parse()?;

        if self.max_src_len == 0 || self.max_tgt_len == 0 {
            return Err(PrepError::InvalidConfig(format!(
                "max lengths must be positive (src: {}, tgt: {})",
                self.max_src_len, self.max_tgt_len
            )));
        }
        if self.num_workers == 0 {
            return Err(PrepError::InvalidConfig(
                "num_workers must be greater than zero".to_string(),
            ));
        }
        if self.corpora.is_empty() {
            return Err(PrepError::InvalidConfig(
                "no corpus pairs given for any split".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            representation_end,
            model,
        })
    }

    /// Log every configuration value once.
    pub fn log(&self) {
        log::info!("Preprocessing configuration:");
        log::info!("  output_dir: {}", self.output_dir.display());
        for (split, i, pair) in self.corpora.iter() {
            log::info!(
                "  {}[{}]: src={} tgt={}",
                split,
                i,
                pair.src.display(),
                pair.tgt.display()
            );
        }
        log::info!(
            "  representation: {} -> {} (do_tokenize: {})",
            self.representation_start,
            self.representation_end,
            self.do_tokenize
        );
        log::info!(
            "  max_src_len: {}, max_tgt_len: {}",
            self.max_src_len,
            self.max_tgt_len
        );
        log::info!(
            "  model: {}, num_workers: {}, make_vocab_only: {}",
            self.model,
            self.num_workers,
            self.make_vocab_only
        );
    }
}
