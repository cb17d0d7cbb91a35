//! Binarization of paired SMILES corpora into fixed-shape training arrays.
//!
//! Source and target corpora are tokenized (SMILES atoms or SELFIES symbols),
//! a vocabulary is built over every tokenized file, and each corpus pair is
//! encoded in parallel into `.npz` arrays. Graph-to-sequence models also get a
//! graph record per source molecule; samples whose graph cannot be built are
//! dropped from both outputs so the two stay index-aligned.

pub mod alignment;
pub mod artifact;
pub mod binarize;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod graph;
pub mod pool;
pub mod selfies;
pub mod smiles;
pub mod tokenization;
pub mod utils;
pub mod vocabulary;

#[cfg(feature = "python")]
mod python;

pub use alignment::{filter_aligned, Aligned};
pub use artifact::{read_graph_records, write_graph_records, SequenceArrays};
pub use binarize::{preprocess, preprocess_with, BinarizeSummary, PreprocessReport};
pub use config::{
    CorpusPair, ModelFamily, PreprocessConfig, Representation, ResolvedConfig, Split, SplitCorpora,
};
pub use encoding::{encode_tokens, EncodedSequence, SequencePair, WorkerContext};
pub use error::{PrepError, Result};
pub use graph::{Featurized, GraphFeaturizer, GraphRecord, MolGraphFeaturizer};
pub use pool::WorkerPool;
pub use selfies::{smiles_to_selfies, split_selfies};
pub use tokenization::{tokenize_corpora, tokenize_file, tokenized_path, Tokenizer};
pub use vocabulary::{ensure_vocab, make_vocab, TokenCounts, Vocabulary};
