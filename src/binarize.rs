//! End-to-end preprocessing: tokenize, build the vocabulary, binarize every split.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::alignment::filter_aligned;
use crate::artifact::{stage_graph_records, SequenceArrays};
use crate::config::{CorpusPair, ModelFamily, PreprocessConfig, Split, SplitCorpora};
use crate::encoding::{SequencePair, WorkerContext};
use crate::error::{PrepError, Result};
use crate::graph::{featurize_lines, GraphFeaturizer, MolGraphFeaturizer};
use crate::pool::WorkerPool;
use crate::tokenization::tokenize_corpora;
use crate::utils::read_lines;
use crate::vocabulary::{ensure_vocab, Vocabulary};

/// Result of binarizing one (split, pair index) step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinarizeSummary {
    pub split: Split,
    pub prefix: String,
    /// Rows written to the sequence artifact
    pub rows: usize,
    /// Input indices removed because their graph could not be built
    pub dropped: Vec<usize>,
    pub sequence_artifact: PathBuf,
    pub graph_artifact: Option<PathBuf>,
}

/// Everything a preprocessing run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessReport {
    pub vocab_file: PathBuf,
    pub vocab_size: usize,
    /// Corpora the vocabulary and the arrays were built from
    pub corpora: SplitCorpora,
    pub steps: Vec<BinarizeSummary>,
}

/// Sequence artifact path for a step prefix.
pub fn sequence_artifact_path(output_dir: &Path, prefix: &str) -> PathBuf {
    output_dir.join(format!("{}.npz", prefix))
}

/// Graph artifact path for a step prefix.
pub fn graph_artifact_path(output_dir: &Path, prefix: &str) -> PathBuf {
    output_dir.join(format!("{}.graphs.jsonl", prefix))
}

/// Run the whole pipeline with the default graph featurizer.
pub fn preprocess(config: &PreprocessConfig) -> Result<PreprocessReport> {
    preprocess_with(config, &MolGraphFeaturizer)
}

/// Run the whole pipeline, featurizing graphs with `featurizer` for graph models.
pub fn preprocess_with<F: GraphFeaturizer>(
    config: &PreprocessConfig,
    featurizer: &F,
) -> Result<PreprocessReport> {
    let resolved = config.validate()?;
    config.log();

    let output_dir = config.output_dir.as_path();
    fs::create_dir_all(output_dir).map_err(|e| PrepError::io(output_dir, e))?;
    let pool = WorkerPool::new(config.num_workers)?;

    let corpora = if config.do_tokenize {
        tokenize_corpora(
            &config.corpora,
            output_dir,
            resolved.representation_end,
            &pool,
        )?
    } else {
        config.corpora.clone()
    };

    let vocab_file = output_dir.join(format!("vocab_{}.txt", resolved.representation_end));
    let vocab = ensure_vocab(&corpora.files(), &vocab_file)?;
    let mut report = PreprocessReport {
        vocab_file,
        vocab_size: vocab.len(),
        corpora: corpora.clone(),
        steps: Vec::new(),
    };

    if config.make_vocab_only {
        log::info!("make_vocab_only set. Skipping featurization");
        return Ok(report);
    }

    let binarizer = Binarizer {
        vocab: Arc::new(vocab),
        output_dir,
        max_src_len: config.max_src_len,
        max_tgt_len: config.max_tgt_len,
        pool: &pool,
    };
    for ((split, i, pair), (_, _, raw)) in corpora.iter().zip(config.corpora.iter()) {
        let prefix = format!("{}_{}", split, i);
        let summary = match resolved.model {
            ModelFamily::SequenceOnly => binarizer.binarize_sequences(split, &prefix, pair)?,
            ModelFamily::GraphAugmented => {
                binarizer.binarize_with_graphs(split, &prefix, pair, &raw.src, featurizer)?
            }
        };
        report.steps.push(summary);
    }
    Ok(report)
}

/// Shared state of every binarization step in one run.
struct Binarizer<'a> {
    vocab: Arc<Vocabulary>,
    output_dir: &'a Path,
    max_src_len: usize,
    max_tgt_len: usize,
    pool: &'a WorkerPool,
}

impl Binarizer<'_> {
    /// Read a tokenized pair and encode every line in parallel, in line order.
    fn encode(&self, pair: &CorpusPair) -> Result<Vec<SequencePair>> {
        let src_lines = read_lines(&pair.src)?;
        let tgt_lines = read_lines(&pair.tgt)?;
        if src_lines.len() != tgt_lines.len() {
            return Err(PrepError::LineCountMismatch {
                src: pair.src.clone(),
                src_lines: src_lines.len(),
                tgt: pair.tgt.clone(),
                tgt_lines: tgt_lines.len(),
            });
        }

        log::info!("Getting seq features");
        let start = Instant::now();
        let ctx = WorkerContext {
            vocab: Arc::clone(&self.vocab),
            pair: pair.clone(),
            max_src_len: self.max_src_len,
            max_tgt_len: self.max_tgt_len,
        };
        let lines: Vec<(&str, &str)> = src_lines
            .iter()
            .map(String::as_str)
            .zip(tgt_lines.iter().map(String::as_str))
            .collect();
        let encoded = self
            .pool
            .try_map(&lines, |i, &(src, tgt)| ctx.encode_pair(i, src, tgt))?;
        log::info!(
            "Done seq featurization, time: {:.2?}. Collating",
            start.elapsed()
        );
        Ok(encoded)
    }

    fn binarize_sequences(&self, split: Split, prefix: &str, pair: &CorpusPair) -> Result<BinarizeSummary> {
        let output_file = sequence_artifact_path(self.output_dir, prefix);
        log::info!(
            "Binarizing (s2s) src {} and tgt {}, saving to {}",
            pair.src.display(),
            pair.tgt.display(),
            output_file.display()
        );

        let encoded = self.encode(pair)?;
        let arrays = SequenceArrays::collate(&encoded, self.max_src_len, self.max_tgt_len)?;
        arrays.write_npz(&output_file)?;
        log::info!("Saved {} rows to {}", arrays.num_rows(), output_file.display());

        Ok(BinarizeSummary {
            split,
            prefix: prefix.to_string(),
            rows: arrays.num_rows(),
            dropped: Vec::new(),
            sequence_artifact: output_file,
            graph_artifact: None,
        })
    }

    fn binarize_with_graphs<F: GraphFeaturizer>(
        &self,
        split: Split,
        prefix: &str,
        pair: &CorpusPair,
        raw_src: &Path,
        featurizer: &F,
    ) -> Result<BinarizeSummary> {
        let output_file = sequence_artifact_path(self.output_dir, prefix);
        let graph_output_file = graph_artifact_path(self.output_dir, prefix);
        log::info!(
            "Binarizing (g2s) src {} and tgt {}, saving to {}",
            pair.src.display(),
            pair.tgt.display(),
            output_file.display()
        );
        log::info!(
            "Binarizing (g2s) src {} graph features, saving to {}",
            raw_src.display(),
            graph_output_file.display()
        );

        let encoded = self.encode(pair)?;

        let smiles = read_lines(raw_src)?;
        if smiles.len() != encoded.len() {
            return Err(PrepError::SourceLineMismatch {
                raw: raw_src.to_path_buf(),
                raw_lines: smiles.len(),
                tokenized: pair.src.clone(),
                tokenized_lines: encoded.len(),
            });
        }

        log::info!("Getting graph features");
        let start = Instant::now();
        let graphs = featurize_lines(featurizer, &smiles, self.pool);
        let aligned = filter_aligned(graphs, encoded)?;
        if !aligned.dropped.is_empty() {
            log::warn!(
                "Dropped {} of {} samples without graph features",
                aligned.dropped.len(),
                smiles.len()
            );
        }
        log::info!(
            "Done graph featurization, time: {:.2?}. Size: {} Collating and saving...",
            start.elapsed(),
            aligned.graphs.len()
        );

        let arrays =
            SequenceArrays::collate(&aligned.sequences, self.max_src_len, self.max_tgt_len)?;
        // Neither artifact is renamed into place until both are fully written.
        log::info!("Starting to save sequences features.");
        let staged_sequences = arrays.stage_npz(&output_file)?;
        log::info!("Starting to save graphs features.");
        let staged_graphs = stage_graph_records(&graph_output_file, &aligned.graphs)?;
        staged_graphs.commit()?;
        staged_sequences.commit()?;

        Ok(BinarizeSummary {
            split,
            prefix: prefix.to_string(),
            rows: arrays.num_rows(),
            dropped: aligned.dropped,
            sequence_artifact: output_file,
            graph_artifact: Some(graph_output_file),
        })
    }
}
