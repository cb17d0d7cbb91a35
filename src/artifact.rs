//! Serialized outputs of a binarization step.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use ndarray::{Array1, Array2};
use ndarray_npy::{NpzWriter, WriteNpzError};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::encoding::{EncodedSequence, SequencePair};
use crate::error::{PrepError, Result};
use crate::utils::{write_staged, StagedFile};

/// The four row-aligned arrays of a sequence artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceArrays {
    pub src_token_ids: Array2<i32>,
    pub src_lens: Array1<i32>,
    pub tgt_token_ids: Array2<i32>,
    pub tgt_lens: Array1<i32>,
}

fn stack(rows: &[&EncodedSequence], width: usize) -> Result<(Array2<i32>, Array1<i32>)> {
    let mut ids = Vec::with_capacity(rows.len() * width);
    let mut lens = Vec::with_capacity(rows.len());
    for row in rows {
        ids.extend(row.ids.iter().map(|&id| id as i32));
        lens.push(row.len as i32);
    }
    let ids = Array2::from_shape_vec((rows.len(), width), ids)?;
    Ok((ids, Array1::from(lens)))
}

impl SequenceArrays {
    /// Stack encoded pairs row by row; every row must already have the given widths.
    pub fn collate(pairs: &[SequencePair], max_src_len: usize, max_tgt_len: usize) -> Result<Self> {
        let src: Vec<&EncodedSequence> = pairs.iter().map(|p| &p.src).collect();
        let tgt: Vec<&EncodedSequence> = pairs.iter().map(|p| &p.tgt).collect();
        let (src_token_ids, src_lens) = stack(&src, max_src_len)?;
        let (tgt_token_ids, tgt_lens) = stack(&tgt, max_tgt_len)?;
        Ok(Self {
            src_token_ids,
            src_lens,
            tgt_token_ids,
            tgt_lens,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.src_lens.len()
    }

    /// Write all four arrays into one `.npz` archive.
    pub fn write_npz(&self, path: &Path) -> Result<()> {
        self.stage_npz(path)?.commit()
    }

    /// Write the archive next to `path`; it appears at `path` once committed.
    pub(crate) fn stage_npz(&self, path: &Path) -> Result<StagedFile> {
        let npz_error = |err: WriteNpzError| PrepError::Npz {
            path: path.to_path_buf(),
            err,
        };
        write_staged(path, |w| {
            let mut npz = NpzWriter::new(w);
            npz.add_array("src_token_ids", &self.src_token_ids)
                .map_err(npz_error)?;
            npz.add_array("src_lens", &self.src_lens).map_err(npz_error)?;
            npz.add_array("tgt_token_ids", &self.tgt_token_ids)
                .map_err(npz_error)?;
            npz.add_array("tgt_lens", &self.tgt_lens).map_err(npz_error)?;
            npz.finish().map_err(npz_error)?;
            Ok(())
        })
    }
}

/// Write graph records as JSON lines, one record per line.
pub fn write_graph_records<R: Serialize>(path: &Path, records: &[R]) -> Result<()> {
    stage_graph_records(path, records)?.commit()
}

pub(crate) fn stage_graph_records<R: Serialize>(path: &Path, records: &[R]) -> Result<StagedFile> {
    write_staged(path, |w| {
        for record in records {
            serde_json::to_writer(&mut *w, record)?;
            w.write_all(b"\n").map_err(|e| PrepError::io(path, e))?;
        }
        Ok(())
    })
}

/// Read back a JSON-lines graph artifact.
pub fn read_graph_records<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>> {
    let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| PrepError::io(path, e))?;
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
