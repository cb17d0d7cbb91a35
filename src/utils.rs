//! File and string helpers shared by the pipeline stages.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use fancy_regex::Regex;

use crate::error::{PrepError, Result};

/// Tokenize a SMILES string into atom-level tokens.
///
/// Splits a SMILES string into its constituent atoms and tokens using a regex pattern.
/// Handles multi-character atoms (Br, Cl), bracket atoms ([C@@H], [N+]), ring closures,
/// bonds, and stereochemistry markers.
pub(crate) fn atomwise_tokenize(smiles: &str, pattern: &Regex) -> Vec<CompactString> {
    let mut tokens = Vec::new();
    for m in pattern.find_iter(smiles).flatten() {
        tokens.push(CompactString::from(m.as_str()));
    }
    tokens
}

/// Remove every whitespace character from a line.
pub fn strip_whitespace(line: &str) -> String {
    line.split_whitespace().collect()
}

/// Read a whole text file into memory, one entry per line.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
    Ok(text.lines().map(str::to_owned).collect())
}

/// Write a file through a temporary sibling and rename it into place.
///
/// Downstream steps treat the existence of `path` as a completion marker, so a
/// failed write must never leave `path` behind.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    write_staged(path, write)?.commit()
}

/// A fully written temporary file waiting to be renamed onto its target.
///
/// Dropping it without [`StagedFile::commit`] removes the temporary file.
#[derive(Debug)]
#[must_use]
pub(crate) struct StagedFile {
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub(crate) fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp, &self.target).map_err(|e| PrepError::io(&self.target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Write the temporary sibling of `path` without touching `path` itself.
pub(crate) fn write_staged<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp = tmp_path(path);
    let file = File::create(&tmp).map_err(|e| PrepError::io(&tmp, e))?;
    let staged = StagedFile {
        tmp,
        target: path.to_path_buf(),
        committed: false,
    };
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush().map_err(|e| PrepError::io(&staged.tmp, e))?;
    Ok(staged)
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// File name component of `path`, lossily converted.
pub(crate) fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SMILES_ATOM_PATTERN;

    #[test]
    fn test_atomwise_tokenize_simple() {
        let pattern = Regex::new(SMILES_ATOM_PATTERN).unwrap();
        let tokens = atomwise_tokenize("CCO", &pattern);
        assert_eq!(
            tokens,
            vec![
                CompactString::from("C"),
                CompactString::from("C"),
                CompactString::from("O")
            ]
        );
    }

    #[test]
    fn test_atomwise_tokenize_bracket() {
        let pattern = Regex::new(SMILES_ATOM_PATTERN).unwrap();
        let tokens = atomwise_tokenize("[C@@H](Cl)Br", &pattern);
        assert_eq!(tokens, vec!["[C@@H]", "(", "Cl", ")", "Br"]);
    }

    #[test]
    fn test_atomwise_tokenize_ring_closure() {
        let pattern = Regex::new(SMILES_ATOM_PATTERN).unwrap();
        let tokens = atomwise_tokenize("C%12CC%12", &pattern);
        assert_eq!(tokens, vec!["C", "%12", "C", "C", "%12"]);
    }

    #[test]
    fn test_strip_whitespace() {
        assert_eq!(strip_whitespace(" C C\tO \n"), "CCO");
        assert_eq!(strip_whitespace("   "), "");
    }

    #[test]
    fn test_read_lines_keeps_empty_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.txt");
        fs::write(&path, "C C\n\nC C O\n").unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["C C", "", "C C O"]);
    }

    #[test]
    fn test_write_atomically_leaves_nothing_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let result = write_atomically(&path, |_| Err(PrepError::UnknownToken("X".into())));
        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!tmp_path(&path).exists());

        write_atomically(&path, |w| {
            writeln!(w, "done").map_err(|e| PrepError::io("out.txt", e))
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "done\n");
    }

    #[test]
    fn test_staged_file_removed_unless_committed() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.txt");
        let abandoned = dir.path().join("abandoned.txt");

        let staged = write_staged(&kept, |w| {
            writeln!(w, "kept").map_err(|e| PrepError::io("kept.txt", e))
        })
        .unwrap();
        assert!(tmp_path(&kept).exists());
        assert!(!kept.exists());
        staged.commit().unwrap();
        assert_eq!(fs::read_to_string(&kept).unwrap(), "kept\n");
        assert!(!tmp_path(&kept).exists());

        let staged = write_staged(&abandoned, |w| {
            writeln!(w, "gone").map_err(|e| PrepError::io("abandoned.txt", e))
        })
        .unwrap();
        drop(staged);
        assert!(!abandoned.exists());
        assert!(!tmp_path(&abandoned).exists());
    }
}
