//! Python bindings.

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::binarize::preprocess;
use crate::config::PreprocessConfig;
use crate::error::PrepError;
use crate::selfies::smiles_to_selfies;
use crate::tokenization::Tokenizer;
use crate::Representation;

fn to_py_err(err: PrepError) -> PyErr {
    let msg = err.to_string();
    match err {
        PrepError::Io { .. } => PyIOError::new_err(msg),
        PrepError::Smiles { .. }
        | PrepError::Kekulization(_)
        | PrepError::Selfies { .. }
        | PrepError::TokenizationMismatch { .. }
        | PrepError::UnknownToken(_) => PyValueError::new_err(msg),
        e if e.is_config_error() => PyValueError::new_err(msg),
        _ => PyRuntimeError::new_err(msg),
    }
}

/// Tokenize a SMILES string into atom-level tokens (exposed to Python)
#[pyfunction]
#[pyo3(name = "atomwise_tokenize")]
fn atomwise_tokenize_py(smiles: &str) -> PyResult<Vec<String>> {
    let tokens = Tokenizer::new(Representation::Smiles)
        .tokenize_line(smiles)
        .map_err(to_py_err)?;
    Ok(tokens.into_iter().map(|t| t.to_string()).collect())
}

/// Translate a SMILES string into SELFIES
#[pyfunction]
#[pyo3(name = "smiles_to_selfies")]
fn smiles_to_selfies_py(smiles: &str) -> PyResult<String> {
    smiles_to_selfies(smiles).map_err(to_py_err)
}

/// Run the preprocessing pipeline from a JSON configuration.
///
/// Returns the run report as a JSON string.
#[pyfunction]
#[pyo3(name = "preprocess")]
fn preprocess_py(py: Python<'_>, config_json: &str) -> PyResult<String> {
    let config: PreprocessConfig = serde_json::from_str(config_json)
        .map_err(|e| PyValueError::new_err(format!("Invalid configuration JSON: {}", e)))?;
    py.detach(|| -> crate::error::Result<String> {
        let report = preprocess(&config)?;
        Ok(serde_json::to_string(&report)?)
    })
    .map_err(to_py_err)
}

/// Binarization of paired SMILES corpora with Python bindings
#[pymodule]
fn rustmolprep(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();
    m.add_function(wrap_pyfunction!(atomwise_tokenize_py, m)?)?;
    m.add_function(wrap_pyfunction!(smiles_to_selfies_py, m)?)?;
    m.add_function(wrap_pyfunction!(preprocess_py, m)?)?;
    Ok(())
}
