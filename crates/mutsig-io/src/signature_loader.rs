//! File-backed signature provider.
//!
//! The signature file is a headed table whose first column holds the
//! mutation-type label (e.g. `A[C>A]A`) and whose remaining columns are
//! signatures. The order file lists the canonical mutation types, one per
//! line. Rows are re-ordered to the canonical order before the matrix is
//! built, so every solver sees the same channel layout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use mutsig_common::{MutsigError, Result, SignatureMatrix, SignatureProvider, NUM_CHANNELS};

/// Loads and caches the signature matrix from disk.
pub struct CsvSignatureProvider {
    signature_file: PathBuf,
    order_file: PathBuf,
    cached: OnceLock<Arc<SignatureMatrix>>,
}

impl CsvSignatureProvider {
    pub fn new(signature_file: impl Into<PathBuf>, order_file: impl Into<PathBuf>) -> Self {
        Self {
            signature_file: signature_file.into(),
            order_file: order_file.into(),
            cached: OnceLock::new(),
        }
    }

    fn load(&self) -> Result<SignatureMatrix> {
        let order = read_mutation_type_order(&self.order_file)?;
        load_signatures(&self.signature_file, &order)
    }
}

impl SignatureProvider for CsvSignatureProvider {
    fn signatures(&self) -> Result<Arc<SignatureMatrix>> {
        if let Some(matrix) = self.cached.get() {
            return Ok(Arc::clone(matrix));
        }
        let matrix = Arc::new(self.load()?);
        Ok(Arc::clone(self.cached.get_or_init(|| matrix)))
    }
}

/// Read the canonical mutation-type order (one label per line).
pub fn read_mutation_type_order(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut order = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(label) = record.get(0).filter(|s| !s.is_empty()) {
            order.push(label.to_string());
        }
    }
    if order.is_empty() {
        return Err(MutsigError::Signature(format!(
            "{}: no mutation types listed",
            path.display()
        )));
    }
    if order.len() != NUM_CHANNELS {
        warn!(
            "{}: {} mutation types listed, single-base substitution spectra have {}",
            path.display(),
            order.len(),
            NUM_CHANNELS
        );
    }
    Ok(order)
}

/// Read a signature table and align its rows to `order`.
pub fn load_signatures(path: &Path, order: &[String]) -> Result<SignatureMatrix> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let names: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
    if names.is_empty() {
        return Err(MutsigError::Signature(format!(
            "{}: no signature columns",
            path.display()
        )));
    }

    // mutation type -> channel values for every signature
    let mut by_type: HashMap<String, Vec<f64>> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let Some(label) = record.get(0) else { continue };
        let values = record
            .iter()
            .skip(1)
            .map(|v| {
                v.parse::<f64>().map_err(|e| {
                    MutsigError::Signature(format!(
                        "{}: mutation type {}: cannot parse '{}': {}",
                        path.display(),
                        label,
                        v,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != names.len() {
            return Err(MutsigError::Signature(format!(
                "{}: mutation type {} has {} values, expected {}",
                path.display(),
                label,
                values.len(),
                names.len()
            )));
        }
        by_type.insert(label.to_string(), values);
    }

    // Transpose into one row per signature, in canonical channel order
    let mut rows = vec![Vec::with_capacity(order.len()); names.len()];
    for mutation_type in order {
        let values = by_type.get(mutation_type).ok_or_else(|| {
            MutsigError::Signature(format!(
                "{}: mutation type {} missing",
                path.display(),
                mutation_type
            ))
        })?;
        for (row, v) in rows.iter_mut().zip(values) {
            row.push(*v);
        }
    }

    info!(
        "Loaded {} signatures over {} channels from {:?}",
        names.len(),
        order.len(),
        path
    );
    SignatureMatrix::new(names, rows)
}
