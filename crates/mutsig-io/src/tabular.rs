//! Headerless numeric tables (rows = samples, columns = channels/signatures).
//!
//! Values are parsed as `f32`; `f32`'s shortest round-trip formatting is
//! used on write so a table survives a save/load cycle unchanged.

use std::fs::File;
use std::path::Path;

use tracing::debug;

use mutsig_common::{MutsigError, Result};

/// Read a headerless numeric table. Every row must have the same width.
pub fn read_table(path: impl AsRef<Path>) -> Result<Vec<Vec<f32>>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows: Vec<Vec<f32>> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                field.parse::<f32>().map_err(|e| {
                    MutsigError::InvalidInput(format!(
                        "{}: row {}: cannot parse '{}': {}",
                        path.display(),
                        i,
                        field,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(MutsigError::InvalidInput(format!(
                    "{}: row {} has {} columns, expected {}",
                    path.display(),
                    i,
                    row.len(),
                    first.len()
                )));
            }
        }
        rows.push(row);
    }

    debug!("Read {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

/// Read a single-column table (e.g. mutation counts) as a flat vector.
pub fn read_column(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let rows = read_table(path)?;
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [v] => Ok(*v),
            _ => Err(MutsigError::InvalidInput(format!(
                "{}: row {} has {} columns, expected 1",
                path.display(),
                i,
                row.len()
            ))),
        })
        .collect()
}

/// Write a headerless numeric table, creating parent directories.
pub fn write_table<R: AsRef<[f32]>>(path: impl AsRef<Path>, rows: &[R]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(File::create(path)?);
    for row in rows {
        writer.write_record(row.as_ref().iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;

    debug!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}
