//! mutsig-io — tabular I/O for spectra, labels and guesses, plus the
//! file-backed signature provider.

pub mod signature_loader;
pub mod tabular;

pub use signature_loader::CsvSignatureProvider;
pub use tabular::{read_column, read_table, write_table};
