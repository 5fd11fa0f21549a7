//! mutsig-models — candle networks for signature refinement.
//!
//! - `Generator`: variational reconstruction model over spectra
//! - `Finetuner`: low/large mutation-count correctors
//! - `ClassifierNet`: realism classifier in front of refinement
//! - `CombinedCorrector`: routes samples to a corrector by mutation count
//!   and merges the results back into input order
//!
//! Every forward call takes an explicit `ExecutionMode`. Models are saved
//! and loaded through the directory-keyed `store`.

pub mod classifier;
pub mod device;
pub mod error;
pub mod filter;
pub mod finetuner;
pub mod generator;
pub mod mode;
pub mod router;
pub mod store;

pub use classifier::{ClassifierHyperparams, ClassifierNet, RealismClassifier};
pub use device::{device_label, ensure_device, select_device};
pub use error::{ModelError, Result};
pub use filter::{refine_realistic, RefineBatch, RefinedBatch, REALISM_THRESHOLD};
pub use finetuner::{load_combined, Finetuner, FinetunerHyperparams, FinetunerKind};
pub use generator::{
    latent_kl, Generator, GeneratorHyperparams, GeneratorOutput, DECODER_PREFIX, ENCODER_PREFIX,
};
pub use mode::ExecutionMode;
pub use router::{merge_in_order, CombinedCorrector, Corrector, CorrectorInput, Partition};
pub use store::{ModelHandle, PersistedModel};
