//! mutsig-train — generator training.
//!
//! The loop itself lives in `generator_trainer`; the regularization
//! schedule, batching, loggers and the results table are separate so the
//! driver can compose them.

pub mod data;
pub mod generator_trainer;
pub mod logger;
pub mod results;
pub mod schedule;

pub use data::SpectraDataset;
pub use generator_trainer::{GeneratorTrainer, TrainingSummary, CHECKPOINT_EVERY};
pub use logger::{
    JsonLinesLogger, MultiLogger, NullLogger, TracingLogger, TrainingLogger, TrainingRecord,
};
pub use results::append_run_summary;
pub use schedule::RegularizationSchedule;
