//! File I/O, validation, and serialization for the dvv pipeline.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{CorrelationDataset, EpochLabel, ExperimentName};
pub use error::IoError;
pub use reader::CorrelationMatrixReader;
pub use writer::ResultWriter;
