//! Corpstats Core - frequency statistics over annotated corpora
//!
//! This crate turns per-token annotations of a corpus into deterministic
//! frequency tables: set-valued annotations are reduced to canonical values,
//! counted across source files and written as sorted delimited text,
//! optionally compressed.

pub mod aggregate;
pub mod annotation;
pub mod codec;
pub mod derive;
pub mod error;
pub mod logging;
pub mod progress;
pub mod sink;
pub mod source;
pub mod table;

// Re-exports for convenience
pub use aggregate::{
    AggregateConfig, AggregateStats, Column, FrequencyKey, FrequencyTable, aggregate,
};
pub use annotation::{AnnotationSet, SelectionRule, best, first, suppress_if};
pub use codec::{Codec, compress, inspect};
pub use derive::{
    DerivationInputs, DerivedAnnotation, derive_all, span_projection, standard_derivations,
};
pub use error::{Error, Result};
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, fmt_num};
pub use sink::{AtomicFile, cleanup_tmp_files};
pub use source::{AnnotationSink, AnnotationSource, MemorySource, WorkDir};
pub use table::{COUNT_COLUMN, parse_delimiter, read_table, write_table};
