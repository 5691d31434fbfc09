//! Reading dataset files and reporting what happens to them.
//!
//! - [`json`]: parse one dataset file into a [`crate::types::Dataset`] (and write it back)
//! - [`discovery`]: find dataset files in a directory
//! - [`observability`]: observer hooks for import events

pub mod discovery;
pub mod json;
pub mod observability;

pub use discovery::{DatasetFile, discover_dataset_files, format_size};
pub use json::{read_dataset_from_path, read_dataset_from_str, write_dataset_to_path};
pub use observability::{
    CompositeObserver, EventSink, FileObserver, ImportEvent, ImportObserver, ImportSeverity, StdErrObserver,
    TracingObserver,
};
