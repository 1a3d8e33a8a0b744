//! Status output for contractflow runs.
//!
//! # Modules
//!
//! - [`artifact`] - ArtifactTracker: file counts, names and complexity histograms
//! - [`summary`] - StatusSummary, rendered as text or JCS-canonical JSON

pub mod artifact;
pub mod summary;

pub use artifact::{ArtifactSummary, ArtifactTracker};
pub use summary::{ConfigValue, LastError, StatusSummary};
